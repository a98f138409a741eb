//! IPC Protocol for WOS
//!
//! This crate defines the envelope exchanged between the kernel and the
//! sandboxed processes it hosts:
//!
//! - **Identifiers** (`Pid`, `ChannelId`)
//! - **Message types** (`OPEN`, `CLOSE`, `DATA`, ...)
//! - **Error kinds** carried in `ERROR` envelopes
//! - **Reply builders** (`make_reply`, `error_reply`, `unreachable_reply`)
//!
//! It is the single source of truth for the wire shape, shared by the kernel,
//! the sandbox implementations and the test doubles.
//!
//! # Addressing
//!
//! | field     | meaning                                  |
//! |-----------|------------------------------------------|
//! | `type`    | required message type                    |
//! | `id`      | correlation id for request/reply pairing |
//! | `payload` | opaque JSON value                        |
//! | `process` | destination/source process id            |
//! | `path`    | VFS path (path-addressed requests)       |
//! | `channel` | destination/source channel id            |
//!
//! Absent fields are omitted on the wire, except on `CHANNEL` messages,
//! which always carry `process` and `path`. A `null` there means the
//! destination is gone.

#![no_std]
extern crate alloc;

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(String::from(id))
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Process identifier. Opaque, unique among live processes.
    Pid
);

string_id!(
    /// Channel identifier. Opaque, unique within the owning process.
    ChannelId
);

// =============================================================================
// Host transport signals
// =============================================================================

/// Bare string signals a sandbox sends instead of an envelope.
pub mod signal {
    /// Execution context finished starting up.
    pub const CREATED: &str = "CREATED";
    /// The process asks to be terminated.
    pub const TERMINATE: &str = "TERMINATE";
}

// =============================================================================
// Message types
// =============================================================================

/// Envelope type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// Open a channel to a process or a VFS path
    Open,
    /// Close a channel
    Close,
    /// Data over a channel, or a reply
    Data,
    /// Read request
    Read,
    /// Channel created (or gone, when the destination is absent)
    Channel,
    /// Categorical error reply
    Error,
    /// Unsolicited event from a handler
    Event,
    /// Process start-up parameters
    Init,
}

impl MessageType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Open => "OPEN",
            MessageType::Close => "CLOSE",
            MessageType::Data => "DATA",
            MessageType::Read => "READ",
            MessageType::Channel => "CHANNEL",
            MessageType::Error => "ERROR",
            MessageType::Event => "EVENT",
            MessageType::Init => "INIT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Error kinds
// =============================================================================

/// Error tag carried in `payload.type` of an `ERROR` envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorKind {
    /// Target process or channel cannot be resolved
    Esrch,
    /// Path segment or content not found
    Enoent,
    /// No volume mounted for the resolved path
    Enodev,
    /// Malformed request for a handler that requires a specific shape
    Einval,
    /// Backing fetch denied
    Eperm,
    /// Unexpected failure while a handler was servicing a request
    Efault,
    /// Message type unsupported by a handler
    Eopnotsupp,
}

impl ErrorKind {
    /// Wire name of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Esrch => "ESRCH",
            ErrorKind::Enoent => "ENOENT",
            ErrorKind::Enodev => "ENODEV",
            ErrorKind::Einval => "EINVAL",
            ErrorKind::Eperm => "EPERM",
            ErrorKind::Efault => "EFAULT",
            ErrorKind::Eopnotsupp => "EOPNOTSUPP",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an `ERROR` envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error tag
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// The request this error answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<Message>>,
    /// Unresolvable process, for `ESRCH`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Pid>,
    /// Unresolvable channel, for `ESRCH`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelId>,
}

impl ErrorPayload {
    fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// One envelope on the host transport.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Message {
    /// Message type
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Correlation id
    #[serde(default)]
    pub id: Option<Value>,
    /// Opaque payload
    #[serde(default)]
    pub payload: Option<Value>,
    /// Destination or source process
    #[serde(default)]
    pub process: Option<Pid>,
    /// VFS path
    #[serde(default)]
    pub path: Option<String>,
    /// Destination or source channel
    #[serde(default)]
    pub channel: Option<ChannelId>,
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let notice = self.kind == MessageType::Channel;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.kind)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        if let Some(payload) = &self.payload {
            map.serialize_entry("payload", payload)?;
        }
        if notice || self.process.is_some() {
            map.serialize_entry("process", &self.process)?;
        }
        if notice || self.path.is_some() {
            map.serialize_entry("path", &self.path)?;
        }
        if let Some(channel) = &self.channel {
            map.serialize_entry("channel", channel)?;
        }
        map.end()
    }
}

impl Message {
    /// Create an envelope with only the type set.
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            id: None,
            payload: None,
            process: None,
            path: None,
            channel: None,
        }
    }

    /// Set the correlation id.
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Address a process.
    pub fn with_process(mut self, pid: Pid) -> Self {
        self.process = Some(pid);
        self
    }

    /// Address a VFS path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Address a channel.
    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    /// `CHANNEL` notification for a process-to-process channel.
    ///
    /// `peer` is `None` when the other side is gone.
    pub fn channel_notice(channel: ChannelId, peer: Option<Pid>) -> Self {
        Self {
            process: peer,
            channel: Some(channel),
            ..Self::new(MessageType::Channel)
        }
    }

    /// Error tag of an `ERROR` envelope.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        if self.kind != MessageType::Error {
            return None;
        }
        let tag = self.payload.as_ref()?.get("type")?.clone();
        serde_json::from_value(tag).ok()
    }
}

/// Decode an envelope from its JSON form.
///
/// Returns `None` for anything that is not a well-formed envelope with a
/// known type; such input is dropped by the kernel.
pub fn decode_envelope(json: &str) -> Option<Message> {
    serde_json::from_str(json).ok()
}

// =============================================================================
// Reply builders
// =============================================================================

/// Fill in a reply's correlation fields from the request it answers.
///
/// Copies the correlation id, and the request's channel (or, without a
/// channel, its process) so the reply travels back the same way.
pub fn make_reply(mut reply: Message, request: &Message) -> Message {
    if request.id.is_some() {
        reply.id = request.id.clone();
    }
    if request.channel.is_some() {
        reply.channel = request.channel.clone();
    } else if request.process.is_some() {
        reply.process = request.process.clone();
    }
    reply
}

/// Build an `ERROR` reply embedding the failed request.
pub fn error_reply(kind: ErrorKind, request: &Message) -> Message {
    let payload = ErrorPayload {
        kind,
        message: Some(Box::new(request.clone())),
        process: None,
        channel: None,
    };
    make_reply(
        Message::new(MessageType::Error).with_payload(payload.into_value()),
        request,
    )
}

/// Build the `ESRCH` reply for a request whose destination cannot be found.
///
/// Carries the original process/channel identifiers for diagnosis.
pub fn unreachable_reply(request: &Message) -> Message {
    let payload = ErrorPayload {
        kind: ErrorKind::Esrch,
        message: None,
        process: request.process.clone(),
        channel: request.channel.clone(),
    };
    let mut reply = Message::new(MessageType::Error).with_payload(payload.into_value());
    reply.id = request.id.clone();
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_decode_envelope() {
        let msg = decode_envelope(r#"{"type":"OPEN","path":"con:","id":7}"#)
            .expect("valid envelope");
        assert_eq!(msg.kind, MessageType::Open);
        assert_eq!(msg.path.as_deref(), Some("con:"));
        assert_eq!(msg.id, Some(Value::from(7)));
        assert!(msg.channel.is_none());

        assert!(decode_envelope(r#"{"type":"BOGUS"}"#).is_none());
        assert!(decode_envelope(r#"{"path":"con:"}"#).is_none());
        assert!(decode_envelope("CREATED").is_none());
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let msg = Message::new(MessageType::Data)
            .with_channel(ChannelId::from("c1"))
            .with_payload("x");
        let json = serde_json::to_string(&msg).expect("serializable");
        assert_eq!(json, r#"{"type":"DATA","payload":"x","channel":"c1"}"#);
    }

    #[test]
    fn test_gone_notice_carries_nulls() {
        let json = serde_json::to_string(&Message::channel_notice(ChannelId::from("c1"), None))
            .expect("serializable");
        assert_eq!(json, r#"{"type":"CHANNEL","process":null,"path":null,"channel":"c1"}"#);

        let notice = Message::channel_notice(ChannelId::from("c1"), Some(Pid::from("p2")));
        let json = serde_json::to_string(&notice).expect("serializable");
        assert_eq!(json, r#"{"type":"CHANNEL","process":"p2","path":null,"channel":"c1"}"#);
        assert_eq!(decode_envelope(&json), Some(notice));
    }

    #[test]
    fn test_make_reply_prefers_channel() {
        let request = Message::new(MessageType::Read)
            .with_id("r1")
            .with_process(Pid::from("p1"))
            .with_channel(ChannelId::from("c1"));
        let reply = make_reply(Message::new(MessageType::Data), &request);
        assert_eq!(reply.id, Some(Value::from("r1")));
        assert_eq!(reply.channel, Some(ChannelId::from("c1")));
        assert!(reply.process.is_none());

        let request = Message::new(MessageType::Read).with_process(Pid::from("p1"));
        let reply = make_reply(Message::new(MessageType::Data), &request);
        assert_eq!(reply.process, Some(Pid::from("p1")));
        assert!(reply.id.is_none());
    }

    #[test]
    fn test_error_reply_embeds_request() {
        let request = Message::new(MessageType::Open).with_path("nope:x").with_id(3);
        let reply = error_reply(ErrorKind::Enodev, &request);
        assert_eq!(reply.error_kind(), Some(ErrorKind::Enodev));
        assert_eq!(reply.id, Some(Value::from(3)));
        let payload = reply.payload.expect("payload");
        assert_eq!(payload["message"]["path"], Value::from("nope:x"));
    }

    #[test]
    fn test_unreachable_reply_carries_identifiers() {
        let request = Message::new(MessageType::Data).with_channel(ChannelId::from("gone"));
        let reply = unreachable_reply(&request);
        assert_eq!(reply.error_kind(), Some(ErrorKind::Esrch));
        let payload = reply.payload.expect("payload");
        assert_eq!(payload["channel"], Value::from("gone"));
        assert!(payload.get("process").is_none());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(ErrorKind::Eopnotsupp.to_string(), "EOPNOTSUPP");
        assert_eq!(MessageType::Channel.to_string(), "CHANNEL");
        let value = serde_json::to_value(ErrorKind::Esrch).expect("serializable");
        assert_eq!(value, Value::from("ESRCH"));
    }
}
