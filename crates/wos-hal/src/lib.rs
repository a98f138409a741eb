//! Sandbox Abstraction Layer for WOS
//!
//! This crate defines the `Sandbox` trait through which the kernel asks a
//! platform to run untrusted process code in isolation. The kernel never
//! touches the isolation technology directly.
//!
//! # Platform Implementations
//!
//! - **Browser**: one Web Worker per process (`wos-supervisor-web`)
//! - **Tests**: in-memory recorder (`wos-hal-mock`)
//!
//! # Host transport
//!
//! Everything a sandbox reports back reaches the kernel as a [`HostEvent`]
//! tagged with the handle of the context that produced it. A sandbox must
//! eventually report [`HostEvent::Created`] after a successful start-up, and
//! [`HostEvent::Fault`] when the context dies on its own.

#![no_std]
extern crate alloc;

use alloc::string::String;
use core::fmt::Debug;

use wos_ipc::{signal, Message, Pid};

/// Errors reported by a sandbox implementation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    /// The execution context could not be created
    #[error("failed to create execution context for {0}")]
    CreateFailed(String),
    /// The handle no longer refers to a live context
    #[error("execution context not found")]
    ContextNotFound,
    /// The envelope could not be handed to the context
    #[error("failed to deliver message: {0}")]
    DeliveryFailed(String),
    /// No entropy source available
    #[error("entropy source unavailable")]
    EntropyUnavailable,
}

/// Isolation collaborator consumed by the process registry.
///
/// Implementations use interior mutability where they keep state; the kernel
/// only ever holds a shared reference.
pub trait Sandbox {
    /// Handle to one execution context (a Web Worker in the browser).
    type Handle: Clone + PartialEq + Debug;

    /// Begin isolated execution of the code at `path` for process `pid`.
    fn create(&self, pid: &Pid, path: &str) -> Result<Self::Handle, SandboxError>;

    /// Deliver one envelope into the execution context.
    fn post_message(&self, handle: &Self::Handle, msg: &Message) -> Result<(), SandboxError>;

    /// Forcibly end the execution context.
    fn terminate(&self, handle: &Self::Handle) -> Result<(), SandboxError>;

    /// Fill `buf` with random bytes, used for pid and channel id generation.
    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), SandboxError>;
}

/// Event delivered by the host transport on behalf of one execution context.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// The context finished starting up
    Created,
    /// The process asked to be terminated
    Terminate,
    /// The context died on an unrecoverable fault
    Fault(String),
    /// An envelope sent by the process
    Message(Message),
}

impl HostEvent {
    /// Map a bare string signal to its event. Unknown strings yield `None`.
    pub fn from_signal(raw: &str) -> Option<HostEvent> {
        match raw {
            signal::CREATED => Some(HostEvent::Created),
            signal::TERMINATE => Some(HostEvent::Terminate),
            _ => None,
        }
    }

    /// Decode a JSON envelope. Malformed envelopes yield `None`.
    pub fn from_json(json: &str) -> Option<HostEvent> {
        wos_ipc::decode_envelope(json).map(HostEvent::Message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wos_ipc::MessageType;

    #[test]
    fn test_signals() {
        assert_eq!(HostEvent::from_signal("CREATED"), Some(HostEvent::Created));
        assert_eq!(HostEvent::from_signal("TERMINATE"), Some(HostEvent::Terminate));
        assert_eq!(HostEvent::from_signal("PONG"), None);
    }

    #[test]
    fn test_from_json() {
        match HostEvent::from_json(r#"{"type":"DATA","channel":"abc","payload":"PING"}"#) {
            Some(HostEvent::Message(msg)) => assert_eq!(msg.kind, MessageType::Data),
            other => panic!("Expected message event, got {:?}", other),
        }
        assert!(HostEvent::from_json("{}").is_none());
    }
}
