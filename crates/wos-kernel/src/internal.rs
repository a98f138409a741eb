//! The `internal:` volume.
//!
//! A function handler that dispatches on the first path segment to a named
//! sub-handler, passing the rest of the path along:
//!
//! ```text
//!   internal:console/debug   ──▶  console  (path "debug")
//!   internal:webdav          ──▶  webdav   (path "")
//!   internal:nothing         ──▶  ENOENT
//! ```
//!
//! Sub-handlers receive their entry's argv as an extra argument. These
//! entries are normally reached through assigns such as `con:`.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use serde_json::Value;
use wos_ipc::{error_reply, make_reply, ErrorKind, Message, MessageType, Pid};

use crate::handler::{HandlerContext, HandlerFn, Target};

/// Sub-handler of the `internal:` volume: a handler with per-entry argv.
pub type InternalFn = Rc<dyn Fn(&mut dyn HandlerContext, Target, &Pid, Message, &[Value])>;

/// Destination of console output.
pub trait ConsoleSink {
    fn write_line(&self, line: &str);
}

/// Console sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct ConsoleBuffer {
    lines: RefCell<Vec<String>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn take(&self) -> Vec<String> {
        core::mem::take(&mut *self.lines.borrow_mut())
    }
}

impl ConsoleSink for ConsoleBuffer {
    fn write_line(&self, line: &str) {
        self.lines.borrow_mut().push(String::from(line));
    }
}

struct Entry {
    handler: InternalFn,
    argv: Vec<Value>,
}

/// Builder for the `internal:` volume handler.
#[derive(Default)]
pub struct InternalVolume {
    entries: BTreeMap<String, Entry>,
}

impl InternalVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named sub-handler. A later entry with the same name replaces
    /// the earlier one.
    pub fn with_handler<F>(mut self, name: &str, argv: Vec<Value>, handler: F) -> Self
    where
        F: Fn(&mut dyn HandlerContext, Target, &Pid, Message, &[Value]) + 'static,
    {
        self.entries.insert(
            String::from(name),
            Entry {
                handler: Rc::new(handler),
                argv,
            },
        );
        self
    }

    /// Add `console`, which writes string `DATA` payloads to `sink`.
    pub fn with_console(self, sink: Rc<dyn ConsoleSink>) -> Self {
        self.with_handler(
            "console",
            Vec::new(),
            move |_ctx: &mut dyn HandlerContext, _to: Target, _from: &Pid, msg: Message, _argv: &[Value]| {
                if msg.kind != MessageType::Data {
                    return;
                }
                if let Some(Value::String(line)) = &msg.payload {
                    sink.write_line(line);
                }
            },
        )
    }

    /// Add a program entry serving `source` through [`content_handler`].
    pub fn with_program(self, name: &str, source: impl Into<String>) -> Self {
        self.with_handler(name, vec![Value::String(source.into())], content_handler)
    }

    /// Names of all entries.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Build the dispatching handler to mount as `internal`.
    pub fn into_handler(self) -> HandlerFn {
        let entries = self.entries;
        Rc::new(
            move |ctx: &mut dyn HandlerContext, to: Target, from: &Pid, msg: Message| {
                let full = String::from(to.path());
                let (name, rest) = full.split_once('/').unwrap_or((full.as_str(), ""));

                match entries.get(name) {
                    Some(entry) => {
                        (entry.handler)(ctx, to.with_path(String::from(rest)), from, msg, &entry.argv)
                    }
                    None => {
                        log::debug!("[internal] No entry {:?}", name);
                        ctx.post(from, error_reply(ErrorKind::Enoent, &msg));
                    }
                }
            },
        )
    }
}

/// Serve the source in `argv[0]` to `READ` requests.
///
/// Any other request, or a missing source, gets `EINVAL`.
pub fn content_handler(
    ctx: &mut dyn HandlerContext,
    _to: Target,
    from: &Pid,
    msg: Message,
    argv: &[Value],
) {
    match (msg.kind, argv.first()) {
        (MessageType::Read, Some(Value::String(source))) => {
            let reply = make_reply(
                Message::new(MessageType::Data).with_payload(source.as_str()),
                &msg,
            );
            ctx.post(from, reply);
        }
        _ => ctx.post(from, error_reply(ErrorKind::Einval, &msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Outbox(Vec<(Pid, Message)>);

    impl HandlerContext for Outbox {
        fn post(&mut self, to: &Pid, msg: Message) {
            self.0.push((to.clone(), msg));
        }
    }

    fn call(handler: &HandlerFn, path: &str, msg: Message) -> Vec<(Pid, Message)> {
        let mut outbox = Outbox::default();
        handler(&mut outbox, Target::Path(String::from(path)), &Pid::from("req"), msg);
        outbox.0
    }

    #[test]
    fn test_dispatch_by_first_segment() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let record = seen.clone();
        let handler = InternalVolume::new()
            .with_handler(
                "probe",
                vec![Value::from("x")],
                move |_ctx: &mut dyn HandlerContext, to: Target, _from: &Pid, _msg: Message, argv: &[Value]| {
                    record
                        .borrow_mut()
                        .push((String::from(to.path()), argv.to_vec()));
                },
            )
            .into_handler();

        assert!(call(&handler, "probe/a/b", Message::new(MessageType::Read)).is_empty());
        assert!(call(&handler, "probe", Message::new(MessageType::Read)).is_empty());
        assert_eq!(
            *seen.borrow(),
            vec![
                (String::from("a/b"), vec![Value::from("x")]),
                (String::from(""), vec![Value::from("x")]),
            ]
        );
    }

    #[test]
    fn test_unknown_entry() {
        let handler = InternalVolume::new().into_handler();
        let out = call(&handler, "missing", Message::new(MessageType::Open).with_id(1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, Pid::from("req"));
        assert_eq!(out[0].1.error_kind(), Some(ErrorKind::Enoent));
    }

    #[test]
    fn test_console_writes_data() {
        let sink = Rc::new(ConsoleBuffer::new());
        let handler = InternalVolume::new().with_console(sink.clone()).into_handler();

        call(&handler, "console", Message::new(MessageType::Data).with_payload("hello"));
        call(&handler, "console", Message::new(MessageType::Data).with_payload(3));
        call(&handler, "console", Message::new(MessageType::Read).with_payload("ignored"));

        assert_eq!(sink.lines(), vec![String::from("hello")]);
    }

    #[test]
    fn test_program_content() {
        let handler = InternalVolume::new()
            .with_program("webdav", "self.onmessage = () => {}")
            .into_handler();

        let out = call(&handler, "webdav", Message::new(MessageType::Read).with_id("r"));
        assert_eq!(out[0].1.kind, MessageType::Data);
        assert_eq!(out[0].1.id, Some(Value::from("r")));
        assert_eq!(out[0].1.payload, Some(Value::from("self.onmessage = () => {}")));

        let out = call(&handler, "webdav", Message::new(MessageType::Data));
        assert_eq!(out[0].1.error_kind(), Some(ErrorKind::Einval));
    }
}
