//! VFS handlers and the context they run against.
//!
//! A handler is either a function living inside the kernel or a spawned
//! process that receives every request as a message. Callers cannot tell
//! the two apart: both answer by posting envelopes back to the requester.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use serde_json::Value;
use wos_ipc::{ChannelId, Message, Pid};

use crate::channel::ChannelMeta;

/// In-kernel handler function: `(context, destination, requester, message)`.
pub type HandlerFn = Rc<dyn Fn(&mut dyn HandlerContext, Target, &Pid, Message)>;

/// Kernel services available to function handlers.
pub trait HandlerContext {
    /// Post an envelope to a process. Undeliverable envelopes are logged and
    /// dropped.
    fn post(&mut self, to: &Pid, msg: Message);
}

/// Handler bound to a mounted volume.
#[derive(Clone)]
pub enum Handler {
    /// Deferred in-kernel function
    Function(HandlerFn),
    /// Backing process spawned at mount time; `None` when spawning failed
    Process { pid: Option<Pid>, argv: Vec<Value> },
}

impl Handler {
    /// Pid of the backing process, for process handlers.
    pub fn backing_pid(&self) -> Option<&Pid> {
        match self {
            Handler::Function(_) => None,
            Handler::Process { pid, .. } => pid.as_ref(),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Function(_) => f.write_str("Function"),
            Handler::Process { pid, argv } => f
                .debug_struct("Process")
                .field("pid", pid)
                .field("argv", argv)
                .finish(),
        }
    }
}

/// The channel side of a handler destination.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelTarget {
    /// Channel id in the requesting process
    pub id: ChannelId,
    /// Path within the volume
    pub path: String,
    /// Handler metadata, shared with the channel
    pub meta: ChannelMeta,
}

/// Destination of a handler call.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// One-shot request on a path
    Path(String),
    /// Request on an open VFS channel
    Channel(ChannelTarget),
}

impl Target {
    pub fn path(&self) -> &str {
        match self {
            Target::Path(path) => path,
            Target::Channel(chan) => &chan.path,
        }
    }

    /// Same destination with the path replaced.
    pub fn with_path(self, path: String) -> Target {
        match self {
            Target::Path(_) => Target::Path(path),
            Target::Channel(chan) => Target::Channel(ChannelTarget { path, ..chan }),
        }
    }

    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            Target::Path(_) => None,
            Target::Channel(chan) => Some(&chan.id),
        }
    }
}

/// How to satisfy a mount request.
pub enum MountSpec {
    /// In-kernel function
    Function(HandlerFn),
    /// Spawn `path` with `argv` and forward requests to it
    Process { path: String, argv: Vec<Value> },
}

impl MountSpec {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut dyn HandlerContext, Target, &Pid, Message) + 'static,
    {
        MountSpec::Function(Rc::new(f))
    }

    pub fn process(path: impl Into<String>, argv: Vec<Value>) -> Self {
        MountSpec::Process {
            path: path.into(),
            argv,
        }
    }
}
