//! Process descriptors and listing.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wos_ipc::{ChannelId, Pid};

use crate::channel::Channel;

/// Process lifecycle state
///
/// ```text
/// SPAWNING ──ack──▶ RUNNING
///     │                │
///     └──terminate/fault──▶ TERMINATING ──▶ TERMINATED (removed)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessStatus {
    Spawning,
    Running,
    Terminating,
    Terminated,
}

impl ProcessStatus {
    /// Whether the process may still be terminated
    pub fn is_live(&self) -> bool {
        matches!(self, ProcessStatus::Spawning | ProcessStatus::Running)
    }
}

/// Process descriptor, owned by the registry.
#[derive(Debug)]
pub struct Process<H> {
    pub pid: Pid,
    /// Code path the sandbox runs
    pub path: String,
    pub argv: Vec<Value>,
    pub status: ProcessStatus,
    /// Sandbox handle of the execution context
    pub handle: H,
    /// Channels owned by this process, keyed by local id
    pub channels: BTreeMap<ChannelId, Channel>,
}

impl<H> Process<H> {
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid.clone(),
            path: self.path.clone(),
            argv: sanitize_argv(&self.argv),
            status: self.status,
        }
    }
}

/// One row of `ps()`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub path: String,
    /// argv with structured values reduced to their keys
    pub argv: Vec<Value>,
    pub status: ProcessStatus,
}

/// Render argv for display: objects become `{k1,k2}`, arrays `{0,1}`.
pub fn sanitize_argv(argv: &[Value]) -> Vec<Value> {
    argv.iter()
        .map(|arg| match arg {
            Value::Object(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                Value::String(format!("{{{}}}", keys.join(",")))
            }
            Value::Array(items) => {
                let keys: Vec<String> = (0..items.len()).map(|i| format!("{}", i)).collect();
                Value::String(format!("{{{}}}", keys.join(",")))
            }
            other => other.clone(),
        })
        .collect()
}
