//! Process registry: pid allocation, lifecycle and channel bookkeeping.
//!
//! The registry owns the sandbox. Every execution context it creates is
//! tracked by pid until the process reaches TERMINATED, at which point the
//! entry is removed.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use serde_json::Value;
use wos_hal::Sandbox;
use wos_ipc::{ChannelId, Message, Pid};

use crate::channel::Channel;
use crate::error::KernelError;
use crate::ids::unique_id;
use crate::process::{sanitize_argv, Process, ProcessInfo, ProcessStatus};

/// Callback invoked synchronously on every status transition.
pub type StatusObserver = Box<dyn FnMut(&Pid, ProcessStatus)>;

/// Registry of live processes.
pub struct ProcessRegistry<S: Sandbox> {
    sandbox: S,
    processes: BTreeMap<Pid, Process<S::Handle>>,
    observers: Vec<StatusObserver>,
    id_length: usize,
}

impl<S: Sandbox> ProcessRegistry<S> {
    pub fn new(sandbox: S, id_length: usize) -> Self {
        Self {
            sandbox,
            processes: BTreeMap::new(),
            observers: Vec::new(),
            id_length,
        }
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    /// Subscribe to status transitions.
    pub fn on_status(&mut self, observer: StatusObserver) {
        self.observers.push(observer);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawn a process running `path` with `argv`.
    ///
    /// `argv` must be a JSON array. The process starts in SPAWNING and moves
    /// to RUNNING when the sandbox acknowledges the context.
    pub fn spawn(&mut self, path: &str, argv: Value) -> Result<Pid, KernelError> {
        let argv = match argv {
            Value::Array(argv) => argv,
            other => {
                log::error!("[proc] Invalid argv '{}' for {}", json_type(&other), path);
                return Err(KernelError::InvalidArgv {
                    path: String::from(path),
                });
            }
        };

        log::info!(
            "[proc] Spawning \"{}\" {}",
            path,
            serde_json::to_string(&sanitize_argv(&argv)).unwrap_or_default()
        );

        let processes = &self.processes;
        let pid = Pid::from(unique_id(&self.sandbox, self.id_length, |id| {
            processes.keys().any(|p| p.as_str() == id)
        })?);

        let handle = self.sandbox.create(&pid, path).map_err(|e| {
            log::error!("[proc] Failed to create context for {}: {}", pid, e);
            e
        })?;

        self.processes.insert(
            pid.clone(),
            Process {
                pid: pid.clone(),
                path: String::from(path),
                argv,
                status: ProcessStatus::Spawning,
                handle,
                channels: BTreeMap::new(),
            },
        );
        self.notify(&pid, ProcessStatus::Spawning);
        Ok(pid)
    }

    /// Move a process to `status`, notifying observers.
    ///
    /// Reaching TERMINATED removes the process.
    pub fn set_status(&mut self, pid: &Pid, status: ProcessStatus) {
        let Some(process) = self.processes.get_mut(pid) else {
            return;
        };
        process.status = status;
        self.notify(pid, status);

        if status == ProcessStatus::Terminated {
            self.processes.remove(pid);
        }
    }

    /// Start terminating a live process.
    ///
    /// Moves it to TERMINATING and hands back its channels, which are
    /// removed from the process. Returns `None` when the process is unknown
    /// or already past RUNNING.
    pub fn begin_termination(&mut self, pid: &Pid) -> Option<Vec<Channel>> {
        let process = self.processes.get_mut(pid)?;
        if !process.status.is_live() {
            return None;
        }
        let channels = core::mem::take(&mut process.channels);
        self.set_status(pid, ProcessStatus::Terminating);
        Some(channels.into_values().collect())
    }

    /// Destroy the execution context and retire the process.
    pub fn finish_termination(&mut self, pid: &Pid) {
        if let Some(process) = self.processes.get(pid) {
            if let Err(e) = self.sandbox.terminate(&process.handle) {
                log::warn!("[proc] Sandbox terminate failed for {}: {}", pid, e);
            }
        }
        self.set_status(pid, ProcessStatus::Terminated);
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get(&self, pid: &Pid) -> Option<&Process<S::Handle>> {
        self.processes.get(pid)
    }

    pub fn get_mut(&mut self, pid: &Pid) -> Option<&mut Process<S::Handle>> {
        self.processes.get_mut(pid)
    }

    pub fn contains(&self, pid: &Pid) -> bool {
        self.processes.contains_key(pid)
    }

    pub fn status(&self, pid: &Pid) -> Option<ProcessStatus> {
        self.processes.get(pid).map(|p| p.status)
    }

    /// Identify the process behind a sandbox handle.
    pub fn pid_for_handle(&self, handle: &S::Handle) -> Option<Pid> {
        self.processes
            .values()
            .find(|p| &p.handle == handle)
            .map(|p| p.pid.clone())
    }

    /// Listing of every process, argv sanitized.
    pub fn list(&self) -> Vec<ProcessInfo> {
        self.processes.values().map(Process::info).collect()
    }

    /// Post an envelope into a process's execution context.
    pub fn post(&self, pid: &Pid, msg: &Message) -> Result<(), KernelError> {
        let process = self
            .processes
            .get(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.clone()))?;
        self.sandbox.post_message(&process.handle, msg)?;
        Ok(())
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Allocate a fresh, empty channel in `pid`.
    pub fn open_channel(&mut self, pid: &Pid) -> Result<ChannelId, KernelError> {
        let process = self
            .processes
            .get_mut(pid)
            .ok_or_else(|| KernelError::ProcessNotFound(pid.clone()))?;

        let channels = &process.channels;
        let id = ChannelId::from(unique_id(&self.sandbox, self.id_length, |id| {
            channels.keys().any(|c| c.as_str() == id)
        })?);

        process.channels.insert(id.clone(), Channel::new(id.clone()));
        Ok(id)
    }

    pub fn get_channel(&self, pid: &Pid, id: &ChannelId) -> Option<&Channel> {
        self.processes.get(pid)?.channels.get(id)
    }

    pub fn get_channel_mut(&mut self, pid: &Pid, id: &ChannelId) -> Option<&mut Channel> {
        self.processes.get_mut(pid)?.channels.get_mut(id)
    }

    /// Remove a channel, returning it if it existed.
    pub fn close_channel(&mut self, pid: &Pid, id: &ChannelId) -> Option<Channel> {
        self.processes.get_mut(pid)?.channels.remove(id)
    }

    fn notify(&mut self, pid: &Pid, status: ProcessStatus) {
        for observer in self.observers.iter_mut() {
            observer(pid, status);
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;
    use serde_json::json;
    use wos_hal_mock::MockSandbox;

    fn registry() -> ProcessRegistry<MockSandbox> {
        ProcessRegistry::new(MockSandbox::new(), 7)
    }

    #[test]
    fn test_spawn_registers_spawning_process() {
        let mut reg = registry();
        let pid = reg.spawn("test:proc", json!(["a"])).unwrap();
        assert_eq!(pid.as_str().len(), 7);
        assert_eq!(reg.status(&pid), Some(ProcessStatus::Spawning));
        assert_eq!(reg.sandbox().path_of(&pid).as_deref(), Some("test:proc"));
    }

    #[test]
    fn test_spawn_rejects_non_array_argv() {
        let mut reg = registry();
        assert_eq!(
            reg.spawn("test:proc", json!({"a": 1})),
            Err(KernelError::InvalidArgv {
                path: String::from("test:proc")
            })
        );
        assert_eq!(reg.sandbox().context_count(), 0);
    }

    #[test]
    fn test_observers_and_removal() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut reg = registry();
        let record = seen.clone();
        reg.on_status(Box::new(move |_: &Pid, status: ProcessStatus| {
            record.borrow_mut().push(status)
        }));

        let pid = reg.spawn("test:proc", json!([])).unwrap();
        assert!(reg.begin_termination(&pid).is_some());
        assert!(reg.begin_termination(&pid).is_none());
        reg.finish_termination(&pid);

        assert!(!reg.contains(&pid));
        assert!(!reg.sandbox().is_alive(&pid));
        assert_eq!(
            *seen.borrow(),
            vec![
                ProcessStatus::Spawning,
                ProcessStatus::Terminating,
                ProcessStatus::Terminated
            ]
        );
    }

    #[test]
    fn test_channel_ids_retry_within_process() {
        let mut reg = registry();
        let pid = reg.spawn("test:proc", json!([])).unwrap();

        reg.sandbox().script_entropy(vec![5]);
        let first = reg.open_channel(&pid).unwrap();
        reg.sandbox().script_entropy(vec![5]);
        reg.sandbox().script_entropy(vec![6]);
        let second = reg.open_channel(&pid).unwrap();

        assert_eq!(first.as_str(), "5555555");
        assert_eq!(second.as_str(), "6666666");
        assert!(reg.close_channel(&pid, &first).is_some());
        assert!(reg.get_channel(&pid, &first).is_none());
        assert!(reg.get_channel(&pid, &second).is_some());
    }
}
