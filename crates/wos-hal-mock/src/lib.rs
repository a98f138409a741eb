//! Mock sandbox implementation for testing WOS
//!
//! This provides a mock implementation of the `Sandbox` trait that can be
//! used for testing the kernel without a browser. Every execution context is
//! a record of the envelopes delivered to it.

#![no_std]
extern crate alloc;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use wos_hal::{Sandbox, SandboxError};
use wos_ipc::{Message, Pid};

/// Handle to a simulated execution context
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockHandle(pub u64);

/// Simulated execution context
#[derive(Clone, Debug)]
pub struct MockContext {
    /// Process the context was created for
    pub pid: Pid,
    /// Code path the context was asked to run
    pub path: String,
    /// False once terminated
    pub alive: bool,
    /// Envelopes delivered to the context, oldest first
    pub inbox: Vec<Message>,
}

/// Mock sandbox for unit testing
pub struct MockSandbox {
    /// Next handle to hand out
    next_handle: Cell<u64>,
    /// Simulated contexts, never removed so tests can inspect dead ones
    contexts: RefCell<BTreeMap<u64, MockContext>>,
    /// Random seed for deterministic testing
    random_seed: Cell<u64>,
    /// Byte strings served by `random_bytes` before falling back to the seed
    scripted_entropy: RefCell<VecDeque<Vec<u8>>>,
    /// Fail the next `create` call
    fail_next_create: Cell<bool>,
}

impl MockSandbox {
    /// Create a new mock sandbox
    pub fn new() -> Self {
        Self {
            next_handle: Cell::new(1),
            contexts: RefCell::new(BTreeMap::new()),
            random_seed: Cell::new(12345), // Deterministic seed
            scripted_entropy: RefCell::new(VecDeque::new()),
            fail_next_create: Cell::new(false),
        }
    }

    /// Queue bytes for the next `random_bytes` call (repeated to fill the buffer).
    pub fn script_entropy(&self, bytes: Vec<u8>) {
        self.scripted_entropy.borrow_mut().push_back(bytes);
    }

    /// Make the next `create` call fail.
    pub fn fail_next_create(&self) {
        self.fail_next_create.set(true);
    }

    /// Most recent handle created for `pid`
    pub fn handle_of(&self, pid: &Pid) -> Option<MockHandle> {
        self.contexts
            .borrow()
            .iter()
            .rev()
            .find(|(_, ctx)| &ctx.pid == pid)
            .map(|(id, _)| MockHandle(*id))
    }

    /// Code path the context for `pid` runs
    pub fn path_of(&self, pid: &Pid) -> Option<String> {
        self.context(pid).map(|ctx| ctx.path)
    }

    /// Whether the context for `pid` is still alive
    pub fn is_alive(&self, pid: &Pid) -> bool {
        self.context(pid).map(|ctx| ctx.alive).unwrap_or(false)
    }

    /// Envelopes delivered to `pid` so far
    pub fn messages_for(&self, pid: &Pid) -> Vec<Message> {
        self.context(pid).map(|ctx| ctx.inbox).unwrap_or_default()
    }

    /// Drain the envelopes delivered to `pid`
    pub fn take_messages(&self, pid: &Pid) -> Vec<Message> {
        let Some(MockHandle(id)) = self.handle_of(pid) else {
            return Vec::new();
        };
        self.contexts
            .borrow_mut()
            .get_mut(&id)
            .map(|ctx| core::mem::take(&mut ctx.inbox))
            .unwrap_or_default()
    }

    /// Number of contexts ever created
    pub fn context_count(&self) -> usize {
        self.contexts.borrow().len()
    }

    /// Number of contexts still alive
    pub fn alive_count(&self) -> usize {
        self.contexts.borrow().values().filter(|ctx| ctx.alive).count()
    }

    fn context(&self, pid: &Pid) -> Option<MockContext> {
        let MockHandle(id) = self.handle_of(pid)?;
        self.contexts.borrow().get(&id).cloned()
    }
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox for MockSandbox {
    type Handle = MockHandle;

    fn create(&self, pid: &Pid, path: &str) -> Result<Self::Handle, SandboxError> {
        if self.fail_next_create.replace(false) {
            return Err(SandboxError::CreateFailed(String::from(path)));
        }

        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        self.contexts.borrow_mut().insert(
            id,
            MockContext {
                pid: pid.clone(),
                path: String::from(path),
                alive: true,
                inbox: Vec::new(),
            },
        );
        Ok(MockHandle(id))
    }

    fn post_message(&self, handle: &Self::Handle, msg: &Message) -> Result<(), SandboxError> {
        let mut contexts = self.contexts.borrow_mut();
        match contexts.get_mut(&handle.0) {
            Some(ctx) if ctx.alive => {
                ctx.inbox.push(msg.clone());
                Ok(())
            }
            _ => Err(SandboxError::ContextNotFound),
        }
    }

    fn terminate(&self, handle: &Self::Handle) -> Result<(), SandboxError> {
        let mut contexts = self.contexts.borrow_mut();
        match contexts.get_mut(&handle.0) {
            Some(ctx) if ctx.alive => {
                ctx.alive = false;
                Ok(())
            }
            _ => Err(SandboxError::ContextNotFound),
        }
    }

    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), SandboxError> {
        if let Some(script) = self.scripted_entropy.borrow_mut().pop_front() {
            if !script.is_empty() {
                for (byte, value) in buf.iter_mut().zip(script.iter().cycle()) {
                    *byte = *value;
                }
                return Ok(());
            }
        }

        let mut seed = self.random_seed.get();
        for byte in buf.iter_mut() {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            *byte = (seed >> 33) as u8;
        }
        self.random_seed.set(seed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use wos_ipc::MessageType;

    #[test]
    fn test_records_delivery() {
        let sandbox = MockSandbox::new();
        let pid = Pid::from("p1");
        let handle = sandbox.create(&pid, "test:proc").unwrap();
        sandbox
            .post_message(&handle, &Message::new(MessageType::Data))
            .unwrap();

        assert_eq!(sandbox.messages_for(&pid).len(), 1);
        assert_eq!(sandbox.take_messages(&pid).len(), 1);
        assert!(sandbox.messages_for(&pid).is_empty());
    }

    #[test]
    fn test_terminated_context_rejects_delivery() {
        let sandbox = MockSandbox::new();
        let pid = Pid::from("p1");
        let handle = sandbox.create(&pid, "test:proc").unwrap();
        sandbox.terminate(&handle).unwrap();

        assert!(!sandbox.is_alive(&pid));
        assert_eq!(
            sandbox.post_message(&handle, &Message::new(MessageType::Data)),
            Err(SandboxError::ContextNotFound)
        );
        assert_eq!(sandbox.terminate(&handle), Err(SandboxError::ContextNotFound));
    }

    #[test]
    fn test_scripted_entropy() {
        let sandbox = MockSandbox::new();
        sandbox.script_entropy(vec![1, 2]);
        let mut buf = [0u8; 5];
        sandbox.random_bytes(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 1, 2, 1]);

        sandbox.random_bytes(&mut buf).unwrap();
        assert_ne!(buf, [1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_fail_next_create() {
        let sandbox = MockSandbox::new();
        sandbox.fail_next_create();
        assert!(sandbox.create(&Pid::from("p1"), "x").is_err());
        assert!(sandbox.create(&Pid::from("p1"), "x").is_ok());
        assert_eq!(sandbox.context_count(), 1);
    }
}
