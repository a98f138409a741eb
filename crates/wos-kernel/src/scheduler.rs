//! Deferred task queue for function handlers.
//!
//! Function handlers never run inside the router pass that triggered them.
//! They are queued here and run by `Kernel::run_pending` once the current
//! host event has been handled.

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use crate::handler::HandlerContext;

/// A deferred call.
pub type Task = Box<dyn FnOnce(&mut dyn HandlerContext)>;

/// FIFO of deferred calls.
#[derive(Default)]
pub struct Scheduler {
    queue: VecDeque<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use wos_ipc::{Message, Pid};

    struct Recorder(Vec<Message>);

    impl HandlerContext for Recorder {
        fn post(&mut self, _to: &Pid, msg: Message) {
            self.0.push(msg);
        }
    }

    #[test]
    fn test_fifo() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = Scheduler::new();
        for i in 0..3 {
            let order = order.clone();
            scheduler.schedule(Box::new(move |_ctx: &mut dyn HandlerContext| {
                order.borrow_mut().push(i)
            }));
        }
        assert_eq!(scheduler.len(), 3);

        let mut ctx = Recorder(Vec::new());
        while let Some(task) = scheduler.pop() {
            task(&mut ctx);
        }
        assert_eq!(*order.borrow(), [0, 1, 2]);
        assert!(scheduler.is_empty());
    }
}
