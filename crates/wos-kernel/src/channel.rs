//! Channel descriptors.
//!
//! A process-to-process conversation is a pair of channels whose endpoints
//! point at each other:
//!
//! ```text
//!   process A                       process B
//!   ┌──────────────────┐            ┌──────────────────┐
//!   │ chan "k3x"        │            │ chan "9qa"        │
//!   │  peer: B          │◀──────────▶│  peer: A          │
//!   │  endpoint: "9qa"  │            │  endpoint: "k3x"  │
//!   └──────────────────┘            └──────────────────┘
//! ```
//!
//! A process-to-VFS conversation is a single channel carrying the handler
//! and the resolved path instead of an endpoint.

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use serde_json::Value;
use wos_ipc::{ChannelId, Pid};

use crate::handler::Handler;

/// Handler-owned metadata slot of a VFS channel.
///
/// Every handler call made on the channel holds the same slot, so a
/// deferred call reads the value current when it runs, including the final
/// CLOSE after the channel itself is gone.
#[derive(Clone, Debug, Default)]
pub struct ChannelMeta(Rc<RefCell<Option<Value>>>);

impl ChannelMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Option<Value>) {
        *self.0.borrow_mut() = value;
    }
}

impl PartialEq for ChannelMeta {
    fn eq(&self, other: &Self) -> bool {
        *self.0.borrow() == *other.0.borrow()
    }
}

/// What to do with a channel when its owner terminates
#[derive(Clone, Debug, PartialEq)]
pub enum OnTerminate {
    /// Close the peer's channel and tell the peer it is gone
    NotifyPeer { pid: Pid, channel: ChannelId },
    /// Send the VFS handler a final CLOSE
    CloseHandler,
}

/// One channel owned by a process.
#[derive(Clone, Debug)]
pub struct Channel {
    pub id: ChannelId,
    /// Peer process of a paired channel
    pub peer: Option<Pid>,
    /// Peer's channel id of a paired channel
    pub endpoint: Option<ChannelId>,
    /// Resolved path of a VFS channel
    pub path: Option<String>,
    /// Handler of a VFS channel
    pub handler: Option<Handler>,
    /// Handler-owned bookkeeping
    pub meta: ChannelMeta,
    pub on_terminate: Option<OnTerminate>,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            peer: None,
            endpoint: None,
            path: None,
            handler: None,
            meta: ChannelMeta::new(),
            on_terminate: None,
        }
    }

    /// Bound to a VFS handler and path
    pub fn is_vfs(&self) -> bool {
        self.handler.is_some() && self.path.is_some()
    }

    /// Linked to a channel in another process
    pub fn is_paired(&self) -> bool {
        self.peer.is_some() && self.endpoint.is_some()
    }
}
