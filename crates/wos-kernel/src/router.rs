//! IPC router: one pass per inbound envelope.
//!
//! Addressing decides the route:
//!
//! | process | channel | path | route                                   |
//! |---------|---------|------|-----------------------------------------|
//! | yes     | yes     | -    | handler reply on a VFS channel          |
//! | yes     | no      | -    | OPEN handshake, or direct delivery      |
//! | no      | yes     | -    | relay to peer, or VFS channel dispatch  |
//! | no      | no      | yes  | VFS request                             |
//! | no      | no      | no   | dropped                                 |

use wos_hal::Sandbox;
use wos_ipc::{error_reply, make_reply, unreachable_reply, ErrorKind, Message, MessageType, Pid};

use crate::channel::{Channel, OnTerminate};
use crate::error::KernelError;
use crate::handler::{ChannelTarget, Target};
use crate::Kernel;

impl<S: Sandbox> Kernel<S> {
    pub(crate) fn route(&mut self, from: &Pid, msg: Message) -> Result<(), KernelError> {
        match (msg.process.is_some(), msg.channel.is_some(), msg.path.is_some()) {
            (true, true, _) => self.route_handler_reply(from, msg),
            (true, false, _) => self.route_to_process(from, msg),
            (false, true, _) => self.route_channel(from, msg),
            (false, false, true) => return self.route_path(from, msg),
            (false, false, false) => {
                log::debug!("[ipc] Dropped unaddressed {} from {}", msg.kind, from);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Process-addressed
    // =========================================================================

    fn route_to_process(&mut self, from: &Pid, msg: Message) {
        let Some(dest) = msg.process.clone().filter(|p| self.registry.contains(p)) else {
            self.deliver(from, unreachable_reply(&msg));
            return;
        };

        if msg.kind == MessageType::Open {
            self.handshake(from, &dest, &msg);
            return;
        }

        let mut forward = msg;
        forward.process = Some(from.clone());
        forward.channel = None;
        self.deliver(&dest, forward);
    }

    /// Open a channel pair between `from` and `dest`.
    fn handshake(&mut self, from: &Pid, dest: &Pid, request: &Message) {
        let dest_chan = match self.registry.open_channel(dest) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("[ipc] Cannot open channel in {}: {}", dest, e);
                self.deliver(from, error_reply(ErrorKind::Efault, request));
                return;
            }
        };
        let from_chan = match self.registry.open_channel(from) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("[ipc] Cannot open channel in {}: {}", from, e);
                self.registry.close_channel(dest, &dest_chan);
                self.deliver(from, error_reply(ErrorKind::Efault, request));
                return;
            }
        };

        if let Some(chan) = self.registry.get_channel_mut(dest, &dest_chan) {
            chan.peer = Some(from.clone());
            chan.endpoint = Some(from_chan.clone());
            chan.on_terminate = Some(OnTerminate::NotifyPeer {
                pid: from.clone(),
                channel: from_chan.clone(),
            });
        }
        if let Some(chan) = self.registry.get_channel_mut(from, &from_chan) {
            chan.peer = Some(dest.clone());
            chan.endpoint = Some(dest_chan.clone());
            chan.on_terminate = Some(OnTerminate::NotifyPeer {
                pid: dest.clone(),
                channel: dest_chan.clone(),
            });
        }

        log::debug!(
            "[ipc] Channel {}/{} <-> {}/{}",
            from,
            from_chan,
            dest,
            dest_chan
        );
        self.deliver(dest, Message::channel_notice(dest_chan, Some(from.clone())));

        let mut notice = Message::channel_notice(from_chan, Some(dest.clone()));
        notice.id = request.id.clone();
        self.deliver(from, notice);
    }

    // =========================================================================
    // Channel-addressed
    // =========================================================================

    fn route_channel(&mut self, from: &Pid, msg: Message) {
        let chan = msg
            .channel
            .as_ref()
            .and_then(|id| self.registry.get_channel(from, id))
            .cloned();
        let Some(chan) = chan else {
            self.deliver(from, unreachable_reply(&msg));
            return;
        };

        if chan.is_vfs() {
            self.route_vfs_channel(from, chan, msg);
            return;
        }

        let (Some(peer), Some(endpoint)) = (chan.peer.clone(), chan.endpoint.clone()) else {
            self.deliver(from, unreachable_reply(&msg));
            return;
        };

        if msg.kind == MessageType::Close {
            self.registry.close_channel(from, &chan.id);
            let peer_had = self.registry.close_channel(&peer, &endpoint).is_some();
            self.deliver(
                from,
                make_reply(Message::new(MessageType::Channel), &msg),
            );
            if peer_had {
                self.deliver(&peer, Message::channel_notice(endpoint, None));
            }
            return;
        }

        let linked = self
            .registry
            .get_channel(&peer, &endpoint)
            .map(|back| back.peer.as_ref() == Some(from) && back.endpoint.as_ref() == Some(&chan.id))
            .unwrap_or(false);
        if !linked {
            self.deliver(from, unreachable_reply(&msg));
            return;
        }

        let mut forward = msg;
        forward.channel = Some(endpoint);
        forward.process = Some(from.clone());
        self.deliver(&peer, forward);
    }

    fn route_vfs_channel(&mut self, from: &Pid, chan: Channel, msg: Message) {
        let (Some(handler), Some(path)) = (chan.handler, chan.path) else {
            return;
        };
        let target = Target::Channel(ChannelTarget {
            id: chan.id.clone(),
            path,
            meta: chan.meta,
        });

        if msg.kind != MessageType::Close {
            self.dispatch(&handler, target, from, msg);
            return;
        }

        let notice = make_reply(Message::new(MessageType::Channel), &msg);
        self.dispatch(&handler, target, from, msg);
        self.registry.close_channel(from, &chan.id);
        self.deliver(from, notice);
    }

    /// An envelope naming both a process and a channel.
    ///
    /// Only the backing process of the channel's handler may send these; it
    /// is answering a request the owner made on that channel.
    fn route_handler_reply(&mut self, from: &Pid, msg: Message) {
        let (Some(owner), Some(id)) = (msg.process.clone(), msg.channel.clone()) else {
            return;
        };

        let from_backing = self
            .registry
            .get_channel(&owner, &id)
            .and_then(|chan| chan.handler.as_ref())
            .and_then(|handler| handler.backing_pid())
            .map(|backing| backing == from)
            .unwrap_or(false);
        if !from_backing {
            log::debug!(
                "[ipc] Dropped {} from {} addressed to {}/{}",
                msg.kind,
                from,
                owner,
                id
            );
            return;
        }

        if msg.kind == MessageType::Close {
            self.registry.close_channel(&owner, &id);
            self.deliver(&owner, Message::new(MessageType::Channel).with_channel(id));
            return;
        }

        let mut reply = msg;
        reply.process = None;
        self.deliver(&owner, reply);
    }
}
