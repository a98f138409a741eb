//! Host events and process termination.

use serde_json::json;
use wos_hal::{HostEvent, Sandbox};
use wos_ipc::{Message, MessageType, Pid};

use crate::channel::OnTerminate;
use crate::error::KernelError;
use crate::handler::{ChannelTarget, Target};
use crate::process::ProcessStatus;
use crate::Kernel;

impl<S: Sandbox> Kernel<S> {
    /// Handle one event reported by the sandbox for the context `source`.
    ///
    /// Events from contexts the kernel does not know are dropped. Errors
    /// are fatal configuration failures surfaced by routing.
    pub fn handle_event(&mut self, source: &S::Handle, event: HostEvent) -> Result<(), KernelError> {
        let Some(pid) = self.registry.pid_for_handle(source) else {
            log::debug!("[ipc] Dropped event from unknown context {:?}", source);
            return Ok(());
        };

        match event {
            HostEvent::Created => {
                self.on_created(&pid);
                Ok(())
            }
            HostEvent::Terminate => {
                log::info!("[proc] {} asked to terminate", pid);
                self.terminate(&pid)
            }
            HostEvent::Fault(reason) => {
                log::warn!("[proc] {} faulted: {}", pid, reason);
                self.terminate(&pid)
            }
            HostEvent::Message(msg) => self.route(&pid, msg),
        }
    }

    /// Terminate a process.
    ///
    /// Every channel the process owns is torn down: paired peers are told
    /// their side is gone and VFS handlers get a final CLOSE. Terminating a
    /// process that is already terminating is a no-op.
    pub fn terminate(&mut self, pid: &Pid) -> Result<(), KernelError> {
        if !self.registry.contains(pid) {
            return Err(KernelError::ProcessNotFound(pid.clone()));
        }
        let Some(channels) = self.registry.begin_termination(pid) else {
            return Ok(());
        };
        log::info!("[proc] Terminating {}", pid);

        for chan in channels {
            match chan.on_terminate {
                Some(OnTerminate::NotifyPeer {
                    pid: peer,
                    channel,
                }) => {
                    if self.registry.close_channel(&peer, &channel).is_some() {
                        self.deliver(&peer, Message::channel_notice(channel, None));
                    }
                }
                Some(OnTerminate::CloseHandler) => {
                    let (Some(handler), Some(path)) = (chan.handler, chan.path) else {
                        continue;
                    };
                    let close = Message::new(MessageType::Close).with_channel(chan.id.clone());
                    let target = Target::Channel(ChannelTarget {
                        id: chan.id,
                        path,
                        meta: chan.meta,
                    });
                    self.dispatch(&handler, target, pid, close);
                }
                None => {}
            }
        }

        self.registry.finish_termination(pid);
        Ok(())
    }

    /// Context acknowledged: deliver INIT and mark the process RUNNING.
    fn on_created(&mut self, pid: &Pid) {
        let Some(process) = self.registry.get(pid) else {
            return;
        };
        if process.status != ProcessStatus::Spawning {
            log::debug!("[proc] Ignoring duplicate CREATED from {}", pid);
            return;
        }

        let channels: alloc::vec::Vec<&str> =
            process.channels.keys().map(|c| c.as_str()).collect();
        let init = Message::new(MessageType::Init).with_payload(json!({
            "pid": pid,
            "path": process.path,
            "argv": process.argv,
            "channels": channels,
        }));

        self.deliver(pid, init);
        self.registry.set_status(pid, ProcessStatus::Running);
    }
}
