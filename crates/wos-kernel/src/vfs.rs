//! VFS operations of the kernel: mounts, assigns and handler dispatch.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use serde_json::Value;
use wos_hal::Sandbox;
use wos_ipc::{error_reply, make_reply, ErrorKind, Message, MessageType, Pid};
use wos_vfs::VfsError;

use crate::channel::{ChannelMeta, OnTerminate};
use crate::error::KernelError;
use crate::handler::{ChannelTarget, Handler, HandlerContext, MountSpec, Target};
use crate::process::sanitize_argv;
use crate::Kernel;

impl<S: Sandbox> Kernel<S> {
    // =========================================================================
    // Mounts
    // =========================================================================

    /// Mount a handler on `volume`.
    ///
    /// A process handler spawns its backing process now. If that spawn
    /// fails the volume is still mounted, and requests to it get `ESRCH`.
    pub fn mount(&mut self, volume: &str, spec: MountSpec) -> Result<(), KernelError> {
        if let Err(e) = self.mounts.check_available(volume) {
            log::error!("[vfs] Cannot mount {}: {}", volume, e);
            return Err(e.into());
        }

        let handler = match spec {
            MountSpec::Function(f) => {
                log::info!("[vfs] Mounting {}: function", volume);
                Handler::Function(f)
            }
            MountSpec::Process { path, argv } => {
                log::info!(
                    "[vfs] Mounting {}: \"{}\" {}",
                    volume,
                    path,
                    serde_json::to_string(&sanitize_argv(&argv)).unwrap_or_default()
                );
                let pid = match self.registry.spawn(&path, Value::Array(argv.clone())) {
                    Ok(pid) => Some(pid),
                    Err(e) => {
                        log::warn!("[vfs] Backing process for {}: failed: {}", volume, e);
                        None
                    }
                };
                Handler::Process { pid, argv }
            }
        };

        self.mounts.mount(volume, handler)?;
        Ok(())
    }

    /// Not supported; mounts are permanent.
    pub fn unmount(&mut self, volume: &str) -> Result<(), KernelError> {
        Ok(self.mounts.unmount(volume)?)
    }

    /// Not supported.
    pub fn get_mounts(&self) -> Result<Vec<String>, KernelError> {
        let mounts = self.mounts.mounts()?;
        Ok(mounts.into_iter().map(|(volume, _)| volume).collect())
    }

    // =========================================================================
    // Assigns
    // =========================================================================

    /// Add or replace an assign. Returns false unless both sides carry a
    /// volume.
    pub fn assign(&mut self, source: &str, dest: &str) -> bool {
        self.assigns.assign(source, dest)
    }

    pub fn unassign(&mut self, source: &str) -> bool {
        self.assigns.unassign(source)
    }

    /// All assigns, in resolution order.
    pub fn assigns(&self) -> Vec<(String, String)> {
        self.assigns.entries()
    }

    /// Rewrite `path` through the assigns and locate its handler.
    ///
    /// Returns the resolved full path, the handler (if the volume is
    /// mounted) and the normalized path within the volume.
    pub fn resolve(&self, path: &str) -> Result<(String, Option<&Handler>, String), VfsError> {
        let full = self.assigns.resolve(path)?;
        let (handler, rest) = self.mounts.resolve_path(&full);
        Ok((full, handler, rest))
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// A path-addressed request from `from`.
    pub(crate) fn route_path(&mut self, from: &Pid, msg: Message) -> Result<(), KernelError> {
        let Some(raw) = msg.path.clone() else {
            return Ok(());
        };

        let (handler, path) = match self.resolve(&raw) {
            Ok((_, handler, path)) => (handler.cloned(), path),
            Err(e) => return Err(e.into()),
        };
        let Some(handler) = handler else {
            log::debug!("[vfs] No volume for {:?}", raw);
            self.deliver(from, error_reply(ErrorKind::Enodev, &msg));
            return Ok(());
        };

        if msg.kind != MessageType::Open {
            self.dispatch(&handler, Target::Path(path), from, msg);
            return Ok(());
        }

        let id = match self.registry.open_channel(from) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("[vfs] Cannot open channel in {}: {}", from, e);
                self.deliver(from, error_reply(ErrorKind::Efault, &msg));
                return Ok(());
            }
        };
        let meta = match self.registry.get_channel_mut(from, &id) {
            Some(chan) => {
                chan.path = Some(path.clone());
                chan.handler = Some(handler.clone());
                chan.on_terminate = Some(OnTerminate::CloseHandler);
                chan.meta.clone()
            }
            None => ChannelMeta::new(),
        };

        let notice = make_reply(
            Message::new(MessageType::Channel)
                .with_path(raw)
                .with_channel(id.clone()),
            &msg,
        );
        self.deliver(from, notice);

        let target = Target::Channel(ChannelTarget {
            id,
            path,
            meta,
        });
        self.dispatch(&handler, target, from, msg);
        Ok(())
    }

    /// Hand a request to a handler.
    ///
    /// Function handlers are queued; process handlers get the request as a
    /// message with `process` naming the requester and the destination
    /// turned into `path` or `channel`.
    pub(crate) fn dispatch(&mut self, handler: &Handler, to: Target, from: &Pid, msg: Message) {
        match handler {
            Handler::Function(f) => {
                let f = f.clone();
                let from = from.clone();
                self.scheduler
                    .schedule(Box::new(move |ctx: &mut dyn HandlerContext| {
                        f(ctx, to, &from, msg)
                    }));
            }
            Handler::Process { pid: Some(pid), .. } if self.registry.contains(pid) => {
                let mut forward = msg;
                forward.process = Some(from.clone());
                match to {
                    Target::Path(path) => {
                        forward.path = Some(path);
                        forward.channel = None;
                    }
                    Target::Channel(chan) => {
                        forward.path = Some(chan.path);
                        forward.channel = Some(chan.id);
                    }
                }
                self.deliver(pid, forward);
            }
            Handler::Process { .. } => {
                self.deliver(from, error_reply(ErrorKind::Esrch, &msg));
            }
        }
    }
}
