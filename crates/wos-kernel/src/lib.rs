//! WOS Kernel
//!
//! The kernel of an in-browser micro-kernel. It hosts untrusted processes in
//! sandboxed execution contexts and implements:
//!
//! - **Process registry**: pid allocation, lifecycle, per-process channels
//! - **IPC router**: channel handshake between processes and relaying
//! - **VFS dispatch**: assigns, volume mounts and handler invocation
//! - **`internal:` volume**: kernel-hosted handlers such as the console
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                              Kernel<S>                                │
//! │                                                                       │
//! │   HostEvent ──▶ lifecycle ──▶ router ─┬─▶ process ──▶ handshake/relay │
//! │                                       ├─▶ channel ──▶ peer / handler  │
//! │                                       └─▶ path ─────▶ assigns         │
//! │                                                        │              │
//! │                                                        ▼              │
//! │   ProcessRegistry<S>   MountTable<Handler>   ──▶ Handler::Function    │
//! │   (owns Sandbox S)     AssignTable                  (Scheduler)       │
//! │                                              ──▶ Handler::Process     │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The kernel handles one host event at a time. Function handlers are never
//! called from inside a router pass; they are queued and run by
//! [`Kernel::run_pending`].

#![no_std]
extern crate alloc;

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod ids;
pub mod internal;
pub mod process;
pub mod registry;
pub mod scheduler;

mod lifecycle;
mod router;
mod vfs;

use alloc::boxed::Box;
use alloc::vec::Vec;

use serde_json::Value;
use wos_hal::Sandbox;
use wos_ipc::{ChannelId, Message, Pid};
use wos_vfs::{AssignTable, MountTable};

pub use channel::{Channel, ChannelMeta, OnTerminate};
pub use config::{AssignConfig, KernelConfig, MountConfig};
pub use error::KernelError;
pub use handler::{ChannelTarget, Handler, HandlerContext, HandlerFn, MountSpec, Target};
pub use internal::{content_handler, ConsoleBuffer, ConsoleSink, InternalFn, InternalVolume};
pub use process::{sanitize_argv, ProcessInfo, ProcessStatus};
pub use registry::{ProcessRegistry, StatusObserver};
pub use scheduler::{Scheduler, Task};

// Re-export protocol and sandbox types
pub use wos_hal::{HostEvent, SandboxError};
pub use wos_ipc::{ErrorKind, MessageType};

/// The kernel context: every table the kernel consults.
pub struct Kernel<S: Sandbox> {
    registry: ProcessRegistry<S>,
    mounts: MountTable<Handler>,
    assigns: AssignTable,
    scheduler: Scheduler,
}

impl<S: Sandbox> Kernel<S> {
    /// Create a kernel with empty mount and assign tables.
    pub fn new(sandbox: S, config: &KernelConfig) -> Self {
        Self {
            registry: ProcessRegistry::new(sandbox, config.id_length),
            mounts: MountTable::new(),
            assigns: AssignTable::new(config.max_assign_rounds),
            scheduler: Scheduler::new(),
        }
    }

    /// Create a kernel and apply the boot wiring.
    ///
    /// Mounts `internal:`, then the configured process-backed volumes, then
    /// the configured assigns. Any failure aborts the boot.
    pub fn boot(
        sandbox: S,
        config: &KernelConfig,
        internal: InternalVolume,
    ) -> Result<Self, KernelError> {
        log::info!("[vfs] Initializing VFS");
        let mut kernel = Self::new(sandbox, config);

        kernel.mount("internal", MountSpec::Function(internal.into_handler()))?;

        for mount in &config.mounts {
            kernel.mount(
                &mount.volume,
                MountSpec::process(mount.path.as_str(), mount.argv.clone()),
            )?;
        }

        for assign in &config.assigns {
            if !kernel.assign(&assign.source, &assign.dest) {
                log::error!("[vfs] Invalid assign {} -> {}", assign.source, assign.dest);
                return Err(KernelError::InvalidAssign {
                    from: assign.source.clone(),
                    to: assign.dest.clone(),
                });
            }
        }

        Ok(kernel)
    }

    pub fn sandbox(&self) -> &S {
        self.registry.sandbox()
    }

    // =========================================================================
    // Processes
    // =========================================================================

    /// Spawn a process running `path`. `argv` must be a JSON array.
    pub fn spawn(&mut self, path: &str, argv: Value) -> Result<Pid, KernelError> {
        self.registry.spawn(path, argv)
    }

    /// Listing of every live process.
    pub fn ps(&self) -> Vec<ProcessInfo> {
        self.registry.list()
    }

    pub fn status(&self, pid: &Pid) -> Option<ProcessStatus> {
        self.registry.status(pid)
    }

    /// Ids of the channels `pid` owns.
    pub fn channels(&self, pid: &Pid) -> Vec<ChannelId> {
        self.registry
            .get(pid)
            .map(|p| p.channels.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn channel(&self, pid: &Pid, id: &ChannelId) -> Option<&Channel> {
        self.registry.get_channel(pid, id)
    }

    /// Subscribe to process status transitions.
    pub fn on_status<F>(&mut self, observer: F)
    where
        F: FnMut(&Pid, ProcessStatus) + 'static,
    {
        self.registry.on_status(Box::new(observer));
    }

    // =========================================================================
    // Deferred handler calls
    // =========================================================================

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Run the function-handler calls queued so far.
    ///
    /// Calls queued while running are left for the next invocation. Returns
    /// the number of calls run.
    pub fn run_pending(&mut self) -> usize {
        let count = self.scheduler.len();
        for _ in 0..count {
            let Some(task) = self.scheduler.pop() else {
                break;
            };
            let ctx: &mut dyn HandlerContext = self;
            task(ctx);
        }
        count
    }

    /// Post an envelope to a process, logging failures.
    fn deliver(&self, to: &Pid, msg: Message) {
        if let Err(e) = self.registry.post(to, &msg) {
            log::warn!("[ipc] Undeliverable {} to {}: {}", msg.kind, to, e);
        }
    }
}

impl<S: Sandbox> HandlerContext for Kernel<S> {
    fn post(&mut self, to: &Pid, msg: Message) {
        self.deliver(to, msg);
    }
}
