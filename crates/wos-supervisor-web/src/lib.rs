//! Browser Supervisor for WOS
//!
//! This crate runs in the browser's main thread and hosts the kernel. Every
//! process is a Web Worker; envelopes cross the worker boundary as
//! structured-clone JSON values.
//!
//! ## Module Structure
//!
//! - `sandbox` - `Sandbox` implementation on Web Workers
//! - `supervisor` - JavaScript-facing API around the kernel
//! - `console` - console output sink and `log` backend
//! - `config` - supervisor configuration
//!
//! ## Event pump
//!
//! Worker callbacks only queue events. JavaScript drives the kernel by
//! calling `Supervisor::poll()`, which first runs deferred handler calls and
//! then routes every queued worker event.

// =============================================================================
// Module declarations
// =============================================================================

pub mod config;
pub mod console;
pub mod sandbox;
mod supervisor;

// =============================================================================
// Public re-exports
// =============================================================================

pub use config::SupervisorConfig;
pub use console::{CallbackConsole, ConsoleLogger};
pub use sandbox::{WorkerHandle, WorkerSandbox};
pub use supervisor::Supervisor;
