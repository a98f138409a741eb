//! Kernel error types.

use alloc::string::String;

use wos_hal::SandboxError;
use wos_ipc::Pid;
use wos_vfs::VfsError;

/// Errors returned by kernel operations.
///
/// These stay inside the kernel's host; processes only ever see `ERROR`
/// envelopes.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// No live process with this pid
    #[error("process not found: {0}")]
    ProcessNotFound(Pid),

    /// argv was not a sequence
    #[error("invalid argv for {path}: expected an array")]
    InvalidArgv { path: String },

    /// Identifier generation kept colliding
    #[error("no free identifier after {0} attempts")]
    IdSpaceExhausted(usize),

    /// Assign rejected at boot
    #[error("invalid assign {from} -> {to}")]
    InvalidAssign { from: String, to: String },

    /// Configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}
