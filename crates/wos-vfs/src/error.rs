//! VFS error types.

use alloc::string::String;

/// Errors raised while configuring or resolving the VFS.
///
/// All of these are configuration-time failures; request-time problems
/// travel back to processes as `ERROR` envelopes instead.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    /// Volume name does not match `[a-z0-9]+`
    #[error("invalid volume name: {0:?}")]
    InvalidVolume(String),

    /// Volume already has a handler
    #[error("{0} is already mounted")]
    AlreadyMounted(String),

    /// Assign resolution did not settle within the substitution bound
    #[error("assign resolution of {path:?} exceeded {rounds} rounds")]
    AssignBoundExceeded { path: String, rounds: usize },

    /// Operation exists in the interface but has no implementation
    #[error("{0} is unimplemented")]
    Unimplemented(&'static str),
}
