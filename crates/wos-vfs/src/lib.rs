//! WOS Virtual Filesystem Layer
//!
//! Pure path algebra and the two configuration tables the kernel consults on
//! every path-addressed request:
//!
//! - **Path**: normalization and `volume:path` splitting
//! - **Assigns**: bounded, cycle-safe prefix rewriting
//! - **Mounts**: volume name to handler binding
//!
//! # Resolution
//!
//! ```text
//!   "debugcon:../unsafe"
//!           │
//!           ▼  AssignTable::resolve
//!   "internal:console/debug/restricted/unsafe"
//!           │
//!           ▼  MountTable::resolve_path
//!   (handler of "internal", "console/debug/restricted/unsafe")
//! ```
//!
//! The handler type is generic; the kernel decides what a handler is.

#![no_std]
extern crate alloc;

pub mod assign;
pub mod error;
pub mod mount;
pub mod path;

pub use assign::{AssignTable, DEFAULT_MAX_ROUNDS};
pub use error::VfsError;
pub use mount::MountTable;
pub use path::{is_volume_name, join_volume, normalize_path, split_path};
