//! Assign table: user-level path remapping.
//!
//! An assign maps a source prefix (always carrying its volume colon) to a
//! destination path. Resolution rewrites a path until no unused assign
//! matches:
//!
//! ```text
//! debugcon:../unsafe
//!   debugcon:  -> con:debug/restricted     con:debug/restricted/unsafe
//!   con:       -> internal:console         internal:console/debug/restricted/unsafe
//! ```
//!
//! Each entry fires at most once per resolution, so cycles terminate. The
//! number of rounds is additionally capped; hitting the cap is a
//! configuration error.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::VfsError;
use crate::path::{join_volume, normalize_path, split_path};

/// Default cap on substitution rounds per resolution.
pub const DEFAULT_MAX_ROUNDS: usize = 32;

/// Ordered table of `source -> destination` assigns.
#[derive(Clone, Debug)]
pub struct AssignTable {
    /// Entries in insertion order; replacing a source keeps its position
    entries: Vec<(String, String)>,
    max_rounds: usize,
}

impl AssignTable {
    /// Create an empty table with the given round cap.
    pub fn new(max_rounds: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_rounds,
        }
    }

    /// Round cap applied by [`AssignTable::resolve`].
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Add or replace an assign.
    ///
    /// Both sides must be in `volume:path` form; their paths are normalized
    /// before storing. Returns false when either side lacks a volume.
    pub fn assign(&mut self, source: &str, dest: &str) -> bool {
        let (Some(source), Some(dest)) = (canonical(source), canonical(dest)) else {
            log::debug!("[vfs] Rejected assign {:?} -> {:?}", source, dest);
            return false;
        };

        log::info!("[vfs] Assigning {} \"{}\"", source, dest);
        match self.entries.iter_mut().find(|(src, _)| *src == source) {
            Some(entry) => entry.1 = dest,
            None => self.entries.push((source, dest)),
        }
        true
    }

    /// Remove an assign by its exact source. Returns whether one existed.
    pub fn unassign(&mut self, source: &str) -> bool {
        log::info!("[vfs] Unassigning {}", source);
        let before = self.entries.len();
        self.entries.retain(|(src, _)| src != source);
        self.entries.len() != before
    }

    /// Snapshot of all assigns in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }

    /// Rewrite `path` through the table.
    ///
    /// Repeatedly applies the first unused entry whose source is a literal
    /// prefix of the current path, replacing the prefix with the destination
    /// and normalizing the remainder.
    pub fn resolve(&self, path: &str) -> Result<String, VfsError> {
        let mut current = String::from(path);
        let mut applied: BTreeSet<usize> = BTreeSet::new();
        let mut rounds = 0;

        loop {
            let hit = self
                .entries
                .iter()
                .enumerate()
                .find(|(i, (src, _))| !applied.contains(i) && current.starts_with(src.as_str()));

            let Some((index, (source, dest))) = hit else {
                return Ok(current);
            };

            if rounds >= self.max_rounds {
                log::error!(
                    "[vfs] Assign resolution of {:?} exceeded {} rounds",
                    path,
                    self.max_rounds
                );
                return Err(VfsError::AssignBoundExceeded {
                    path: String::from(path),
                    rounds,
                });
            }

            let rest = normalize_path(&current[source.len()..]);
            current = normalize_path(&format!("{}/{}", dest, rest));
            applied.insert(index);
            rounds += 1;
        }
    }
}

impl Default for AssignTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROUNDS)
    }
}

/// `volume:normalized-path`, or `None` without a volume.
fn canonical(full: &str) -> Option<String> {
    match split_path(full) {
        (Some(volume), path) => Some(join_volume(volume, &normalize_path(path))),
        (None, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console_table() -> AssignTable {
        let mut table = AssignTable::default();
        assert!(table.assign("con:foo/..", "internal:console/../console/"));
        assert!(table.assign("debugcon:", "con:debug/restricted"));
        table
    }

    #[test]
    fn test_assign_normalizes_both_sides() {
        let entries = console_table().entries();
        assert_eq!(
            entries,
            alloc::vec![
                (String::from("con:"), String::from("internal:console")),
                (String::from("debugcon:"), String::from("con:debug/restricted")),
            ]
        );
    }

    #[test]
    fn test_resolve_chains() {
        let table = console_table();
        assert_eq!(table.resolve("con:debug").unwrap(), "internal:console/debug");
        assert_eq!(
            table.resolve("debugcon:../unsafe").unwrap(),
            "internal:console/debug/restricted/unsafe"
        );
        assert_eq!(table.resolve("other:x").unwrap(), "other:x");
    }

    #[test]
    fn test_assign_requires_volumes() {
        let mut table = AssignTable::default();
        assert!(!table.assign("nocolon", "internal:console"));
        assert!(!table.assign("con:", "/abs/path"));
        assert!(table.entries().is_empty());
    }

    #[test]
    fn test_reassign_keeps_position() {
        let mut table = console_table();
        assert!(table.assign("con:", "internal:other"));
        let entries = table.entries();
        assert_eq!(entries[0], (String::from("con:"), String::from("internal:other")));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_unassign() {
        let mut table = console_table();
        assert!(table.unassign("debugcon:"));
        assert!(!table.unassign("debugcon:"));
        assert_eq!(
            table.resolve("debugcon:x").unwrap(),
            "debugcon:x"
        );
    }

    #[test]
    fn test_cycle_terminates() {
        let mut table = AssignTable::default();
        table.assign("a:", "b:");
        table.assign("b:", "a:");
        // a: -> b: -> a:, then both entries are spent
        assert_eq!(table.resolve("a:x").unwrap(), "a:/x");
    }

    #[test]
    fn test_bound_exceeded() {
        let mut table = AssignTable::new(1);
        table.assign("a:", "b:");
        table.assign("b:", "c:");
        assert_eq!(
            table.resolve("a:x"),
            Err(VfsError::AssignBoundExceeded {
                path: String::from("a:x"),
                rounds: 1,
            })
        );
        assert_eq!(table.resolve("b:x").unwrap(), "c:/x");
    }
}
