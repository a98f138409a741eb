//! Mount table: volume name to handler.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::VfsError;
use crate::path::{is_volume_name, normalize_path, split_path};

/// Volumes bound to handlers of type `H`.
///
/// A volume is mounted at most once; there is no way to replace or remove a
/// mount.
#[derive(Debug)]
pub struct MountTable<H> {
    mounts: BTreeMap<String, H>,
}

impl<H> MountTable<H> {
    pub fn new() -> Self {
        Self {
            mounts: BTreeMap::new(),
        }
    }

    /// Check that `volume` is a valid name that is not mounted yet.
    pub fn check_available(&self, volume: &str) -> Result<(), VfsError> {
        if !is_volume_name(volume) {
            return Err(VfsError::InvalidVolume(String::from(volume)));
        }
        if self.mounts.contains_key(volume) {
            return Err(VfsError::AlreadyMounted(String::from(volume)));
        }
        Ok(())
    }

    /// Bind `handler` to `volume`.
    pub fn mount(&mut self, volume: &str, handler: H) -> Result<(), VfsError> {
        self.check_available(volume)?;
        self.mounts.insert(String::from(volume), handler);
        Ok(())
    }

    /// Handler bound to `volume`.
    pub fn get(&self, volume: &str) -> Option<&H> {
        self.mounts.get(volume)
    }

    pub fn is_mounted(&self, volume: &str) -> bool {
        self.mounts.contains_key(volume)
    }

    /// Resolve a full path to its volume handler and normalized path.
    ///
    /// The handler is absent when the path has no volume or the volume is
    /// not mounted.
    pub fn resolve_path(&self, full: &str) -> (Option<&H>, String) {
        let (volume, path) = split_path(full);
        let handler = volume.and_then(|v| self.mounts.get(v));
        (handler, normalize_path(path))
    }

    /// Remove a mount. Not supported.
    pub fn unmount(&mut self, volume: &str) -> Result<(), VfsError> {
        if !is_volume_name(volume) {
            return Err(VfsError::InvalidVolume(String::from(volume)));
        }
        Err(VfsError::Unimplemented("unmount"))
    }

    /// List the mounts. Not supported.
    pub fn mounts(&self) -> Result<Vec<(String, &H)>, VfsError> {
        Err(VfsError::Unimplemented("get_mounts"))
    }
}

impl<H> Default for MountTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_once() {
        let mut table = MountTable::new();
        table.mount("internal", 1).unwrap();
        assert_eq!(
            table.mount("internal", 2),
            Err(VfsError::AlreadyMounted(String::from("internal")))
        );
        assert_eq!(table.get("internal"), Some(&1));
    }

    #[test]
    fn test_invalid_volume() {
        let mut table = MountTable::new();
        assert_eq!(
            table.mount("Bad-Name", 1),
            Err(VfsError::InvalidVolume(String::from("Bad-Name")))
        );
        assert!(!table.is_mounted("Bad-Name"));
    }

    #[test]
    fn test_resolve_path() {
        let mut table = MountTable::new();
        table.mount("internal", 7).unwrap();

        let (handler, path) = table.resolve_path("internal:console//foo/");
        assert_eq!(handler, Some(&7));
        assert_eq!(path, "console/foo");

        let (handler, path) = table.resolve_path("nope:x/../y");
        assert!(handler.is_none());
        assert_eq!(path, "y");

        let (handler, _) = table.resolve_path("relative/path");
        assert!(handler.is_none());
    }

    #[test]
    fn test_unmount_unimplemented() {
        let mut table: MountTable<u8> = MountTable::new();
        table.mount("internal", 1).unwrap();
        assert_eq!(table.unmount("internal"), Err(VfsError::Unimplemented("unmount")));
        assert!(table.mounts().is_err());
        assert!(table.is_mounted("internal"));
    }
}
