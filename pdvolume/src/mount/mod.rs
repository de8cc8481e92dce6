//! Mount table access.
//!
//! [`Mounter`] is the seam between volume orchestration and the OS mount
//! table. [`LinuxMounter`] talks to the kernel; tests substitute an
//! in-memory table.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub mod mountinfo;

use std::ops::BitOr;
use std::path::{Path, PathBuf};

use pdvolume_shared::errors::PdResult;

#[cfg(target_os = "linux")]
pub use linux::LinuxMounter;

/// One entry of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPoint {
    /// Mount source as recorded by the kernel (device node, tag or directory).
    pub device: String,
    /// Where the entry is mounted.
    pub path: PathBuf,
    pub fs_type: String,
    pub options: Vec<String>,
}

/// Flags accepted by [`Mounter::mount`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountFlags(u8);

impl MountFlags {
    /// Expose an already mounted tree at a second path.
    pub const BIND: Self = Self(1);
    /// Reject writes through this entry.
    pub const READ_ONLY: Self = Self(1 << 1);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MountFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Flags accepted by [`Mounter::unmount`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnmountFlags(u8);

impl UnmountFlags {
    /// Abort pending requests (MNT_FORCE).
    pub const FORCE: Self = Self(1);
    /// Lazy unmount (MNT_DETACH).
    pub const DETACH: Self = Self(1 << 1);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UnmountFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Mount table primitives.
///
/// Every call is synchronous and reads or writes the live table; results are
/// snapshots that another process may invalidate immediately.
pub trait Mounter: Send + Sync {
    /// Mount `source` on `target`.
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: Option<&str>,
        flags: MountFlags,
        data: Option<&str>,
    ) -> PdResult<()>;

    /// Remove the single entry mounted at `target`.
    ///
    /// Callers check [`Mounter::is_mount_point`] first; unmounting a path
    /// that is not mounted is an error.
    fn unmount(&self, target: &Path, flags: UnmountFlags) -> PdResult<()>;

    /// Whether `path` is a distinct entry in the mount table.
    ///
    /// A missing `path` yields a `MountQuery` error whose
    /// [`is_not_found`](pdvolume_shared::PdError::is_not_found) is true.
    fn is_mount_point(&self, path: &Path) -> PdResult<bool>;

    /// Snapshot of the whole mount table.
    fn list(&self) -> PdResult<Vec<MountPoint>>;

    /// Every mount path sharing the device mounted at `path`, `path` included.
    ///
    /// Returns an empty list when `path` is not in the table.
    fn mount_refs(&self, path: &Path) -> PdResult<Vec<PathBuf>> {
        Ok(mount_refs_in(&self.list()?, path))
    }
}

/// Reference lookup over an already captured table.
pub fn mount_refs_in(table: &[MountPoint], path: &Path) -> Vec<PathBuf> {
    // Later entries shadow earlier ones mounted on the same path.
    let Some(device) = table
        .iter()
        .rev()
        .find(|mp| mp.path == path)
        .map(|mp| mp.device.as_str())
    else {
        return Vec::new();
    };

    let mut refs: Vec<PathBuf> = Vec::new();
    for mp in table.iter().filter(|mp| mp.device == device) {
        if !refs.contains(&mp.path) {
            refs.push(mp.path.clone());
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(device: &str, path: &str) -> MountPoint {
        MountPoint {
            device: device.to_string(),
            path: PathBuf::from(path),
            fs_type: "ext4".to_string(),
            options: vec!["rw".to_string()],
        }
    }

    #[test]
    fn test_flags_compose() {
        let flags = MountFlags::BIND | MountFlags::READ_ONLY;
        assert!(flags.contains(MountFlags::BIND));
        assert!(flags.contains(MountFlags::READ_ONLY));
        assert!(!MountFlags::BIND.contains(MountFlags::READ_ONLY));
        assert!(!UnmountFlags::empty().contains(UnmountFlags::FORCE));
    }

    #[test]
    fn test_refs_include_path_and_siblings() {
        let table = vec![
            entry("/dev/nvme0n1p2", "/"),
            entry("/dev/xvdf", "/plugins/pd/mounts/aws/us-east-1a/vol-1"),
            entry("/dev/xvdf", "/pods/p1/volumes/pd/data"),
            entry("/dev/xvdf", "/pods/p2/volumes/pd/data"),
            entry("/dev/xvdg", "/plugins/pd/mounts/vol-2"),
        ];

        let refs = mount_refs_in(&table, Path::new("/pods/p1/volumes/pd/data"));
        assert_eq!(
            refs,
            vec![
                PathBuf::from("/plugins/pd/mounts/aws/us-east-1a/vol-1"),
                PathBuf::from("/pods/p1/volumes/pd/data"),
                PathBuf::from("/pods/p2/volumes/pd/data"),
            ]
        );
    }

    #[test]
    fn test_refs_of_unmounted_path_is_empty() {
        let table = vec![entry("/dev/xvdf", "/a")];
        assert!(mount_refs_in(&table, Path::new("/b")).is_empty());
    }
}
