//! Disk attach/detach.
//!
//! - [`DiskManager`] - what volume orchestration needs: attach + mount globally, detach
//! - [`VolumeProvider`] - the remote attach/detach API of the cloud provider
//! - [`CloudDiskManager`] - DiskManager over a VolumeProvider and a Mounter
//! - [`SafeFormatAndMount`] - mounts a device, formatting it first if blank

mod cloud;
mod format;
mod provider;

use std::path::Path;

use pdvolume_shared::errors::PdResult;

pub use cloud::{AttachOptions, CloudDiskManager};
pub use format::SafeFormatAndMount;
pub use provider::{CommandVolumeProvider, VolumeProvider};

/// Borrowed description of the disk a volume refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskRef<'a> {
    /// Provider-assigned identifier, e.g. `aws://us-east-1a/vol-0123`.
    pub pd_name: &'a str,
    /// Filesystem type; `None` lets the mount utility decide.
    pub fs_type: Option<&'a str>,
    /// Partition number on the device; `None` mounts the whole device.
    pub partition: Option<u32>,
    pub read_only: bool,
}

/// Attaches disks to this machine and detaches them again.
///
/// Implementations report failures verbatim and never retry; retry policy
/// belongs to whoever drives reconciliation.
pub trait DiskManager: Send + Sync {
    /// Attach `disk` and mount it at `global_path`.
    ///
    /// Must succeed when the disk is already attached and mounted there.
    fn attach_and_mount_disk(&self, disk: &DiskRef<'_>, global_path: &Path) -> PdResult<()>;

    /// Unmount `global_path` and detach `disk`.
    ///
    /// Only called once no workload bind mount references the disk.
    fn detach_disk(&self, disk: &DiskRef<'_>, global_path: &Path) -> PdResult<()>;
}
