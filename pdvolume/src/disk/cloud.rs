//! DiskManager over a cloud volume provider.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pdvolume_shared::constants::dirs;
use pdvolume_shared::errors::{PdError, PdResult};

use super::{DiskManager, DiskRef, SafeFormatAndMount, VolumeProvider};
use crate::mount::{MountFlags, Mounter, UnmountFlags};

/// How long to wait for the device node after the provider reports an attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOptions {
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            poll_attempts: 60,
        }
    }
}

/// Attaches through a [`VolumeProvider`] and mounts through a [`Mounter`].
pub struct CloudDiskManager {
    provider: Arc<dyn VolumeProvider>,
    mounter: Arc<dyn Mounter>,
    disk_mounter: SafeFormatAndMount,
    options: AttachOptions,
}

impl CloudDiskManager {
    pub fn new(provider: Arc<dyn VolumeProvider>, mounter: Arc<dyn Mounter>) -> Self {
        let disk_mounter = SafeFormatAndMount::new(mounter.clone());
        Self {
            provider,
            mounter,
            disk_mounter,
            options: AttachOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AttachOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_disk_mounter(mut self, disk_mounter: SafeFormatAndMount) -> Self {
        self.disk_mounter = disk_mounter;
        self
    }

    fn wait_for_device(&self, pd_name: &str, device: &Path) -> PdResult<()> {
        for attempt in 1..=self.options.poll_attempts.max(1) {
            if device.exists() {
                tracing::debug!(device = %device.display(), attempt, "Device node present");
                return Ok(());
            }
            tracing::debug!(device = %device.display(), attempt, "Waiting for device node");
            std::thread::sleep(self.options.poll_interval);
        }
        Err(PdError::remote_attach(
            pd_name,
            format!(
                "device {} did not appear after {} attempts",
                device.display(),
                self.options.poll_attempts
            ),
        ))
    }

    fn is_mounted(&self, path: &Path) -> PdResult<bool> {
        match self.mounter.is_mount_point(path) {
            Ok(mounted) => Ok(mounted),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// `/dev/xvdf` with partition 1 is `/dev/xvdf1`; names ending in a digit
/// (`nvme1n1`, `mmcblk0`, `loop3`) take a `p`: `/dev/nvme1n1p1`.
pub(crate) fn partition_device(device: &Path, partition: Option<u32>) -> PathBuf {
    let Some(n) = partition else {
        return device.to_path_buf();
    };

    let mut name = device.as_os_str().to_os_string();
    if name.as_encoded_bytes().last().is_some_and(u8::is_ascii_digit) {
        name.push("p");
    }
    name.push(n.to_string());
    PathBuf::from(name)
}

impl DiskManager for CloudDiskManager {
    fn attach_and_mount_disk(&self, disk: &DiskRef<'_>, global_path: &Path) -> PdResult<()> {
        let device = self.provider.attach_disk(disk.pd_name, disk.read_only)?;
        let device = partition_device(&device, disk.partition);
        self.wait_for_device(disk.pd_name, &device)?;

        if self.is_mounted(global_path)? {
            tracing::debug!(
                pd_name = disk.pd_name,
                global_path = %global_path.display(),
                "Disk already mounted globally"
            );
            return Ok(());
        }

        DirBuilder::new()
            .recursive(true)
            .mode(dirs::DIR_MODE)
            .create(global_path)
            .map_err(|e| PdError::filesystem("create dir", global_path, e))?;

        let flags = if disk.read_only {
            MountFlags::READ_ONLY
        } else {
            MountFlags::empty()
        };

        if let Err(e) = self
            .disk_mounter
            .format_and_mount(&device, global_path, disk.fs_type, flags)
        {
            if let Err(rm) = std::fs::remove_dir(global_path) {
                tracing::warn!(
                    global_path = %global_path.display(),
                    error = %rm,
                    "Failed to remove global mount dir after mount failure"
                );
            }
            return Err(e);
        }

        tracing::info!(
            pd_name = disk.pd_name,
            device = %device.display(),
            global_path = %global_path.display(),
            "Disk attached and mounted"
        );
        Ok(())
    }

    fn detach_disk(&self, disk: &DiskRef<'_>, global_path: &Path) -> PdResult<()> {
        if self.is_mounted(global_path)? {
            self.mounter.unmount(global_path, UnmountFlags::empty())?;
        }

        match std::fs::remove_dir(global_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(PdError::filesystem("remove dir", global_path, e)),
        }

        self.provider.detach_disk(disk.pd_name)?;
        tracing::info!(pd_name = disk.pd_name, "Disk detached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_device() {
        assert_eq!(
            partition_device(Path::new("/dev/xvdf"), Some(1)),
            PathBuf::from("/dev/xvdf1")
        );
        assert_eq!(
            partition_device(Path::new("/dev/xvdf"), None),
            PathBuf::from("/dev/xvdf")
        );
    }

    #[test]
    fn test_partition_device_after_digit() {
        assert_eq!(
            partition_device(Path::new("/dev/nvme1n1"), Some(1)),
            PathBuf::from("/dev/nvme1n1p1")
        );
        assert_eq!(
            partition_device(Path::new("/dev/mmcblk0"), Some(2)),
            PathBuf::from("/dev/mmcblk0p2")
        );
        assert_eq!(
            partition_device(Path::new("/dev/nvme1n1"), None),
            PathBuf::from("/dev/nvme1n1")
        );
    }

    #[test]
    fn test_default_attach_options() {
        let options = AttachOptions::default();
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert_eq!(options.poll_attempts, 60);
    }
}
