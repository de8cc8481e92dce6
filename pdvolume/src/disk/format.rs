//! Mount a block device, formatting it first when it carries no filesystem.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use pdvolume_shared::constants::disk;
use pdvolume_shared::errors::{PdError, PdResult};

use crate::mount::{MountFlags, Mounter};

/// Wraps a [`Mounter`] with format-on-first-use.
///
/// Formatting is delegated to `mkfs.<fstype>`; detection to `blkid`.
/// Read-only mounts are never formatted.
#[derive(Clone)]
pub struct SafeFormatAndMount {
    mounter: Arc<dyn Mounter>,
    default_fs_type: String,
}

impl SafeFormatAndMount {
    pub fn new(mounter: Arc<dyn Mounter>) -> Self {
        Self {
            mounter,
            default_fs_type: disk::DEFAULT_FS_TYPE.to_string(),
        }
    }

    /// Filesystem used when formatting a disk whose spec names none.
    pub fn with_default_fs_type(mut self, fs_type: impl Into<String>) -> Self {
        self.default_fs_type = fs_type.into();
        self
    }

    /// Mount `device` on `target`, formatting it if the first attempt fails
    /// because the device is blank.
    pub fn format_and_mount(
        &self,
        device: &Path,
        target: &Path,
        fs_type: Option<&str>,
        flags: MountFlags,
    ) -> PdResult<()> {
        let first = self.mounter.mount(device, target, fs_type, flags, None);
        let mount_err = match first {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if flags.contains(MountFlags::READ_ONLY) {
            return Err(mount_err);
        }

        match probe_fs_type(device)? {
            Some(existing) => {
                tracing::warn!(
                    device = %device.display(),
                    fs_type = %existing,
                    error = %mount_err,
                    "Mount failed on formatted device; not reformatting"
                );
                Err(mount_err)
            }
            None => {
                let fs_type = fs_type.unwrap_or(&self.default_fs_type);
                format_device(device, fs_type)?;
                self.mounter.mount(device, target, Some(fs_type), flags, None)
            }
        }
    }
}

/// Filesystem type on `device`, `None` when blank.
fn probe_fs_type(device: &Path) -> PdResult<Option<String>> {
    let output = Command::new("blkid")
        .args(["-p", "-s", "TYPE", "-o", "value"])
        .arg(device)
        .output()
        .map_err(|e| {
            PdError::mount(
                device.display().to_string(),
                device,
                format!("failed to run blkid: {e}"),
            )
        })?;

    // blkid exits 2 when nothing was found on the device.
    match output.status.code() {
        Some(0) => Ok(parse_blkid_type(&String::from_utf8_lossy(&output.stdout))),
        Some(2) => Ok(None),
        _ => Err(PdError::mount(
            device.display().to_string(),
            device,
            format!(
                "blkid failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        )),
    }
}

fn parse_blkid_type(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

fn format_device(device: &Path, fs_type: &str) -> PdResult<()> {
    tracing::info!(device = %device.display(), fs_type, "Formatting blank disk");

    let mkfs = format!("mkfs.{fs_type}");
    let output = Command::new(&mkfs)
        .args(mkfs_args(fs_type))
        .arg(device)
        .output()
        .map_err(|e| {
            PdError::mount(
                device.display().to_string(),
                device,
                format!("failed to run {mkfs}: {e}"),
            )
        })?;

    if !output.status.success() {
        return Err(PdError::mount(
            device.display().to_string(),
            device,
            format!(
                "{mkfs} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    tracing::info!(device = %device.display(), fs_type, "Formatted disk");
    Ok(())
}

fn mkfs_args(fs_type: &str) -> &'static [&'static str] {
    match fs_type {
        // Initialize inode tables and journal now instead of in the background.
        "ext3" | "ext4" => &["-F", "-E", "lazy_itable_init=0,lazy_journal_init=0"],
        "xfs" => &["-f"],
        _ => &[],
    }
}
