//! Kernel-backed mount table access.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use pdvolume_shared::errors::{PdError, PdResult};

use super::{MountFlags, MountPoint, Mounter, UnmountFlags, mountinfo};

/// Mounts through mount(2)/umount2(2) and reads `/proc/self/mountinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxMounter;

impl LinuxMounter {
    pub fn new() -> Self {
        Self
    }
}

impl Mounter for LinuxMounter {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: Option<&str>,
        flags: MountFlags,
        data: Option<&str>,
    ) -> PdResult<()> {
        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            fs_type = fs_type.unwrap_or(""),
            ?flags,
            "Mounting"
        );

        let bind = flags.contains(MountFlags::BIND);
        let read_only = flags.contains(MountFlags::READ_ONLY);

        let mut ms_flags = MsFlags::empty();
        if bind {
            ms_flags |= MsFlags::MS_BIND;
        } else if read_only {
            ms_flags |= MsFlags::MS_RDONLY;
        }

        mount(Some(source), target, fs_type, ms_flags, data)
            .map_err(|e| PdError::mount(source.display().to_string(), target, e))?;

        // The kernel ignores MS_RDONLY on the initial bind; it takes a remount.
        if bind && read_only {
            let remount = MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY;
            if let Err(e) = mount(None::<&str>, target, None::<&str>, remount, None::<&str>) {
                // Do not leave a writable bind behind a read-only request.
                if let Err(undo) = umount2(target, MntFlags::empty()) {
                    tracing::error!(
                        target = %target.display(),
                        error = %undo,
                        "Failed to undo bind mount after read-only remount failure"
                    );
                }
                return Err(PdError::mount(
                    source.display().to_string(),
                    target,
                    format!("read-only remount: {e}"),
                ));
            }
        }

        Ok(())
    }

    fn unmount(&self, target: &Path, flags: UnmountFlags) -> PdResult<()> {
        tracing::debug!(target = %target.display(), ?flags, "Unmounting");

        let mut mnt_flags = MntFlags::empty();
        if flags.contains(UnmountFlags::FORCE) {
            mnt_flags |= MntFlags::MNT_FORCE;
        }
        if flags.contains(UnmountFlags::DETACH) {
            mnt_flags |= MntFlags::MNT_DETACH;
        }

        umount2(target, mnt_flags).map_err(|e| PdError::unmount(target, e))
    }

    fn is_mount_point(&self, path: &Path) -> PdResult<bool> {
        // mountinfo records resolved absolute paths.
        let resolved = path
            .canonicalize()
            .map_err(|e| PdError::mount_query(path, e))?;
        let stat = std::fs::metadata(&resolved).map_err(|e| PdError::mount_query(path, e))?;

        // "/" has no parent but is always a mount point.
        let Some(parent) = resolved.parent() else {
            return Ok(true);
        };
        let parent_stat = std::fs::metadata(parent).map_err(|e| PdError::mount_query(parent, e))?;

        // A different device than the parent means a mount boundary. Bind
        // mounts from the same filesystem keep the device, so fall back to
        // the mount table for those.
        if stat.dev() != parent_stat.dev() {
            return Ok(true);
        }

        let table = mountinfo::read_mount_table()?;
        Ok(table.iter().any(|mp| mp.path == resolved))
    }

    fn list(&self) -> PdResult<Vec<MountPoint>> {
        mountinfo::read_mount_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_directory_is_not_mount_point() {
        let dir = tempfile::tempdir().unwrap();
        let child = dir.path().join("data");
        std::fs::create_dir(&child).unwrap();

        assert!(!LinuxMounter::new().is_mount_point(&child).unwrap());
    }

    #[test]
    fn test_missing_path_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LinuxMounter::new()
            .is_mount_point(&dir.path().join("absent"))
            .unwrap_err();
        assert!(err.is_not_found(), "{err}");
    }

    #[test]
    fn test_root_and_proc_are_mount_points() {
        let mounter = LinuxMounter::new();
        assert!(mounter.is_mount_point(Path::new("/")).unwrap());
        assert!(mounter.is_mount_point(Path::new("/proc")).unwrap());
    }

    #[test]
    fn test_list_contains_root() {
        let table = LinuxMounter::new().list().unwrap();
        assert!(table.iter().any(|mp| mp.path == Path::new("/")));
    }
}
