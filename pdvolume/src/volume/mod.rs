//! Persistent disk volume: one disk bound into one workload.
//!
//! SetUp walks `unmounted → globally mounted → bound into the workload`:
//! the disk is mounted once per machine at its global path and every
//! workload gets a bind mount of that path. TearDown removes the workload's
//! bind mount and detaches the disk only when no other bind mount is left.
//!
//! Both directions are idempotent so the caller can retry after partial
//! failure. Calls for the same disk must be serialized by the caller: the
//! reference count read during TearDown is a snapshot of the mount table.

mod spec;

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdvolume_shared::constants::{dirs, plugin};
use pdvolume_shared::errors::{PdError, PdResult};

use crate::disk::{DiskManager, DiskRef};
use crate::host::{VolumeHost, escape_qualified_name};
use crate::mount::{MountFlags, Mounter, UnmountFlags};
use crate::paths;

pub use spec::{AwsDiskSource, VolumeSpec};

/// A persistent disk as consumed by one workload.
///
/// Built by [`PersistentDiskPlugin`](crate::PersistentDiskPlugin) per setup
/// or cleanup request and dropped when the call returns.
pub struct PersistentDiskVolume {
    pod_uid: String,
    vol_name: String,
    /// Unknown for cleaners until TearDown recovers it from the mount table.
    pd_name: Option<String>,
    fs_type: Option<String>,
    partition: Option<u32>,
    read_only: bool,
    manager: Arc<dyn DiskManager>,
    mounter: Arc<dyn Mounter>,
    host: Arc<dyn VolumeHost>,
}

impl std::fmt::Debug for PersistentDiskVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentDiskVolume")
            .field("pod_uid", &self.pod_uid)
            .field("vol_name", &self.vol_name)
            .field("pd_name", &self.pd_name)
            .field("fs_type", &self.fs_type)
            .field("partition", &self.partition)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl PersistentDiskVolume {
    pub(crate) fn new(
        pod_uid: &str,
        vol_name: &str,
        source: Option<&AwsDiskSource>,
        manager: Arc<dyn DiskManager>,
        mounter: Arc<dyn Mounter>,
        host: Arc<dyn VolumeHost>,
    ) -> Self {
        Self {
            pod_uid: pod_uid.to_string(),
            vol_name: vol_name.to_string(),
            pd_name: source.map(|s| s.pd_name.clone()),
            fs_type: source.and_then(|s| s.fs_type()).map(str::to_string),
            partition: source.and_then(AwsDiskSource::partition),
            read_only: source.is_some_and(|s| s.read_only),
            manager,
            mounter,
            host,
        }
    }

    pub fn pod_uid(&self) -> &str {
        &self.pod_uid
    }

    pub fn volume_name(&self) -> &str {
        &self.vol_name
    }

    /// Disk identifier, if known.
    pub fn pd_name(&self) -> Option<&str> {
        self.pd_name.as_deref()
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Workload-private directory the disk is bound on.
    pub fn path(&self) -> PathBuf {
        self.host.pod_volume_dir(
            &self.pod_uid,
            &escape_qualified_name(plugin::NAME),
            &self.vol_name,
        )
    }

    fn plugin_dir(&self) -> PathBuf {
        self.host.plugin_dir(plugin::NAME)
    }

    fn disk_ref(&self) -> PdResult<DiskRef<'_>> {
        let pd_name = self
            .pd_name
            .as_deref()
            .ok_or_else(|| PdError::MissingDiskName {
                volume: self.vol_name.clone(),
            })?;
        Ok(DiskRef {
            pd_name,
            fs_type: self.fs_type.as_deref(),
            partition: self.partition,
            read_only: self.read_only,
        })
    }

    /// Attach the disk and bind it into [`path`](Self::path).
    pub fn set_up(&self) -> PdResult<()> {
        self.set_up_at(&self.path())
    }

    /// Attach the disk and bind it into `dir`.
    pub fn set_up_at(&self, dir: &Path) -> PdResult<()> {
        let _span = tracing::info_span!("set_up", pod_uid = %self.pod_uid, volume = %self.vol_name)
            .entered();
        let mounted = match self.mounter.is_mount_point(dir) {
            Ok(mounted) => mounted,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e),
        };
        tracing::debug!(dir = %dir.display(), mounted, "PersistentDisk set up");
        if mounted {
            return Ok(());
        }

        let disk = self.disk_ref()?;
        let global_path = paths::to_global_path(&self.plugin_dir(), disk.pd_name);
        self.manager.attach_and_mount_disk(&disk, &global_path)?;

        if let Err(e) = DirBuilder::new()
            .recursive(true)
            .mode(dirs::DIR_MODE)
            .create(dir)
        {
            // The disk stays attached if this detach fails; the next
            // reconciliation pass picks it up.
            self.detach_disk_log_error(&disk, &global_path);
            return Err(PdError::filesystem("create dir", dir, e));
        }

        let mut flags = MountFlags::BIND;
        if self.read_only {
            flags = flags | MountFlags::READ_ONLY;
        }

        let Err(err) = self.mounter.mount(&global_path, dir, None, flags, None) else {
            tracing::info!(
                pd_name = disk.pd_name,
                dir = %dir.display(),
                read_only = self.read_only,
                "PersistentDisk bound into workload"
            );
            return Ok(());
        };

        // Some mount utilities fail after the entry is already in the table.
        match self.mounter.is_mount_point(dir) {
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "isMountpoint check failed");
                return Err(err);
            }
            Ok(true) => {
                if let Err(e) = self.mounter.unmount(dir, UnmountFlags::empty()) {
                    tracing::error!(dir = %dir.display(), error = %e, "Failed to unmount");
                    return Err(err);
                }
                match self.mounter.is_mount_point(dir) {
                    Err(e) => {
                        tracing::error!(dir = %dir.display(), error = %e, "isMountpoint check failed");
                        return Err(err);
                    }
                    Ok(true) => {
                        let stuck = PdError::UnexpectedMountState {
                            path: dir.to_path_buf(),
                        };
                        tracing::error!(
                            error = %stuck,
                            "Leaving mount in place, will retry on next reconciliation"
                        );
                        return Err(err);
                    }
                    Ok(false) => {}
                }
            }
            Ok(false) => {}
        }

        if let Err(e) = std::fs::remove_dir(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove bind target");
        }
        self.detach_disk_log_error(&disk, &global_path);
        Err(err)
    }

    /// Unbind [`path`](Self::path); detach the disk if it was the last user.
    pub fn tear_down(&mut self) -> PdResult<()> {
        let dir = self.path();
        self.tear_down_at(&dir)
    }

    /// Unbind `dir`; detach the disk if it was the last user.
    pub fn tear_down_at(&mut self, dir: &Path) -> PdResult<()> {
        let _span =
            tracing::info_span!("tear_down", pod_uid = %self.pod_uid, volume = %self.vol_name)
                .entered();
        let mounted = match self.mounter.is_mount_point(dir) {
            Ok(mounted) => mounted,
            Err(e) if e.is_not_found() => {
                tracing::debug!(dir = %dir.display(), "Volume dir already gone");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Error checking mountpoint");
                return Err(e);
            }
        };
        if !mounted {
            tracing::debug!(dir = %dir.display(), "Not mountpoint, deleting");
            return std::fs::remove_dir(dir).map_err(|e| PdError::filesystem("remove dir", dir, e));
        }

        // The mount table holds resolved paths.
        let dir = &resolve(dir)?;

        // Read before unmounting: the unmount drops `dir` from the table.
        let refs = self.mounter.mount_refs(dir).inspect_err(|e| {
            tracing::debug!(dir = %dir.display(), error = %e, "Error getting mount refs");
        })?;
        if !refs.iter().any(|r| r == dir) {
            // Mounted, yet absent from its own references: the table and the
            // mount-point check disagree.
            let err = PdError::UnexpectedMountState { path: dir.clone() };
            tracing::error!(error = %err, "Volume dir missing from mount table");
            return Err(err);
        }

        self.mounter
            .unmount(dir, UnmountFlags::empty())
            .inspect_err(|e| {
                tracing::debug!(dir = %dir.display(), error = %e, "Error unmounting dir");
            })?;

        let others: Vec<&PathBuf> = refs.iter().filter(|r| r.as_path() != dir).collect();
        match others.as_slice() {
            [global_path] => {
                // Only the global mount is left, so this workload was the last user.
                // An unresolvable plugin dir cannot contain the global path;
                // the mapping below rejects it.
                let plugin_dir = self.plugin_dir();
                let plugin_dir = plugin_dir.canonicalize().unwrap_or(plugin_dir);
                let pd_name = paths::from_global_path(&plugin_dir, global_path).inspect_err(|e| {
                    tracing::debug!(
                        global_path = %global_path.display(),
                        error = %e,
                        "Could not determine pdName from mountpoint"
                    );
                })?;
                if let Some(known) = &self.pd_name
                    && *known != pd_name
                {
                    tracing::warn!(
                        known = %known,
                        recovered = %pd_name,
                        "Disk identifier differs from mount table; using mount table"
                    );
                }
                self.pd_name = Some(pd_name);

                let disk = self.disk_ref()?;
                self.manager
                    .detach_disk(&disk, global_path)
                    .inspect_err(|e| {
                        tracing::debug!(pd_name = disk.pd_name, error = %e, "Error detaching disk");
                    })?;
            }
            [] => {
                tracing::warn!(
                    dir = %dir.display(),
                    "No global mount referenced by volume dir; skipping detach"
                );
            }
            _ => {
                tracing::debug!(
                    dir = %dir.display(),
                    remaining = others.len(),
                    "Disk still referenced by other mounts; not detaching"
                );
            }
        }

        if !self.mounter.is_mount_point(dir)? {
            std::fs::remove_dir(dir).map_err(|e| {
                tracing::debug!(dir = %dir.display(), error = %e, "Error removing mountpoint");
                PdError::filesystem("remove dir", dir, e)
            })?;
        }
        Ok(())
    }

    fn detach_disk_log_error(&self, disk: &DiskRef<'_>, global_path: &Path) {
        if let Err(e) = self.manager.detach_disk(disk, global_path) {
            tracing::warn!(pd_name = disk.pd_name, error = %e, "Failed to detach disk");
        }
    }
}

/// Absolute path with symlinks resolved, as the kernel records it.
fn resolve(path: &Path) -> PdResult<PathBuf> {
    path.canonicalize()
        .map_err(|e| PdError::mount_query(path, e))
}
