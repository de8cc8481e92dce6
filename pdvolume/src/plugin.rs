//! Persistent disk volume plugin.
//!
//! Builds [`PersistentDiskVolume`]s with the disk manager, mounter and host
//! it was constructed with.

use std::sync::Arc;

use pdvolume_shared::constants::plugin;
use pdvolume_shared::errors::{PdError, PdResult};

use crate::disk::DiskManager;
use crate::host::VolumeHost;
use crate::mount::Mounter;
use crate::volume::{PersistentDiskVolume, VolumeSpec};

/// How many nodes may mount a volume and in which mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadOnlyMany,
    ReadWriteMany,
}

#[derive(Clone)]
pub struct PersistentDiskPlugin {
    host: Arc<dyn VolumeHost>,
    manager: Arc<dyn DiskManager>,
    mounter: Arc<dyn Mounter>,
}

impl PersistentDiskPlugin {
    pub fn new(
        host: Arc<dyn VolumeHost>,
        manager: Arc<dyn DiskManager>,
        mounter: Arc<dyn Mounter>,
    ) -> Self {
        Self {
            host,
            manager,
            mounter,
        }
    }

    pub fn name(&self) -> &'static str {
        plugin::NAME
    }

    pub fn can_support(&self, spec: &VolumeSpec) -> bool {
        spec.aws_persistent_disk.is_some()
    }

    /// A block device is attached to one machine at a time.
    pub fn access_modes(&self) -> &'static [AccessMode] {
        &[AccessMode::ReadWriteOnce]
    }

    /// Volume for setting `spec` up inside workload `pod_uid`.
    pub fn new_builder(&self, spec: &VolumeSpec, pod_uid: &str) -> PdResult<PersistentDiskVolume> {
        let source = spec.aws_persistent_disk.as_ref().ok_or_else(|| {
            PdError::UnsupportedVolume(format!("{}: no persistent disk source", spec.name))
        })?;
        if source.pd_name.is_empty() {
            return Err(PdError::MissingDiskName {
                volume: spec.name.clone(),
            });
        }

        Ok(PersistentDiskVolume::new(
            pod_uid,
            &spec.name,
            Some(source),
            self.manager.clone(),
            self.mounter.clone(),
            self.host.clone(),
        ))
    }

    /// Volume for tearing `vol_name` down; the disk is found via the mount table.
    pub fn new_cleaner(&self, vol_name: &str, pod_uid: &str) -> PersistentDiskVolume {
        PersistentDiskVolume::new(
            pod_uid,
            vol_name,
            None,
            self.manager.clone(),
            self.mounter.clone(),
            self.host.clone(),
        )
    }
}
