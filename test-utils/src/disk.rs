//! Recording disk manager and volume provider.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use pdvolume::disk::{DiskManager, DiskRef, VolumeProvider};
use pdvolume_shared::errors::{PdError, PdResult};

use crate::FakeMounter;

#[derive(Default)]
struct DiskState {
    attached: Vec<String>,
    detached: Vec<String>,
    fail_attach: Option<String>,
    fail_detach: Option<String>,
}

/// Disk manager that records calls.
///
/// With a [`FakeMounter`] attached it also maintains the global mount:
/// attach mounts `/dev/fake/<pd_name>` at the global path (once), detach
/// removes it.
#[derive(Default)]
pub struct FakeDiskManager {
    mounter: Option<Arc<FakeMounter>>,
    state: Mutex<DiskState>,
}

impl FakeDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mounter(mounter: Arc<FakeMounter>) -> Self {
        Self {
            mounter: Some(mounter),
            state: Mutex::default(),
        }
    }

    pub fn fail_attach(&self, message: &str) {
        self.state.lock().fail_attach = Some(message.to_string());
    }

    pub fn fail_detach(&self, message: &str) {
        self.state.lock().fail_detach = Some(message.to_string());
    }

    /// Disk identifiers passed to `attach_and_mount_disk`, in call order.
    pub fn attach_calls(&self) -> Vec<String> {
        self.state.lock().attached.clone()
    }

    /// Disk identifiers passed to `detach_disk`, in call order.
    pub fn detach_calls(&self) -> Vec<String> {
        self.state.lock().detached.clone()
    }

    pub fn fake_device(pd_name: &str) -> String {
        format!("/dev/fake/{pd_name}")
    }
}

impl DiskManager for FakeDiskManager {
    fn attach_and_mount_disk(&self, disk: &DiskRef<'_>, global_path: &Path) -> PdResult<()> {
        let mut state = self.state.lock();
        state.attached.push(disk.pd_name.to_string());
        if let Some(message) = &state.fail_attach {
            return Err(PdError::remote_attach(disk.pd_name, message));
        }

        std::fs::create_dir_all(global_path)
            .map_err(|e| PdError::filesystem("create dir", global_path, e))?;

        if let Some(mounter) = &self.mounter
            && !mounter.is_mounted(global_path)
        {
            mounter.add_mount(&Self::fake_device(disk.pd_name), global_path);
        }
        Ok(())
    }

    fn detach_disk(&self, disk: &DiskRef<'_>, global_path: &Path) -> PdResult<()> {
        let mut state = self.state.lock();
        state.detached.push(disk.pd_name.to_string());
        if let Some(message) = &state.fail_detach {
            return Err(PdError::remote_detach(disk.pd_name, message));
        }

        if let Some(mounter) = &self.mounter {
            mounter.remove_mount(global_path);
        }
        match std::fs::remove_dir(global_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PdError::filesystem("remove dir", global_path, e)),
        }
    }
}

/// Provider that hands out a fixed device path.
pub struct FakeVolumeProvider {
    device: PathBuf,
    state: Mutex<DiskState>,
}

impl FakeVolumeProvider {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            state: Mutex::default(),
        }
    }

    pub fn fail_attach(&self, message: &str) {
        self.state.lock().fail_attach = Some(message.to_string());
    }

    pub fn attach_calls(&self) -> Vec<String> {
        self.state.lock().attached.clone()
    }

    pub fn detach_calls(&self) -> Vec<String> {
        self.state.lock().detached.clone()
    }
}

impl VolumeProvider for FakeVolumeProvider {
    fn attach_disk(&self, pd_name: &str, _read_only: bool) -> PdResult<PathBuf> {
        let mut state = self.state.lock();
        state.attached.push(pd_name.to_string());
        match &state.fail_attach {
            Some(message) => Err(PdError::remote_attach(pd_name, message)),
            None => Ok(self.device.clone()),
        }
    }

    fn detach_disk(&self, pd_name: &str) -> PdResult<()> {
        let mut state = self.state.lock();
        state.detached.push(pd_name.to_string());
        match &state.fail_detach {
            Some(message) => Err(PdError::remote_detach(pd_name, message)),
            None => Ok(()),
        }
    }
}
