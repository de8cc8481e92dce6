//! Test doubles for pdvolume.
//!
//! Volume orchestration is exercised against an in-memory mount table and a
//! recording disk manager, with real directories under a temp root.

mod disk;
mod mounter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdvolume::{HostLayout, PersistentDiskPlugin, VolumeHost, VolumeSpec};
use pdvolume_shared::constants::plugin;
use tempfile::TempDir;

pub use disk::{FakeDiskManager, FakeVolumeProvider};
pub use mounter::{FakeMounter, MountAction, MountFailure};

/// A host layout in a temp dir wired to fakes sharing one mount table.
pub struct TestHost {
    pub mounter: Arc<FakeMounter>,
    pub manager: Arc<FakeDiskManager>,
    pub layout: Arc<HostLayout>,
    pub plugin: PersistentDiskPlugin,
    _temp_dir: TempDir, // Dropped after test
}

impl TestHost {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self::with_root(temp_dir, root)
    }

    /// Host whose root is reached through a symlink, so layout paths differ
    /// from the resolved paths in the mount table.
    pub fn with_symlinked_root() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let real = temp_dir.path().join("real");
        let link = temp_dir.path().join("link");
        std::fs::create_dir(&real).expect("Failed to create host root");
        std::os::unix::fs::symlink(&real, &link).expect("Failed to link host root");
        Self::with_root(temp_dir, link)
    }

    fn with_root(temp_dir: TempDir, root: PathBuf) -> Self {
        let layout = Arc::new(HostLayout::new(root));
        let mounter = Arc::new(FakeMounter::new());
        let manager = Arc::new(FakeDiskManager::with_mounter(mounter.clone()));
        let plugin = PersistentDiskPlugin::new(layout.clone(), manager.clone(), mounter.clone());

        Self {
            mounter,
            manager,
            layout,
            plugin,
            _temp_dir: temp_dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root_dir()
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.layout.plugin_dir(plugin::NAME)
    }

    pub fn global_path(&self, pd_name: &str) -> PathBuf {
        pdvolume::paths::to_global_path(&self.plugin_dir(), pd_name)
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Volume spec with a disk source.
pub fn disk_spec(volume: &str, pd_name: &str, read_only: bool) -> VolumeSpec {
    VolumeSpec {
        name: volume.to_string(),
        aws_persistent_disk: Some(pdvolume::AwsDiskSource {
            pd_name: pd_name.to_string(),
            read_only,
            ..Default::default()
        }),
    }
}
