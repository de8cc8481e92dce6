//! In-memory mount table.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use pdvolume::mount::{MountFlags, MountPoint, Mounter, UnmountFlags};
use pdvolume_shared::errors::{PdError, PdResult};

/// A call made through the [`Mounter`] trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountAction {
    Mount {
        source: PathBuf,
        target: PathBuf,
        flags: MountFlags,
    },
    Unmount {
        target: PathBuf,
    },
}

/// How the next `mount` call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountFailure {
    /// Return an error and leave the table untouched.
    Clean,
    /// Add the entry, then return an error.
    AfterMount,
}

#[derive(Default)]
struct State {
    table: Vec<MountPoint>,
    actions: Vec<MountAction>,
    next_failure: Option<MountFailure>,
    /// Unmounts of these paths "succeed" but leave the entry.
    stuck: Vec<PathBuf>,
    next_query_error: Option<io::ErrorKind>,
}

/// Symlink-free absolute path when `path` exists, like the kernel records it.
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Mount table kept in memory.
///
/// Directories are real: `mount` needs an existing target,
/// `is_mount_point` reports not-found for missing paths and the table holds
/// resolved paths, like the kernel. Entries added with
/// [`FakeMounter::add_mount`] are not recorded as actions.
#[derive(Default)]
pub struct FakeMounter {
    state: Mutex<State>,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an entry in the table without going through `mount`.
    pub fn add_mount(&self, device: &str, path: &Path) {
        self.state.lock().table.push(MountPoint {
            device: device.to_string(),
            path: resolve(path),
            fs_type: "ext4".to_string(),
            options: vec!["rw".to_string()],
        });
    }

    /// Drop the entry at `path` without going through `unmount`.
    pub fn remove_mount(&self, path: &Path) -> bool {
        let path = resolve(path);
        let mut state = self.state.lock();
        match state.table.iter().rposition(|mp| mp.path == path) {
            Some(index) => {
                state.table.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn fail_next_mount(&self, failure: MountFailure) {
        self.state.lock().next_failure = Some(failure);
    }

    /// Make the next `is_mount_point` call fail with `kind`.
    pub fn fail_next_query(&self, kind: io::ErrorKind) {
        self.state.lock().next_query_error = Some(kind);
    }

    /// Make unmounts of `path` report success without removing the entry.
    pub fn keep_mounted(&self, path: &Path) {
        self.state.lock().stuck.push(path.to_path_buf());
    }

    pub fn is_mounted(&self, path: &Path) -> bool {
        let path = resolve(path);
        self.state.lock().table.iter().any(|mp| mp.path == path)
    }

    pub fn actions(&self) -> Vec<MountAction> {
        self.state.lock().actions.clone()
    }

    pub fn mount_calls(&self) -> usize {
        self.actions()
            .iter()
            .filter(|a| matches!(a, MountAction::Mount { .. }))
            .count()
    }

    pub fn unmount_calls(&self) -> usize {
        self.actions()
            .iter()
            .filter(|a| matches!(a, MountAction::Unmount { .. }))
            .count()
    }

    pub fn table(&self) -> Vec<MountPoint> {
        self.state.lock().table.clone()
    }
}

impl Mounter for FakeMounter {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: Option<&str>,
        flags: MountFlags,
        _data: Option<&str>,
    ) -> PdResult<()> {
        let mut state = self.state.lock();
        state.actions.push(MountAction::Mount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            flags,
        });

        if !target.is_dir() {
            return Err(PdError::mount(
                source.display().to_string(),
                target,
                "target directory does not exist",
            ));
        }

        let failure = state.next_failure.take();
        if failure == Some(MountFailure::Clean) {
            return Err(PdError::mount(
                source.display().to_string(),
                target,
                "injected mount failure",
            ));
        }

        // A bind shares the device of whatever is mounted at the source.
        let device = if flags.contains(MountFlags::BIND) {
            let source = resolve(source);
            state
                .table
                .iter()
                .rev()
                .find(|mp| mp.path == source)
                .map(|mp| mp.device.clone())
                .unwrap_or_else(|| source.display().to_string())
        } else {
            source.display().to_string()
        };

        let mut options = vec![if flags.contains(MountFlags::READ_ONLY) {
            "ro".to_string()
        } else {
            "rw".to_string()
        }];
        if flags.contains(MountFlags::BIND) {
            options.push("bind".to_string());
        }

        state.table.push(MountPoint {
            device,
            path: resolve(target),
            fs_type: fs_type.unwrap_or("none").to_string(),
            options,
        });

        if failure == Some(MountFailure::AfterMount) {
            return Err(PdError::mount(
                source.display().to_string(),
                target,
                "injected mount failure after mount",
            ));
        }
        Ok(())
    }

    fn unmount(&self, target: &Path, _flags: UnmountFlags) -> PdResult<()> {
        let mut state = self.state.lock();
        state.actions.push(MountAction::Unmount {
            target: target.to_path_buf(),
        });

        let resolved = resolve(target);
        if state.stuck.iter().any(|p| resolve(p) == resolved) {
            return Ok(());
        }

        match state.table.iter().rposition(|mp| mp.path == resolved) {
            Some(index) => {
                state.table.remove(index);
                Ok(())
            }
            None => Err(PdError::unmount(target, "not mounted")),
        }
    }

    fn is_mount_point(&self, path: &Path) -> PdResult<bool> {
        if let Some(kind) = self.state.lock().next_query_error.take() {
            return Err(PdError::mount_query(path, io::Error::from(kind)));
        }

        if self.is_mounted(path) {
            return Ok(true);
        }
        if !path.exists() {
            return Err(PdError::mount_query(
                path,
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        Ok(false)
    }

    fn list(&self) -> PdResult<Vec<MountPoint>> {
        Ok(self.table())
    }
}
