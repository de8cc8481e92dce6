//! Mapping between disk identifiers and global mount paths.
//!
//! A disk is mounted exactly once per machine, at
//! `<plugin dir>/mounts/<identifier with "://" replaced by "/">`.
//! Every workload bind-mounts from there. Teardown runs without a known
//! identifier, so the mapping must also run backwards from a path found in
//! the mount table.

use std::path::{Component, Path, PathBuf};

use pdvolume_shared::constants::{dirs, disk};
use pdvolume_shared::errors::{PdError, PdResult};

/// Root of all global mounts for a plugin: `<plugin dir>/mounts`.
pub fn mounts_dir(plugin_dir: &Path) -> PathBuf {
    plugin_dir.join(dirs::MOUNTS_DIR)
}

/// Global mount path for a disk identifier.
///
/// `aws://us-east-1a/vol-1` maps to `<plugin dir>/mounts/aws/us-east-1a/vol-1`.
pub fn to_global_path(plugin_dir: &Path, pd_name: &str) -> PathBuf {
    let name = pd_name.replace(disk::URI_SEPARATOR, "/");
    // A leading '/' would make join() discard the mounts root.
    mounts_dir(plugin_dir).join(name.trim_start_matches('/'))
}

/// Recover the disk identifier from a global mount path.
///
/// Fails with [`PdError::InvalidMountPath`] when `global_path` is not below
/// the mounts root, is the root itself, or walks out of it with `..`.
pub fn from_global_path(plugin_dir: &Path, global_path: &Path) -> PdResult<String> {
    let base = mounts_dir(plugin_dir);
    let rel = global_path.strip_prefix(&base).map_err(|_| {
        PdError::invalid_mount_path(
            global_path,
            format!("not below {}", base.display()),
        )
    })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    PdError::invalid_mount_path(global_path, "not valid UTF-8")
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PdError::invalid_mount_path(
                    global_path,
                    "contains a parent directory segment",
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PdError::invalid_mount_path(
                    global_path,
                    "unexpected absolute component",
                ));
            }
        }
    }

    if parts.is_empty() {
        return Err(PdError::invalid_mount_path(
            global_path,
            "no disk identifier below mounts root",
        ));
    }

    let name = parts.join("/");
    let scheme_dir = format!("{}/", disk::AWS_SCHEME);
    match name.strip_prefix(&scheme_dir) {
        Some(rest) => Ok(format!("{}{}{}", disk::AWS_SCHEME, disk::URI_SEPARATOR, rest)),
        None => Ok(name),
    }
}
