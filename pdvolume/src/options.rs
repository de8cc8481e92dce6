//! Configuration for pdvolume.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pdvolume_shared::constants::disk;
use pdvolume_shared::errors::{PdError, PdResult};
use serde::{Deserialize, Serialize};

use crate::disk::AttachOptions;

/// Host-level options, usually read from a JSON file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdVolumeOptions {
    /// Root of the host layout (plugins/ and pods/ live below it).
    ///
    /// Default: /var/lib/pdvolume
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Executable implementing the provider attach/detach protocol.
    ///
    /// Default: pdvolume-provider (resolved through PATH)
    #[serde(default = "default_provider_helper")]
    pub provider_helper: PathBuf,

    /// Delay between checks for the device node after attach.
    ///
    /// Default: 1000
    #[serde(default = "default_attach_poll_interval_ms")]
    pub attach_poll_interval_ms: u64,

    /// Checks for the device node before giving up.
    ///
    /// Default: 60
    #[serde(default = "default_attach_poll_attempts")]
    pub attach_poll_attempts: u32,

    /// Filesystem used when formatting a blank disk whose spec names none.
    ///
    /// Default: ext4
    #[serde(default = "default_fs_type")]
    pub default_fs_type: String,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/var/lib/pdvolume")
}

fn default_provider_helper() -> PathBuf {
    PathBuf::from("pdvolume-provider")
}

fn default_attach_poll_interval_ms() -> u64 {
    1000
}

fn default_attach_poll_attempts() -> u32 {
    60
}

fn default_fs_type() -> String {
    disk::DEFAULT_FS_TYPE.to_string()
}

impl Default for PdVolumeOptions {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            provider_helper: default_provider_helper(),
            attach_poll_interval_ms: default_attach_poll_interval_ms(),
            attach_poll_attempts: default_attach_poll_attempts(),
            default_fs_type: default_fs_type(),
        }
    }
}

impl PdVolumeOptions {
    pub fn from_json(json: &str) -> PdResult<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| PdError::Config(format!("invalid options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: &Path) -> PdResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PdError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> PdResult<()> {
        if !self.root_dir.is_absolute() {
            return Err(PdError::Config(format!(
                "root_dir must be absolute, got {}",
                self.root_dir.display()
            )));
        }
        if self.attach_poll_attempts == 0 {
            return Err(PdError::Config(
                "attach_poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.default_fs_type.is_empty() {
            return Err(PdError::Config("default_fs_type must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn attach_options(&self) -> AttachOptions {
        AttachOptions {
            poll_interval: Duration::from_millis(self.attach_poll_interval_ms),
            poll_attempts: self.attach_poll_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let options = PdVolumeOptions::from_json("{}").unwrap();
        assert_eq!(options, PdVolumeOptions::default());
        assert_eq!(options.attach_options(), AttachOptions::default());
    }

    #[test]
    fn test_overrides() {
        let options = PdVolumeOptions::from_json(
            r#"{"root_dir": "/srv/pd", "attach_poll_interval_ms": 250, "default_fs_type": "xfs"}"#,
        )
        .unwrap();
        assert_eq!(options.root_dir, PathBuf::from("/srv/pd"));
        assert_eq!(
            options.attach_options().poll_interval,
            Duration::from_millis(250)
        );
        assert_eq!(options.default_fs_type, "xfs");
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(PdVolumeOptions::from_json(r#"{"root_dir": "relative"}"#).is_err());
        assert!(PdVolumeOptions::from_json(r#"{"attach_poll_attempts": 0}"#).is_err());
        assert!(PdVolumeOptions::from_json(r#"{"unknown": true}"#).is_err());
    }
}
