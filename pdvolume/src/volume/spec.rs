//! Volume specification consumed by the plugin.

use std::path::Path;

use pdvolume_shared::errors::{PdError, PdResult};
use serde::{Deserialize, Serialize};

/// A named volume in a workload definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSpec {
    /// Unique within the workload.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_persistent_disk: Option<AwsDiskSource>,
}

/// An externally provisioned block-storage disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsDiskSource {
    /// Provider identifier, e.g. `aws://us-east-1a/vol-0123456789abcdef0`.
    pub pd_name: String,

    /// Empty lets the mount utility infer it.
    #[serde(default)]
    pub fs_type: String,

    /// 0 mounts the whole device.
    #[serde(default)]
    pub partition: u32,

    #[serde(default)]
    pub read_only: bool,
}

impl AwsDiskSource {
    pub fn fs_type(&self) -> Option<&str> {
        Some(self.fs_type.as_str()).filter(|s| !s.is_empty())
    }

    pub fn partition(&self) -> Option<u32> {
        Some(self.partition).filter(|&p| p != 0)
    }
}

impl VolumeSpec {
    pub fn from_json(json: &str) -> PdResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PdError::Config(format!("invalid volume spec: {e}")))
    }

    pub fn load(path: &Path) -> PdResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PdError::Config(format!("failed to read volume spec {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_spec() {
        let spec = VolumeSpec::from_json(
            r#"{
                "name": "data",
                "awsPersistentDisk": {
                    "pdName": "aws://us-east-1a/vol-0123456789abcdef0",
                    "fsType": "xfs",
                    "partition": 2,
                    "readOnly": true
                }
            }"#,
        )
        .unwrap();

        let source = spec.aws_persistent_disk.unwrap();
        assert_eq!(source.pd_name, "aws://us-east-1a/vol-0123456789abcdef0");
        assert_eq!(source.fs_type(), Some("xfs"));
        assert_eq!(source.partition(), Some(2));
        assert!(source.read_only);
    }

    #[test]
    fn test_optional_fields_default_to_unspecified() {
        let spec =
            VolumeSpec::from_json(r#"{"name": "data", "awsPersistentDisk": {"pdName": "vol-1"}}"#)
                .unwrap();
        let source = spec.aws_persistent_disk.unwrap();
        assert_eq!(source.fs_type(), None);
        assert_eq!(source.partition(), None);
        assert!(!source.read_only);
    }

    #[test]
    fn test_spec_without_disk_source() {
        let spec = VolumeSpec::from_json(r#"{"name": "scratch"}"#).unwrap();
        assert!(spec.aws_persistent_disk.is_none());
    }

    #[test]
    fn test_malformed_spec_is_config_error() {
        let err = VolumeSpec::from_json(r#"{"awsPersistentDisk": {}}"#).unwrap_err();
        assert!(matches!(err, PdError::Config(_)));
    }
}
