//! Error types for persistent disk volume operations.
//!
//! Variants follow the failure domain that produced them:
//! - Remote: [`PdError::RemoteAttach`], [`PdError::RemoteDetach`]
//! - Mount table: [`PdError::Mount`], [`PdError::Unmount`], [`PdError::MountQuery`],
//!   [`PdError::UnexpectedMountState`]
//! - Local filesystem: [`PdError::Filesystem`], [`PdError::InvalidMountPath`]
//! - Caller input: [`PdError::MissingDiskName`], [`PdError::UnsupportedVolume`],
//!   [`PdError::Config`]

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used across all pdvolume crates.
pub type PdResult<T> = Result<T, PdError>;

#[derive(Debug, Error)]
pub enum PdError {
    /// The provider refused or failed to attach the disk to this machine.
    #[error("attach disk {disk}: {message}")]
    RemoteAttach { disk: String, message: String },

    /// The provider refused or failed to detach the disk from this machine.
    #[error("detach disk {disk}: {message}")]
    RemoteDetach { disk: String, message: String },

    /// A mount(2) or mount utility call failed.
    #[error("mount {device} on {}: {message}", target.display())]
    Mount {
        device: String,
        target: PathBuf,
        message: String,
    },

    /// An unmount call failed.
    #[error("unmount {}: {message}", target.display())]
    Unmount { target: PathBuf, message: String },

    /// The mount table or a path's mount status could not be read.
    #[error("query mount state of {}: {source}", path.display())]
    MountQuery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Directory creation or removal failed.
    #[error("{op} {}: {source}", path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A global mount path could not be mapped back to a disk identifier.
    #[error("invalid mount path {}: {reason}", path.display())]
    InvalidMountPath { path: PathBuf, reason: String },

    /// A path is still mounted after an unmount that should have cleared it.
    #[error("{} is still mounted after unmount", path.display())]
    UnexpectedMountState { path: PathBuf },

    /// SetUp was requested on a volume built without a disk identifier.
    #[error("volume {volume} has no disk identifier")]
    MissingDiskName { volume: String },

    /// The volume spec does not describe a disk this plugin handles.
    #[error("unsupported volume {0}")]
    UnsupportedVolume(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config: {0}")]
    Config(String),
}

impl PdError {
    pub fn remote_attach(disk: impl Into<String>, message: impl ToString) -> Self {
        Self::RemoteAttach {
            disk: disk.into(),
            message: message.to_string(),
        }
    }

    pub fn remote_detach(disk: impl Into<String>, message: impl ToString) -> Self {
        Self::RemoteDetach {
            disk: disk.into(),
            message: message.to_string(),
        }
    }

    pub fn mount(device: impl Into<String>, target: &Path, message: impl ToString) -> Self {
        Self::Mount {
            device: device.into(),
            target: target.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn unmount(target: &Path, message: impl ToString) -> Self {
        Self::Unmount {
            target: target.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn mount_query(path: &Path, source: io::Error) -> Self {
        Self::MountQuery {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn filesystem(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Filesystem {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn invalid_mount_path(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidMountPath {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True when the error reports a path that does not exist.
    ///
    /// Callers use this to treat a missing target as "not mounted yet".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::MountQuery { source, .. } | Self::Filesystem { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
