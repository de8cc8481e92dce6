//! pdvolume - persistent disk volumes for workload hosts.
//!
//! Attaches an externally provisioned block device to this machine, mounts
//! it once at a machine-global path and bind-mounts it into each workload
//! that uses it. TearDown reverses this and detaches the disk when the last
//! workload lets go.
//!
//! ```text
//! PersistentDiskVolume ──► DiskManager ──► VolumeProvider (remote attach/detach)
//!        │                     └─────────► SafeFormatAndMount ─► Mounter
//!        ├──► Mounter (bind mount, refs)
//!        └──► paths (disk id ⇄ global path)
//! ```

pub mod disk;
pub mod host;
pub mod mount;
pub mod options;
pub mod paths;
pub mod plugin;
pub mod util;
pub mod volume;

pub use disk::{DiskManager, DiskRef};
pub use host::{HostLayout, VolumeHost};
pub use mount::{MountFlags, MountPoint, Mounter, UnmountFlags};
pub use options::PdVolumeOptions;
pub use plugin::{AccessMode, PersistentDiskPlugin};
pub use volume::{AwsDiskSource, PersistentDiskVolume, VolumeSpec};

pub use pdvolume_shared::{PdError, PdResult};
