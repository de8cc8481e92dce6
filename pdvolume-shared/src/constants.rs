//! Constants shared by the library, the CLI and the test fakes.

/// Plugin identity
pub mod plugin {
    /// Registered name of the persistent disk plugin
    pub const NAME: &str = "pdvolume.io/aws-pd";
}

/// Directory names under the volume host root
pub mod dirs {
    /// Per-plugin state lives under `<root>/plugins/<escaped plugin name>`
    pub const PLUGINS_DIR: &str = "plugins";

    /// Global mounts live under `<plugin dir>/mounts`
    pub const MOUNTS_DIR: &str = "mounts";

    /// Workload directories live under `<root>/pods`
    pub const PODS_DIR: &str = "pods";

    /// Per-workload volume directories: `<root>/pods/<uid>/volumes`
    pub const VOLUMES_DIR: &str = "volumes";

    /// Permission bits for every directory created by this crate
    pub const DIR_MODE: u32 = 0o750;
}

/// Disk identifier encoding
pub mod disk {
    /// URI separator rewritten to a path separator in global mount paths
    pub const URI_SEPARATOR: &str = "://";

    /// Provider scheme restored when mapping a global path back to a disk identifier
    pub const AWS_SCHEME: &str = "aws";

    /// Filesystem used when the volume spec leaves it empty
    pub const DEFAULT_FS_TYPE: &str = "ext4";
}

/// Environment variables read by the CLI
pub mod envs {
    pub const ROOT_DIR: &str = "PDVOLUME_ROOT";
    pub const CONFIG: &str = "PDVOLUME_CONFIG";
    pub const PROVIDER_HELPER: &str = "PDVOLUME_PROVIDER_HELPER";
}
