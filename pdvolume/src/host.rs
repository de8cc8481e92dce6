//! Directory layout supplied by the workload host.

use std::path::{Path, PathBuf};

use pdvolume_shared::constants::dirs;

/// Paths the workload host hands to volume plugins.
pub trait VolumeHost: Send + Sync {
    /// Plugin-private state directory; global mounts live below it.
    fn plugin_dir(&self, plugin_name: &str) -> PathBuf;

    /// Workload-private directory a volume is bind-mounted on.
    fn pod_volume_dir(&self, pod_uid: &str, escaped_plugin_name: &str, volume_name: &str)
    -> PathBuf;
}

/// Make a qualified plugin name usable as a single path component.
///
/// `pdvolume.io/aws-pd` becomes `pdvolume.io~aws-pd`.
pub fn escape_qualified_name(name: &str) -> String {
    name.replace('/', "~")
}

/// Host layout rooted at one directory:
///
/// ```text
/// <root>/plugins/<escaped plugin>/mounts/...           global mounts
/// <root>/pods/<uid>/volumes/<escaped plugin>/<volume>  bind targets
/// ```
#[derive(Clone, Debug)]
pub struct HostLayout {
    root_dir: PathBuf,
}

impl HostLayout {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root_dir.join(dirs::PLUGINS_DIR)
    }

    pub fn pods_dir(&self) -> PathBuf {
        self.root_dir.join(dirs::PODS_DIR)
    }
}

impl VolumeHost for HostLayout {
    fn plugin_dir(&self, plugin_name: &str) -> PathBuf {
        self.plugins_dir().join(escape_qualified_name(plugin_name))
    }

    fn pod_volume_dir(
        &self,
        pod_uid: &str,
        escaped_plugin_name: &str,
        volume_name: &str,
    ) -> PathBuf {
        self.pods_dir()
            .join(pod_uid)
            .join(dirs::VOLUMES_DIR)
            .join(escaped_plugin_name)
            .join(volume_name)
    }
}
