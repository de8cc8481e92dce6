//! Mount table of the calling process, read through `procfs`.

use std::io;
use std::path::Path;

use pdvolume_shared::errors::{PdError, PdResult};
use procfs::process::{MountInfo, MountInfos, Process};

use super::MountPoint;

pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Read the mount table of the calling process.
pub fn read_mount_table() -> PdResult<Vec<MountPoint>> {
    let query_error = |e: procfs::ProcError| {
        PdError::mount_query(Path::new(MOUNTINFO_PATH), io::Error::other(e))
    };

    let infos = Process::myself()
        .and_then(|process| process.mountinfo())
        .map_err(query_error)?;
    Ok(to_mount_table(infos))
}

/// [`MountPoint::device`] is the `major:minor` pair, which every bind mount
/// shares with the mount it was made from.
pub fn to_mount_table(infos: MountInfos) -> Vec<MountPoint> {
    infos.into_iter().map(to_mount_point).collect()
}

fn to_mount_point(info: MountInfo) -> MountPoint {
    let mut options: Vec<String> = info
        .mount_options
        .into_iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{key}={value}"),
            None => key,
        })
        .collect();
    options.sort();

    MountPoint {
        device: info.majmin,
        path: info.mount_point,
        fs_type: info.fs_type,
        options,
    }
}
