use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use super::VolumeReport;

#[derive(Args, Debug)]
pub struct TeardownArgs {
    /// Name of the volume in the workload
    #[arg(long)]
    pub volume: String,

    /// UID of the workload the volume is bound into
    #[arg(long)]
    pub pod: String,

    /// Tear down this directory instead of the workload volume path
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn execute(args: TeardownArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let plugin = global.create_plugin()?;

    let mut volume = plugin.new_cleaner(&args.volume, &args.pod);
    let dir = args.dir.unwrap_or_else(|| volume.path());
    volume
        .tear_down_at(&dir)
        .with_context(|| format!("Failed to tear down volume '{}'", args.volume))?;

    VolumeReport {
        pod_uid: volume.pod_uid(),
        volume: volume.volume_name(),
        pd_name: volume.pd_name(),
        path: &dir,
    }
    .print(global.json)
}
