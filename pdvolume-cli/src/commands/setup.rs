use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use pdvolume::VolumeSpec;

use super::VolumeReport;

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Volume spec JSON file
    #[arg(long)]
    pub spec: PathBuf,

    /// UID of the workload the volume is bound into
    #[arg(long)]
    pub pod: String,

    /// Bind into this directory instead of the workload volume path
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn execute(args: SetupArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let spec = VolumeSpec::load(&args.spec)
        .with_context(|| format!("Failed to read volume spec {}", args.spec.display()))?;
    let plugin = global.create_plugin()?;

    if !plugin.can_support(&spec) {
        anyhow::bail!(
            "Volume '{}' has no persistent disk source; {} cannot set it up",
            spec.name,
            plugin.name()
        );
    }

    let volume = plugin.new_builder(&spec, &args.pod)?;
    let dir = args.dir.unwrap_or_else(|| volume.path());
    volume
        .set_up_at(&dir)
        .with_context(|| format!("Failed to set up volume '{}'", spec.name))?;

    VolumeReport {
        pod_uid: volume.pod_uid(),
        volume: volume.volume_name(),
        pd_name: volume.pd_name(),
        path: &dir,
    }
    .print(global.json)
}
