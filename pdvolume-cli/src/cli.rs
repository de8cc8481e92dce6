use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pdvolume::disk::{CloudDiskManager, CommandVolumeProvider, SafeFormatAndMount};
use pdvolume::{HostLayout, Mounter, PdVolumeOptions, PersistentDiskPlugin};
use pdvolume_shared::constants::envs;

use crate::commands;

#[derive(Parser, Debug)]
#[command(
    name = "pdvolume",
    author,
    version,
    about = "Attach persistent disks and bind them into workload directories"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Attach a disk and bind it into a workload
    Setup(commands::setup::SetupArgs),

    /// Unbind a workload volume and detach the disk if unused
    Teardown(commands::teardown::TeardownArgs),
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Host root directory (plugins/ and pods/ live below it)
    #[arg(long, global = true, env = envs::ROOT_DIR)]
    pub root: Option<PathBuf>,

    /// JSON options file
    #[arg(long, global = true, env = envs::CONFIG)]
    pub config: Option<PathBuf>,

    /// Executable implementing provider attach/detach
    #[arg(long, global = true, env = envs::PROVIDER_HELPER)]
    pub provider_helper: Option<PathBuf>,

    /// Write logs to a daily-rotated file in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalFlags {
    /// Options file (if any) with flag and environment overrides applied.
    pub fn load_options(&self) -> anyhow::Result<PdVolumeOptions> {
        let mut options = match &self.config {
            Some(path) => PdVolumeOptions::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => PdVolumeOptions::default(),
        };

        if let Some(root) = &self.root {
            options.root_dir = root.clone();
        }
        if let Some(helper) = &self.provider_helper {
            options.provider_helper = helper.clone();
        }
        options.validate().context("Invalid options")?;

        tracing::debug!(?options, "Options loaded");
        Ok(options)
    }

    pub fn create_plugin(&self) -> anyhow::Result<PersistentDiskPlugin> {
        let options = self.load_options()?;
        let mounter = host_mounter()?;

        let provider = Arc::new(CommandVolumeProvider::new(&options.provider_helper));
        let disk_mounter = SafeFormatAndMount::new(mounter.clone())
            .with_default_fs_type(options.default_fs_type.clone());
        let manager = CloudDiskManager::new(provider, mounter.clone())
            .with_options(options.attach_options())
            .with_disk_mounter(disk_mounter);

        Ok(PersistentDiskPlugin::new(
            Arc::new(HostLayout::new(&options.root_dir)),
            Arc::new(manager),
            mounter,
        ))
    }
}

#[cfg(target_os = "linux")]
fn host_mounter() -> anyhow::Result<Arc<dyn Mounter>> {
    Ok(Arc::new(pdvolume::mount::LinuxMounter::new()))
}

#[cfg(not(target_os = "linux"))]
fn host_mounter() -> anyhow::Result<Arc<dyn Mounter>> {
    anyhow::bail!("pdvolume only supports Linux hosts")
}
