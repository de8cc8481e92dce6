#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub root: PathBuf,
    _temp_dir: TempDir, // Dropped after test
}

impl TestContext {
    /// Command rooted at this context's host directory
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_pdvolume");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.env_remove("PDVOLUME_ROOT")
            .env_remove("PDVOLUME_CONFIG")
            .env_remove("PDVOLUME_PROVIDER_HELPER");
        cmd.arg("--root").arg(&self.root);
        cmd
    }

    pub fn volume_dir(&self, pod: &str, volume: &str) -> PathBuf {
        self.root
            .join("pods")
            .join(pod)
            .join("volumes")
            .join("pdvolume.io~aws-pd")
            .join(volume)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

pub fn pdvolume() -> TestContext {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path().to_path_buf();
    let mut ctx = TestContext {
        cmd: Command::new(env!("CARGO_BIN_EXE_pdvolume")),
        root,
        _temp_dir: temp_dir,
    };
    ctx.cmd = ctx.new_cmd();
    ctx
}
