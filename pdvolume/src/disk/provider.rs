//! Remote attach/detach boundary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use pdvolume_shared::errors::{PdError, PdResult};

/// The cloud provider's volume API, as seen from one machine.
///
/// Calls are synchronous and may block on the network.
pub trait VolumeProvider: Send + Sync {
    /// Attach `pd_name` to this machine and return the local device path.
    ///
    /// Returns the existing device when the disk is already attached here.
    fn attach_disk(&self, pd_name: &str, read_only: bool) -> PdResult<PathBuf>;

    /// Detach `pd_name` from this machine.
    fn detach_disk(&self, pd_name: &str) -> PdResult<()>;
}

/// Provider backed by an external helper executable.
///
/// Protocol:
/// - `<helper> [args..] attach <pd_name> [--read-only]` prints the device path on stdout
/// - `<helper> [args..] detach <pd_name>`
///
/// A non-zero exit is a failure; stderr becomes the error message.
#[derive(Debug, Clone)]
pub struct CommandVolumeProvider {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandVolumeProvider {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments placed before the subcommand, e.g. a script for an interpreter.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, subcommand: &str, pd_name: &str, extra: &[&str]) -> Result<Output, String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(subcommand).arg(pd_name).args(extra);

        tracing::debug!(?cmd, "Running volume provider helper");

        let output = cmd
            .output()
            .map_err(|e| format!("failed to run {}: {}", self.program.display(), e))?;

        if !output.status.success() {
            return Err(format!(
                "{} {} exited with {}: {}",
                self.program.display(),
                subcommand,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(output)
    }
}

impl VolumeProvider for CommandVolumeProvider {
    fn attach_disk(&self, pd_name: &str, read_only: bool) -> PdResult<PathBuf> {
        let extra: &[&str] = if read_only { &["--read-only"] } else { &[] };
        let output = self
            .run("attach", pd_name, extra)
            .map_err(|msg| PdError::remote_attach(pd_name, msg))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let device = stdout.lines().map(str::trim).find(|l| !l.is_empty());
        match device {
            Some(device) => {
                tracing::info!(pd_name, device, "Provider attached disk");
                Ok(PathBuf::from(device))
            }
            None => Err(PdError::remote_attach(
                pd_name,
                "provider helper printed no device path",
            )),
        }
    }

    fn detach_disk(&self, pd_name: &str) -> PdResult<()> {
        self.run("detach", pd_name, &[])
            .map_err(|msg| PdError::remote_detach(pd_name, msg))?;
        tracing::info!(pd_name, "Provider detached disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELPER: &str = r#"
case "$1" in
  attach)
    if [ "$3" = "--read-only" ]; then echo /dev/xvdr; else echo /dev/xvdf; fi ;;
  detach)
    exit 0 ;;
  *)
    echo "unknown subcommand $1" >&2; exit 2 ;;
esac
"#;

    const FAILING_HELPER: &str = r#"
echo "volume vol-1 is in use" >&2
exit 3
"#;

    fn provider(dir: &tempfile::TempDir, script: &str) -> CommandVolumeProvider {
        let path = dir.path().join("helper.sh");
        std::fs::write(&path, script).unwrap();
        CommandVolumeProvider::new("/bin/sh").with_args([path])
    }

    #[test]
    fn test_attach_returns_device_path() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir, HELPER);

        let device = provider.attach_disk("aws://us-east-1a/vol-1", false).unwrap();
        assert_eq!(device, PathBuf::from("/dev/xvdf"));

        let device = provider.attach_disk("aws://us-east-1a/vol-1", true).unwrap();
        assert_eq!(device, PathBuf::from("/dev/xvdr"));
    }

    #[test]
    fn test_detach_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        provider(&dir, HELPER).detach_disk("vol-1").unwrap();
    }

    #[test]
    fn test_failures_carry_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir, FAILING_HELPER);

        let err = provider.attach_disk("vol-1", false).unwrap_err();
        assert!(matches!(err, PdError::RemoteAttach { .. }));
        assert!(err.to_string().contains("is in use"), "{err}");

        let err = provider.detach_disk("vol-1").unwrap_err();
        assert!(matches!(err, PdError::RemoteDetach { .. }));
    }

    #[test]
    fn test_missing_helper_is_attach_failure() {
        let provider = CommandVolumeProvider::new("/nonexistent/pd-helper");
        let err = provider.attach_disk("vol-1", false).unwrap_err();
        assert!(matches!(err, PdError::RemoteAttach { .. }));
    }

    #[test]
    fn test_empty_output_is_attach_failure() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir, "exit 0\n");
        let err = provider.attach_disk("vol-1", false).unwrap_err();
        assert!(err.to_string().contains("no device path"));
    }
}
