pub mod setup;
pub mod teardown;

use std::path::Path;

use serde::Serialize;

/// Outcome printed after a successful command.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VolumeReport<'a> {
    pub pod_uid: &'a str,
    pub volume: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pd_name: Option<&'a str>,
    pub path: &'a Path,
}

impl VolumeReport<'_> {
    pub fn print(&self, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
        } else {
            println!("{}", self.path.display());
        }
        Ok(())
    }
}
