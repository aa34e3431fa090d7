use tokio::process;
use tracing::debug;

use crate::error::Error;

/// Reads the active project out of the local gcloud configuration.
pub async fn default_project(gcloud_bin: &str) -> Result<String, Error> {
    debug!("reading default project from {gcloud_bin}");
    let output = process::Command::new(gcloud_bin)
        .arg("config")
        .arg("get-value")
        .arg("project")
        .output()
        .await
        .map_err(|e| Error::Project(format!("failed to run {gcloud_bin}: {e}")))?;

    if !output.status.success() {
        return Err(Error::Project(format!(
            "{gcloud_bin} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let project = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if project.is_empty() || project == "(unset)" {
        return Err(Error::Project(
            "no default project set, pass --project".into(),
        ));
    }

    Ok(project)
}
