//! Deploy result file
//!
//! The only durable output of a deploy: `{service}_{version}_{timestamp}.json`
//! holding the full definitions record of the release.

use super::{Release, TIMESTAMP_FORMAT};
use crate::error::{DeployError, Result};
use std::path::{Path, PathBuf};

/// Stamp the end of the deploy and write the definitions record into `dir`
pub fn write(release: &mut Release, dir: &Path) -> Result<PathBuf> {
    let finished = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    release.definitions.metadata.end_deploy = finished.clone();

    let path = dir.join(format!(
        "{}_{}_{}.json",
        release.service, release.version, finished
    ));
    let io_error = |source| DeployError::Artifact {
        path: path.clone(),
        source,
    };

    let content = serde_json::to_string_pretty(&release.definitions)
        .map_err(|e| io_error(std::io::Error::other(e)))?;
    std::fs::create_dir_all(dir).map_err(io_error)?;
    std::fs::write(&path, content).map_err(io_error)?;

    tracing::info!("Saved deployment results to file: {}", path.display());
    Ok(path)
}
