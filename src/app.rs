//! Command dispatcher
//!
//! One run executes one [`Operation`]. The live version is read from the
//! routing layer first, then the operation is handed to the [`Orchestrator`].

use crate::error::{DeployError, Result};
use crate::gcp::compute::ComputeApi;
use crate::gcp::operation::WaitSettings;
use crate::healthcheck::HealthProbe;
use crate::ingress::LiveVersionSource;
use crate::metadata::Metadata;
use crate::release::{Orchestrator, Release};
use crate::resource::normalize_version;
use clap::ValueEnum;
use std::path::PathBuf;

/// Operation selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Operation {
    /// Print the deployed versions of every resource kind
    Overview,
    /// Print the version receiving traffic
    CurrentVersion,
    /// Create and healthcheck a new release stack
    Deploy,
    /// Delete the stack of one version
    Delete,
    /// Delete every stack except the live one
    DeletePrevious,
    /// Remove the autoscaler and shrink the group to zero
    ScaleDown,
    /// Recreate the autoscaler
    ScaleUp,
}

/// Per-run options that are not part of the metadata document
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub service: Option<String>,
    pub version: Option<String>,
    pub wait: WaitSettings,
    pub artifact_dir: PathBuf,
}

impl RunOptions {
    fn service(&self) -> Result<&str> {
        self.service
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(DeployError::MissingArgument("service"))
    }

    fn version(&self) -> Result<&str> {
        self.version
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(DeployError::MissingArgument("version"))
    }
}

/// Provider-facing collaborators of a run
pub struct Collaborators<'a> {
    pub compute: &'a dyn ComputeApi,
    pub routing: &'a dyn LiveVersionSource,
    pub probe: &'a dyn HealthProbe,
}

/// Execute one operation to completion
pub async fn run(
    operation: Operation,
    metadata: &Metadata,
    deps: Collaborators<'_>,
    options: &RunOptions,
) -> Result<()> {
    let service = options.service()?;
    if matches!(
        operation,
        Operation::Deploy | Operation::Delete | Operation::ScaleDown | Operation::ScaleUp
    ) {
        options.version()?;
    }

    tracing::info!("==== Get current version from load balancer ====");
    let live = deps
        .routing
        .current_version(service)
        .await?
        .map(|v| normalize_version(&v));

    if operation == Operation::CurrentVersion {
        tracing::info!(
            "The current deployed version of {} in GCP project {} is: {}",
            service,
            metadata.project(),
            live.as_deref().unwrap_or("unknown")
        );
        println!("{}", live.as_deref().unwrap_or(""));
        return Ok(());
    }

    let orchestrator = Orchestrator::new(
        deps.compute,
        metadata,
        deps.probe,
        options.wait,
        options.artifact_dir.clone(),
    );

    match operation {
        Operation::CurrentVersion => Ok(()),
        Operation::Overview => {
            let inventory = orchestrator.overview(service).await?;
            let map = serde_json::to_string_pretty(&inventory.version_map())
                .map_err(|e| DeployError::malformed("overview", e.to_string()))?;
            println!("{}", map);
            Ok(())
        }
        Operation::Deploy => {
            let mut release = Release::new(service, options.version()?, metadata);
            tracing::info!(
                "Receiving command on deploy service {} version {}",
                service,
                release.version
            );
            orchestrator.deploy(&mut release, live.as_deref()).await?;
            Ok(())
        }
        Operation::Delete => {
            let release = Release::new(service, options.version()?, metadata);
            if live.as_deref() == Some(release.version.as_str()) {
                tracing::warn!(
                    "Version {} of {} is the live version and is being deleted",
                    release.version,
                    service
                );
            }
            let inventory = orchestrator.overview(service).await?;
            let deleted = orchestrator
                .delete(service, &release.version, &inventory)
                .await?;
            tracing::info!(
                "Deleted {} resources of {} version {}",
                deleted,
                service,
                release.version
            );
            Ok(())
        }
        Operation::DeletePrevious => {
            let deleted = orchestrator
                .delete_previous(service, live.as_deref())
                .await?;
            tracing::info!(
                "Current working {} version: {}, deleted versions: [{}]",
                service,
                live.as_deref().unwrap_or("unknown"),
                deleted.join(", ")
            );
            Ok(())
        }
        Operation::ScaleDown => {
            let release = Release::new(service, options.version()?, metadata);
            let inventory = orchestrator.overview(service).await?;
            orchestrator.scale_down(&release, &inventory).await
        }
        Operation::ScaleUp => {
            let release = Release::new(service, options.version()?, metadata);
            orchestrator.scale_up(&release).await
        }
    }
}
