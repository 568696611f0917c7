//! Release Orchestrator
//!
//! Drives the provider through the ordered create and delete sequences of a
//! release stack. Every step waits for its operations before the next one starts.
//! Nothing is rolled back: a failed run leaves whatever was created for the next
//! `delete` or `deploy` to reconcile from a fresh inventory.

use super::{artifact, plan, Release};
use crate::error::{DeployError, Result};
use crate::gcp::compute::ComputeApi;
use crate::gcp::operation::{Operation, OperationWaiter, WaitSettings};
use crate::healthcheck::{self, HealthProbe, ProbeTarget};
use crate::metadata::Metadata;
use crate::resource::{self, reconcile, Inventory, NameDecoder, ResourceKind};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;

/// Sequences release stacks through the provider
pub struct Orchestrator<'a> {
    client: &'a dyn ComputeApi,
    metadata: &'a Metadata,
    probe: &'a dyn HealthProbe,
    waiter: OperationWaiter<'a>,
    artifact_dir: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        client: &'a dyn ComputeApi,
        metadata: &'a Metadata,
        probe: &'a dyn HealthProbe,
        settings: WaitSettings,
        artifact_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            metadata,
            probe,
            waiter: OperationWaiter::new(client, settings),
            artifact_dir,
        }
    }

    fn decoder(&self, service: &str) -> NameDecoder {
        NameDecoder::new(
            service,
            self.metadata.service_instances.iter().map(|i| i.name.clone()),
        )
    }

    /// Rebuild the inventory of a service from the provider
    pub async fn overview(&self, service: &str) -> Result<Inventory> {
        tracing::info!(
            "==== Starting overviewing resources of {} in GCP project {} ====",
            service,
            self.metadata.project()
        );
        resource::collect(self.client, &self.decoder(service)).await
    }

    /// Create the full stack of a release, healthcheck it and write the deploy artifact.
    /// `live` is the version currently receiving traffic, normalized.
    pub async fn deploy(&self, release: &mut Release, live: Option<&str>) -> Result<PathBuf> {
        if live == Some(release.version.as_str()) {
            return Err(DeployError::VersionIsLive {
                service: release.service.clone(),
                version: release.version.clone(),
            });
        }

        let inventory = self.overview(&release.service).await?;
        let reconciliation = reconcile(&inventory, live);

        if reconciliation.is_stale(&release.version) {
            tracing::info!(
                "Deployment of {} version {} found in GCP project but is not current, deleting it first",
                release.service,
                release.version
            );
            self.delete(&release.service, &release.version, &inventory)
                .await?;
        }

        release.definitions.metadata.previous_version = inventory
            .newest_group_version(&release.version)
            .or_else(|| live.map(str::to_string));

        tracing::info!(
            "======= Deploy service: {} version: {} =======",
            release.service,
            release.version
        );

        // Images
        let images = plan::disk_images(release, self.metadata);
        release.definitions.disk_images = Some(images.clone());
        self.create_all(ResourceKind::Image, &images).await?;

        // Instance template
        let template = plan::instance_template(release, self.metadata);
        release.definitions.instance_template = Some(template.clone());
        self.create_all(ResourceKind::InstanceTemplate, std::slice::from_ref(&template))
            .await?;

        // Managed instance group, blocks until stable
        let group = plan::instance_group_manager(release, self.metadata);
        release.definitions.instance_group_managed = Some(group.clone());
        let started = Instant::now();
        self.create_all(ResourceKind::InstanceGroupManager, std::slice::from_ref(&group))
            .await?;
        self.waiter
            .wait_until_stable(&release.instance_group_name)
            .await?;
        tracing::info!(
            "Instance Group Managed: {} deploy interval: {:.1}s",
            release.instance_group_name,
            started.elapsed().as_secs_f64()
        );

        // Autoscaler
        let autoscaler = plan::autoscaler(release, self.metadata);
        release.definitions.autoscaler = Some(autoscaler.clone());
        self.create_all(ResourceKind::Autoscaler, std::slice::from_ref(&autoscaler))
            .await?;

        // Backend services
        let backends = plan::backend_services(release, self.metadata);
        release.definitions.backends = Some(backends.clone());
        self.create_all(ResourceKind::BackendService, &backends)
            .await?;

        // Addresses
        let addresses = plan::addresses(release, self.metadata);
        release.definitions.addresses = Some(addresses.clone());
        self.create_all(ResourceKind::Address, &addresses).await?;

        // Forwarding rules, bound to the addresses reserved above
        let mut rules = Vec::with_capacity(release.instances.len());
        for instance in &release.instances {
            let address_name = release.instance_resource_name(ResourceKind::Address, &instance.name);
            let ip = self.reserved_ip(&address_name).await?;
            rules.push(plan::forwarding_rule(release, self.metadata, instance, &ip));
        }
        release.definitions.forwarding_rules = Some(rules.clone());
        self.create_all(ResourceKind::ForwardingRule, &rules).await?;

        // Healthcheck
        tracing::info!("Health checking GCE load balancers");
        let targets = rules
            .iter()
            .map(ProbeTarget::from_forwarding_rule)
            .collect::<Result<Vec<_>>>()?;
        let results = self
            .probe
            .probe(&targets, &release.healthcheck_endpoint)
            .await;
        release.definitions.healthcheck = Some(results.clone());
        healthcheck::evaluate(&results)?;

        tracing::info!(
            "Deploy service: {} version: {} finished",
            release.service,
            release.version
        );
        if let Some(previous) = &release.definitions.metadata.previous_version {
            tracing::info!("Previous release version: {}", previous);
        }

        artifact::write(release, &self.artifact_dir)
    }

    /// Delete every resource of one version, most dependent first. Kinds with
    /// nothing deployed for the version are skipped. Returns the number of
    /// resources deleted.
    pub async fn delete(&self, service: &str, version: &str, inventory: &Inventory) -> Result<usize> {
        tracing::info!("======= Deleting {} version: {} =======", service, version);
        let mut deleted = 0;

        for kind in ResourceKind::DELETE_ORDER {
            let names = inventory.deletable_names(kind, version);
            if names.is_empty() {
                tracing::info!(
                    "Delete {} of deployment version {}: [ SKIP ]",
                    kind.display_name(),
                    version
                );
                continue;
            }

            self.delete_all(kind, &names).await?;
            deleted += names.len();
        }

        Ok(deleted)
    }

    /// Delete every deployed version of a service except the live one
    pub async fn delete_previous(&self, service: &str, live: Option<&str>) -> Result<Vec<String>> {
        let inventory = self.overview(service).await?;
        tracing::info!(
            "==== Find previous versions of {} in GCP project {} ====",
            service,
            self.metadata.project()
        );

        let reconciliation = reconcile(&inventory, live);
        if !reconciliation.live_known() {
            return Err(DeployError::LiveVersionUnknown {
                service: service.to_string(),
                action: "delete previous versions",
            });
        }

        if reconciliation.stale.is_empty() {
            tracing::info!(
                "In GCP project {} for service {} not found previous version for deleting",
                self.metadata.project(),
                service
            );
            return Ok(Vec::new());
        }

        let versions: Vec<String> = reconciliation.stale.into_iter().collect();
        tracing::info!(
            "Will delete following {} release versions: {}",
            service,
            versions.join(", ")
        );
        for version in &versions {
            self.delete(service, version, &inventory).await?;
        }

        Ok(versions)
    }

    /// Remove the autoscaler of a release and shrink its group to zero. The
    /// autoscaler goes first or it would scale the group back up.
    pub async fn scale_down(&self, release: &Release, inventory: &Inventory) -> Result<()> {
        tracing::info!(
            "==== Scale down deployment service: {}, version {}",
            release.service,
            release.version
        );

        let autoscalers = inventory.names(ResourceKind::Autoscaler, &release.version);
        if autoscalers.is_empty() {
            tracing::info!(
                "Delete regional autoscaler of deployment version {}: [ SKIP ]",
                release.version
            );
        } else {
            self.delete_all(ResourceKind::Autoscaler, &autoscalers).await?;
        }

        let event = format!("Scale down instance group: {}", release.instance_group_name);
        tracing::info!("{}", event);
        let operation = self
            .client
            .resize_group(&release.instance_group_name, 0)
            .await?;
        self.waiter.wait(&operation, &event).await
    }

    /// Recreate the autoscaler of a release whose group still exists
    pub async fn scale_up(&self, release: &Release) -> Result<()> {
        tracing::info!(
            "==== Scale up deployment service: {}, version {}",
            release.service,
            release.version
        );
        let body = plan::autoscaler(release, self.metadata);
        self.create_all(ResourceKind::Autoscaler, std::slice::from_ref(&body))
            .await
    }

    async fn reserved_ip(&self, address: &str) -> Result<String> {
        tracing::debug!("Getting ip address of {}", address);
        let response = self.client.get(ResourceKind::Address, address).await?;
        response
            .get("address")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| DeployError::malformed(format!("address {}", address), "missing 'address' field"))
    }

    /// Submit every create request of a step, then wait for each operation
    async fn create_all(&self, kind: ResourceKind, bodies: &[Value]) -> Result<()> {
        let mut operations: Vec<(String, Operation)> = Vec::with_capacity(bodies.len());

        for body in bodies {
            let name = body.get("name").and_then(|v| v.as_str()).unwrap_or("-");
            let event = format!("Creating {}: {}", kind.display_name(), name);
            tracing::info!("{}", event);

            let operation = self.client.insert(kind, body).await?;
            tracing::info!("Operation id: {}", operation.name);
            operations.push((event, operation));
        }

        self.waiter.wait_all(&operations).await
    }

    /// Submit every delete request of a step, then wait for each operation
    async fn delete_all(&self, kind: ResourceKind, names: &[String]) -> Result<()> {
        let mut operations: Vec<(String, Operation)> = Vec::with_capacity(names.len());

        for name in names {
            let event = format!("Deleting {}: {}", kind.display_name(), name);
            tracing::info!("{} START", event);

            let operation = self.client.delete(kind, name).await?;
            operations.push((event, operation));
        }

        self.waiter.wait_all(&operations).await
    }
}
