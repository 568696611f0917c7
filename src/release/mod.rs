//! Releases
//!
//! A [`Release`] is one version of one service: the names of every resource in its
//! stack and the record of every body submitted while deploying it.
//!
//! - [`plan`] - Request bodies derived from the release and the metadata
//! - [`orchestrator`] - Deploy/delete/scale sequencing against the provider
//! - [`artifact`] - The deploy result file

pub mod artifact;
pub mod orchestrator;
pub mod plan;

use crate::healthcheck::ProbeResult;
use crate::metadata::{Metadata, ServiceInstance};
use crate::resource::{normalize_version, DiskRole, ResourceKey, ResourceKind};
use serde::Serialize;
use serde_json::Value;

pub use orchestrator::Orchestrator;

/// Timestamp format of deploy records and artifact file names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Header of the deploy record
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeployInfo {
    pub service_name: String,
    pub version: String,
    pub start_deploy: String,
    pub end_deploy: String,
    pub previous_version: Option<String>,
}

/// Every resource body submitted while deploying a release
#[derive(Debug, Clone, Serialize)]
pub struct Definitions {
    pub metadata: DeployInfo,
    pub instances: Vec<ServiceInstance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_images: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_template: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_group_managed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaler: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backends: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarding_rules: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Vec<ProbeResult>>,
}

/// One version of one service
#[derive(Debug, Clone)]
pub struct Release {
    pub service: String,
    /// Normalized version token
    pub version: String,
    pub boot_image_name: String,
    pub data_image_name: String,
    pub base_instance_name: String,
    pub instance_template_name: String,
    pub instance_group_name: String,
    pub autoscaler_name: String,
    pub instances: Vec<ServiceInstance>,
    pub healthcheck_endpoint: String,
    pub definitions: Definitions,
}

impl Release {
    pub fn new(service: &str, version: &str, metadata: &Metadata) -> Self {
        let version = normalize_version(version);
        let stack = |kind| ResourceKey::stack(kind, service, &version).encode();

        Self {
            service: service.to_string(),
            boot_image_name: ResourceKey::image(service, &version, DiskRole::Boot).encode(),
            data_image_name: ResourceKey::image(service, &version, DiskRole::Data).encode(),
            base_instance_name: format!(
                "{}-{}-vm",
                metadata.gce_instance.base_instance_name, version
            ),
            instance_template_name: stack(ResourceKind::InstanceTemplate),
            instance_group_name: stack(ResourceKind::InstanceGroupManager),
            autoscaler_name: stack(ResourceKind::Autoscaler),
            instances: metadata.service_instances.clone(),
            healthcheck_endpoint: metadata.healthcheck_endpoint.clone(),
            definitions: Definitions {
                metadata: DeployInfo {
                    service_name: service.to_string(),
                    version: version.clone(),
                    start_deploy: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
                    end_deploy: String::new(),
                    previous_version: None,
                },
                instances: metadata.service_instances.clone(),
                disk_images: None,
                instance_template: None,
                instance_group_managed: None,
                autoscaler: None,
                backends: None,
                addresses: None,
                forwarding_rules: None,
                healthcheck: None,
            },
            version,
        }
    }

    /// Name of a per-instance resource (backend service, address, forwarding rule)
    pub fn instance_resource_name(&self, kind: ResourceKind, instance: &str) -> String {
        ResourceKey::per_instance(kind, &self.service, instance, &self.version).encode()
    }
}

#[cfg(test)]
impl Release {
    fn backend_service_names(&self) -> Vec<String> {
        self.per_instance_names(ResourceKind::BackendService)
    }

    fn address_names(&self) -> Vec<String> {
        self.per_instance_names(ResourceKind::Address)
    }

    fn forwarding_rule_names(&self) -> Vec<String> {
        self.per_instance_names(ResourceKind::ForwardingRule)
    }

    fn per_instance_names(&self, kind: ResourceKind) -> Vec<String> {
        self.instances
            .iter()
            .map(|i| self.instance_resource_name(kind, &i.name))
            .collect()
    }
}
