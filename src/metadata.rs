//! Deployment Metadata
//!
//! Loads the declarative YAML document describing the GCP project, the instance
//! template, the instance group policies, the load balancer and the service instances.
//! Every field is required; a missing or malformed field is fatal.

use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use indexmap::IndexMap;
use std::path::Path;

/// Deployment metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    pub gcp_project: GcpProject,
    pub gce_instance: GceInstance,
    pub gce_instance_group: GceInstanceGroup,
    pub load_balancer: LoadBalancer,
    pub service_instances: Vec<ServiceInstance>,
    pub gke_cluster: GkeCluster,
    pub healthcheck_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpProject {
    pub name: String,
    pub region: String,
    pub network: String,
    pub subnetwork: String,
    pub service_account: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GceInstance {
    pub source_boot_disk: String,
    pub source_data_disk: String,
    pub machine_type: String,
    pub base_instance_name: String,
    pub tags: Vec<String>,
    pub boot_disk_size_gb: u32,
    pub data_disk_size_gb: u32,
    pub disk_type: String,
    pub startup_script_key: String,
    pub startup_script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GceInstanceGroup {
    pub size: u32,
    pub target_size: u32,
    pub auto_healing: AutoHealing,
    pub distribution_policy: DistributionPolicy,
    pub scaling: Scaling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoHealing {
    pub health_check: String,
    pub initial_delay_sec: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPolicy {
    pub target_shape: String,
    pub zones: Vec<ZoneConfiguration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfiguration {
    pub zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scaling {
    pub cool_down_period_sec: u32,
    pub cpu_utilization_target: f64,
    pub custom_metric_utilizations: Vec<Value>,
    pub max_num_replicas: u32,
    pub min_num_replicas: u32,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    pub load_balancing_scheme: String,
    pub protocol: String,
    pub session_affinity: String,
    pub timeout_sec: u32,
    pub balancing_mode: String,
    pub draining_timeout_sec: u32,
}

/// One load-balanced entry point of the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInstance {
    pub name: String,
    /// Named ports exposed by the forwarding rule, in declaration order
    pub port: IndexMap<String, u16>,
    /// Name of the regional health check attached to the backend service
    pub healthcheck: String,
}

impl ServiceInstance {
    /// Ports in forwarding-rule order
    pub fn ports(&self) -> Vec<u16> {
        self.port.values().copied().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GkeCluster {
    pub name: String,
    pub namespace: String,
    pub location: String,
}

impl Metadata {
    /// Load metadata from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DeployError::MetadataRead {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!("Reading metadata file: {}", path.display());
        let metadata = Self::from_yaml(&content).map_err(|reason| DeployError::MetadataInvalid {
            path: path.to_path_buf(),
            reason,
        })?;
        tracing::debug!("Metadata: {:?}", metadata);

        Ok(metadata)
    }

    /// Parse and validate metadata from YAML text
    pub fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        let metadata: Metadata = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let required = [
            ("gcp_project.name", &self.gcp_project.name),
            ("gcp_project.region", &self.gcp_project.region),
            ("gcp_project.network", &self.gcp_project.network),
            ("gcp_project.subnetwork", &self.gcp_project.subnetwork),
            ("gcp_project.service_account", &self.gcp_project.service_account),
            ("gce_instance.machine_type", &self.gce_instance.machine_type),
            ("gce_instance.base_instance_name", &self.gce_instance.base_instance_name),
            ("gke_cluster.name", &self.gke_cluster.name),
            ("gke_cluster.namespace", &self.gke_cluster.namespace),
            ("healthcheck_endpoint", &self.healthcheck_endpoint),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(format!("field `{}` must not be empty", field));
        }

        if self.service_instances.is_empty() {
            return Err("`service_instances` must declare at least one instance".to_string());
        }
        for instance in &self.service_instances {
            if instance.port.is_empty() {
                return Err(format!(
                    "service instance `{}` must declare at least one port",
                    instance.name
                ));
            }
        }

        Ok(())
    }

    pub fn project(&self) -> &str {
        &self.gcp_project.name
    }

    pub fn region(&self) -> &str {
        &self.gcp_project.region
    }
}
