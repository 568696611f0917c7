//! Live version lookup
//!
//! The version receiving traffic is whatever the GKE ingress of the service
//! is labelled with. The cluster is looked up through the GKE API for its
//! endpoint and CA, then the ingresses of the configured namespace are listed
//! from the Kubernetes API directly.

use crate::error::{DeployError, Result};
use crate::gcp::client::GcpClient;
use crate::metadata::GkeCluster;
use crate::resource::normalize_version;
use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

/// Server-side timeout passed to the ingress list call
const LIST_TIMEOUT_SECS: u64 = 15;

/// Label that carries the release version on an ingress
const VERSION_LABEL: &str = "version";

/// Where the live version of a service comes from
#[async_trait]
pub trait LiveVersionSource: Send + Sync {
    /// Normalized live version, `None` when the routing layer does not name exactly one
    async fn current_version(&self, service: &str) -> Result<Option<String>>;
}

/// Reads the live version from ingress labels on a GKE cluster
pub struct GkeIngress {
    client: GcpClient,
    cluster: GkeCluster,
}

impl GkeIngress {
    pub fn new(client: GcpClient, cluster: GkeCluster) -> Self {
        Self { client, cluster }
    }

    /// Cluster endpoint and decoded CA certificate
    async fn cluster_access(&self) -> Result<(String, Option<Vec<u8>>)> {
        let url = self.client.container_location_url(
            &self.cluster.location,
            &format!("clusters/{}", self.cluster.name),
        );
        let cluster = self
            .client
            .get(&url)
            .await
            .map_err(|e| DeployError::Ingress(format!("cluster {} lookup failed: {}", self.cluster.name, e)))?;

        let endpoint = cluster
            .get("endpoint")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                DeployError::Ingress(format!("cluster {} has no endpoint", self.cluster.name))
            })?;

        let ca = match cluster
            .pointer("/masterAuth/clusterCaCertificate")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        {
            Some(encoded) => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| DeployError::Ingress(format!("cluster CA is not base64: {}", e)))?,
            ),
            None => None,
        };

        Ok((api_base(endpoint), ca))
    }

    async fn list_ingresses(&self) -> Result<Value> {
        let (base, ca) = self.cluster_access().await?;

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(LIST_TIMEOUT_SECS + 5));
        if let Some(pem) = ca {
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| DeployError::Ingress(format!("invalid cluster CA: {}", e)))?;
            builder = builder.add_root_certificate(certificate);
        }
        let http = builder
            .build()
            .map_err(|e| DeployError::Ingress(e.to_string()))?;

        let url = format!(
            "{}/apis/networking.k8s.io/v1/namespaces/{}/ingresses?timeoutSeconds={}",
            base,
            urlencoding::encode(&self.cluster.namespace),
            LIST_TIMEOUT_SECS
        );
        tracing::debug!("GET {}", url);

        let token = self
            .client
            .get_token()
            .await
            .map_err(|e| DeployError::Ingress(e.to_string()))?;
        let response = http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DeployError::Ingress(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeployError::Ingress(e.to_string()))?;
        if !status.is_success() {
            return Err(DeployError::Ingress(format!(
                "listing ingresses returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| DeployError::Ingress(format!("bad ingress list: {}", e)))
    }
}

#[async_trait]
impl LiveVersionSource for GkeIngress {
    async fn current_version(&self, service: &str) -> Result<Option<String>> {
        tracing::info!(
            "Getting current version of {} from ingress in namespace {}",
            service,
            self.cluster.namespace
        );
        let list = self.list_ingresses().await?;
        let versions = ingress_versions(&list, service);

        match versions.len() {
            0 => {
                tracing::warn!("No ingress of {} carries a version label", service);
                Ok(None)
            }
            1 => {
                let version = versions.into_iter().next();
                if let Some(v) = &version {
                    tracing::info!("Current version of {}: {}", service, v);
                }
                Ok(version)
            }
            _ => {
                tracing::warn!(
                    "Ingresses of {} point to different versions: {}",
                    service,
                    versions.into_iter().collect::<Vec<_>>().join(", ")
                );
                Ok(None)
            }
        }
    }
}

/// Endpoints are bare hosts; keep an explicit scheme when one is given
fn api_base(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

/// Normalized version labels of the ingresses whose name contains the service
fn ingress_versions(list: &Value, service: &str) -> BTreeSet<String> {
    list.get("items")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.pointer("/metadata/name")
                        .and_then(|v| v.as_str())
                        .is_some_and(|name| name.contains(service))
                })
                .filter_map(|item| {
                    item.pointer("/metadata/labels")
                        .and_then(|labels| labels.get(VERSION_LABEL))
                        .and_then(|v| v.as_str())
                })
                .map(normalize_version)
                .collect()
        })
        .unwrap_or_default()
}
