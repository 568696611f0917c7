//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::TokenSource;
use super::http::GcpHttpClient;
use crate::error::{DeployError, Result};
use crate::resource::{Location, ResourceKind};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Default Compute Engine API endpoint
pub const COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Default GKE API endpoint
pub const CONTAINER_ENDPOINT: &str = "https://container.googleapis.com/v1";

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    tokens: Arc<dyn TokenSource>,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub region: String,
    compute_endpoint: String,
    container_endpoint: String,
}

impl GcpClient {
    /// Create a new GCP client for one project and region
    pub fn new(tokens: Arc<dyn TokenSource>, project_id: &str, region: &str) -> Result<Self> {
        Ok(Self {
            tokens,
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            region: region.to_string(),
            compute_endpoint: COMPUTE_ENDPOINT.to_string(),
            container_endpoint: CONTAINER_ENDPOINT.to_string(),
        })
    }

    /// Point the client at different API endpoints (emulators, tests)
    pub fn with_endpoints(mut self, compute: &str, container: &str) -> Result<Self> {
        for endpoint in [compute, container] {
            Url::parse(endpoint).map_err(|e| {
                DeployError::malformed(format!("endpoint {}", endpoint), e.to_string())
            })?;
        }
        self.compute_endpoint = compute.trim_end_matches('/').to_string();
        self.container_endpoint = container.trim_end_matches('/').to_string();
        Ok(self)
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.tokens.token().await
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.compute_endpoint, self.project_id, path
        )
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, zone: &str, resource: &str) -> String {
        self.compute_url(&format!("zones/{}/{}", zone, resource))
    }

    /// Build regional Compute Engine API URL
    pub fn compute_regional_url(&self, resource: &str) -> String {
        self.compute_url(&format!("regions/{}/{}", self.region, resource))
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, resource: &str) -> String {
        self.compute_url(&format!("global/{}", resource))
    }

    /// Collection URL of a stack resource kind
    pub fn collection_url(&self, kind: ResourceKind) -> String {
        match kind.location() {
            Location::Global => self.compute_global_url(kind.collection()),
            Location::Regional => self.compute_regional_url(kind.collection()),
        }
    }

    /// URL of one named resource
    pub fn resource_url(&self, kind: ResourceKind, name: &str) -> String {
        format!("{}/{}", self.collection_url(kind), urlencoding::encode(name))
    }

    // =========================================================================
    // GKE API helpers
    // =========================================================================

    /// Build GKE API URL
    pub fn container_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.container_endpoint, self.project_id, path
        )
    }

    /// Build GKE location URL (region or zone)
    pub fn container_location_url(&self, location: &str, resource: &str) -> String {
        self.container_url(&format!("locations/{}/{}", location, resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::StaticToken;

    fn client() -> GcpClient {
        GcpClient::new(Arc::new(StaticToken("t".into())), "proj-1", "europe-west1").unwrap()
    }

    #[test]
    fn test_collection_urls() {
        let client = client();
        assert_eq!(
            client.collection_url(ResourceKind::Image),
            "https://compute.googleapis.com/compute/v1/projects/proj-1/global/images"
        );
        assert_eq!(
            client.resource_url(ResourceKind::Autoscaler, "api-1-0-0"),
            "https://compute.googleapis.com/compute/v1/projects/proj-1/regions/europe-west1/autoscalers/api-1-0-0"
        );
    }

    #[test]
    fn test_with_endpoints() {
        let client = client()
            .with_endpoints("http://127.0.0.1:8080/compute/v1/", "http://127.0.0.1:8080/v1")
            .unwrap();
        assert_eq!(
            client.compute_zonal_url("europe-west1-b", "operations/op-1"),
            "http://127.0.0.1:8080/compute/v1/projects/proj-1/zones/europe-west1-b/operations/op-1"
        );
        assert_eq!(
            client.container_location_url("europe-west1", "clusters/edge"),
            "http://127.0.0.1:8080/v1/projects/proj-1/locations/europe-west1/clusters/edge"
        );

        assert!(client.with_endpoints("not a url", "http://x").is_err());
    }
}
