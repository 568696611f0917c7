//! Compute Engine resource calls
//!
//! [`ComputeApi`] is the seam between the release orchestrator and the provider.
//! [`GcpClient`] implements it against the Compute Engine REST API.

use super::client::GcpClient;
use super::operation::{Operation, OperationScope};
use crate::error::Result;
use crate::resource::ResourceKind;
use async_trait::async_trait;
use serde_json::Value;

/// Create/delete/list/resize calls for the stack resource kinds
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// List every resource of a kind in the project (all pages)
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>>;

    /// Fetch one resource by name
    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Value>;

    /// Submit a create request
    async fn insert(&self, kind: ResourceKind, body: &Value) -> Result<Operation>;

    /// Submit a delete request
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<Operation>;

    /// Resize a regional managed instance group
    async fn resize_group(&self, group: &str, size: u32) -> Result<Operation>;

    /// Current state of an operation
    async fn get_operation(&self, operation: &Operation) -> Result<Value>;
}

/// One page of a list call
struct Page {
    items: Vec<Value>,
    next_token: Option<String>,
}

impl GcpClient {
    async fn list_page(&self, kind: ResourceKind, page_token: Option<&str>) -> Result<Page> {
        let mut url = self.collection_url(kind);
        if let Some(token) = page_token {
            url = format!("{}?pageToken={}", url, urlencoding::encode(token));
        }

        let response = self.get(&url).await?;

        let items = response
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let next_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(Page { items, next_token })
    }

    fn operation_url(&self, operation: &Operation) -> String {
        let path = format!("operations/{}", urlencoding::encode(&operation.name));
        match &operation.scope {
            OperationScope::Global => self.compute_global_url(&path),
            OperationScope::Region(region) => {
                self.compute_url(&format!("regions/{}/{}", region, path))
            }
            OperationScope::Zone(zone) => self.compute_zonal_url(zone, &path),
        }
    }
}

#[async_trait]
impl ComputeApi for GcpClient {
    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(kind, page_token.as_deref()).await?;
            all_items.extend(page.items);

            if page.next_token.is_none() {
                break;
            }
            page_token = page.next_token;
        }

        tracing::debug!("Listed {} {} resources", all_items.len(), kind);
        Ok(all_items)
    }

    async fn get(&self, kind: ResourceKind, name: &str) -> Result<Value> {
        GcpClient::get(self, &self.resource_url(kind, name)).await
    }

    async fn insert(&self, kind: ResourceKind, body: &Value) -> Result<Operation> {
        let mut url = self.collection_url(kind);
        // Source disks may still be attached to a running instance
        if kind == ResourceKind::Image {
            url.push_str("?forceCreate=true");
        }

        tracing::debug!("Insert {} body: {}", kind.display_name(), body);
        let response = self.post(&url, Some(body)).await?;
        tracing::debug!("Operation response: {}", response);

        Operation::from_response(&response, kind, &self.region)
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<Operation> {
        let response = GcpClient::delete(self, &self.resource_url(kind, name)).await?;
        tracing::debug!("Operation response: {}", response);

        Operation::from_response(&response, kind, &self.region)
    }

    async fn resize_group(&self, group: &str, size: u32) -> Result<Operation> {
        let url = format!(
            "{}/resize?size={}",
            self.resource_url(ResourceKind::InstanceGroupManager, group),
            size
        );
        let response = self.post(&url, None).await?;
        tracing::debug!("Operation response: {}", response);

        Operation::from_response(&response, ResourceKind::InstanceGroupManager, &self.region)
    }

    async fn get_operation(&self, operation: &Operation) -> Result<Value> {
        GcpClient::get(self, &self.operation_url(operation)).await
    }
}
