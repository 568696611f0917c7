//! Long-running operations
//!
//! Every Compute Engine mutation returns an operation. [`OperationWaiter`] polls
//! it until `DONE` and turns an embedded error into a fatal [`DeployError`]. The
//! same waiter also blocks on managed instance group stabilization.

use super::compute::ComputeApi;
use crate::error::{DeployError, Result};
use crate::resource::{Location, ResourceKind};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Default poll interval for operations and group status
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default stabilization budget for a new managed instance group
pub const DEFAULT_STABILIZATION_TIMEOUT: Duration = Duration::from_secs(900);

/// Which operations collection an operation lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationScope {
    Global,
    Region(String),
    Zone(String),
}

/// Handle of a provider-side asynchronous task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub scope: OperationScope,
}

impl Operation {
    pub fn global(name: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: OperationScope::Global,
        }
    }

    pub fn regional(name: &str, region: &str) -> Self {
        Self {
            name: name.to_string(),
            scope: OperationScope::Region(region.to_string()),
        }
    }

    /// Read the operation handle from a mutation response. The scope comes from the
    /// response's `zone`/`region` link, falling back to where the resource kind lives.
    pub fn from_response(response: &Value, kind: ResourceKind, region: &str) -> Result<Self> {
        let name = response
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DeployError::malformed(
                    format!("{} mutation", kind.display_name()),
                    format!("response should contain 'name' field: {}", response),
                )
            })?;

        let short = |field: &str| {
            response
                .get(field)
                .and_then(|v| v.as_str())
                .and_then(|link| link.rsplit('/').next())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let scope = if let Some(zone) = short("zone") {
            OperationScope::Zone(zone)
        } else if let Some(region) = short("region") {
            OperationScope::Region(region)
        } else {
            match kind.location() {
                Location::Global => OperationScope::Global,
                Location::Regional => OperationScope::Region(region.to_string()),
            }
        };

        Ok(Self {
            name: name.to_string(),
            scope,
        })
    }
}

/// Operation status as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    Unknown(String),
}

impl OperationStatus {
    pub fn from_response(response: &Value) -> Self {
        match response.get("status").and_then(|v| v.as_str()) {
            Some("PENDING") => Self::Pending,
            Some("RUNNING") => Self::Running,
            Some("DONE") => Self::Done,
            Some(other) => Self::Unknown(other.to_string()),
            None => Self::Unknown(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Unknown(s) => s,
        }
    }
}

/// Build the fatal error of an operation that finished with an `error` field
pub fn operation_error(operation: &str, response: &Value) -> Option<DeployError> {
    let error = response.get("error")?;

    let code = match response.get("httpErrorStatusCode") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let message = response
        .get("httpErrorMessage")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let errors = error
        .get("errors")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().map(Value::to_string).collect())
        .unwrap_or_default();

    Some(DeployError::OperationFailed {
        operation: operation.to_string(),
        code,
        message,
        errors,
    })
}

/// Poll timing for a run
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    /// Pause between two status polls
    pub poll_interval: Duration,
    /// Wall-clock budget for a new group to report `isStable`
    pub stabilization_timeout: Duration,
    /// Optional deadline for a single operation; `None` waits indefinitely
    pub operation_timeout: Option<Duration>,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stabilization_timeout: DEFAULT_STABILIZATION_TIMEOUT,
            operation_timeout: None,
        }
    }
}

impl WaitSettings {
    /// Number of group status polls allowed before giving up
    pub fn stabilization_polls(&self) -> u64 {
        let interval = self.poll_interval.as_millis().max(1);
        ((self.stabilization_timeout.as_millis() / interval) as u64).max(1)
    }
}

/// Blocks on operations and group stabilization
pub struct OperationWaiter<'a> {
    client: &'a dyn ComputeApi,
    settings: WaitSettings,
}

impl<'a> OperationWaiter<'a> {
    pub fn new(client: &'a dyn ComputeApi, settings: WaitSettings) -> Self {
        Self { client, settings }
    }

    /// Poll one operation until it is DONE
    pub async fn wait(&self, operation: &Operation, event: &str) -> Result<()> {
        let started = Instant::now();

        loop {
            let response = self.client.get_operation(operation).await?;
            let status = OperationStatus::from_response(&response);

            if status == OperationStatus::Done {
                if let Some(err) = operation_error(&operation.name, &response) {
                    tracing::error!("{}: {}", event, err);
                    return Err(err);
                }
                tracing::info!("{}: {}", event, status.as_str());
                return Ok(());
            }

            tracing::info!("{}: {}", event, status.as_str());
            tracing::debug!("Operation response body: {}", response);

            if let Some(limit) = self.settings.operation_timeout {
                if started.elapsed() + self.settings.poll_interval > limit {
                    return Err(DeployError::OperationTimeout {
                        operation: operation.name.clone(),
                        waited: started.elapsed(),
                    });
                }
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    /// Wait on a batch of already submitted operations, one after another
    pub async fn wait_all(&self, operations: &[(String, Operation)]) -> Result<()> {
        for (event, operation) in operations {
            self.wait(operation, event).await?;
        }
        Ok(())
    }

    /// Poll a regional managed instance group until it reports `isStable`
    pub async fn wait_until_stable(&self, group: &str) -> Result<()> {
        tracing::info!("Wait instance group {} is stabilization START", group);
        let max_polls = self.settings.stabilization_polls();

        for poll in 1..=max_polls {
            let response = self
                .client
                .get(ResourceKind::InstanceGroupManager, group)
                .await?;
            let stable = response
                .pointer("/status/isStable")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            if stable {
                tracing::info!("Instance group: {} return status isStable: true", group);
                return Ok(());
            }

            tracing::info!(
                "Instance group: {} return status isStable: false ({}/{})",
                group,
                poll,
                max_polls
            );
            tracing::debug!("Instance group response body: {}", response);

            if poll < max_polls {
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        }

        Err(DeployError::StabilizationTimeout {
            group: group.to_string(),
            budget: self.settings.stabilization_timeout,
        })
    }
}
