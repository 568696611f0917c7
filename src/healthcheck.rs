//! Post-deploy HTTP healthcheck
//!
//! Probes every new forwarding rule once with a bounded timeout. Any failure
//! fails the deploy; nothing is rolled back.

use crate::error::{DeployError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Default timeout of one probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint behind one forwarding rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub name: String,
    pub ip: String,
    pub port: u16,
}

impl ProbeTarget {
    /// Read the target from a forwarding-rule body (`IPAddress` and the first port)
    pub fn from_forwarding_rule(rule: &Value) -> Result<Self> {
        let name = rule.get("name").and_then(|v| v.as_str()).unwrap_or("-");
        let invalid = |reason: &str| DeployError::malformed(format!("forwarding rule {}", name), reason);

        let ip = rule
            .get("IPAddress")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing IPAddress"))?;
        let port = match rule.pointer("/ports/0") {
            Some(Value::String(s)) => s.parse().ok(),
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            _ => None,
        }
        .ok_or_else(|| invalid("missing port"))?;

        Ok(Self {
            name: name.to_string(),
            ip: ip.to_string(),
            port,
        })
    }

    pub fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("http://{}:{}{}", self.ip, self.port, path)
    }
}

/// Outcome of probing one target
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProbeResult {
    pub name: String,
    pub url: String,
    /// HTTP status, `None` when the request did not complete
    pub status_code: Option<u16>,
    pub body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn passed(&self) -> bool {
        self.status_code == Some(200)
    }
}

/// Probes a set of endpoints
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, targets: &[ProbeTarget], path: &str) -> Vec<ProbeResult>;
}

/// HTTP GET probe
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| DeployError::Transport {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    async fn probe_one(&self, target: &ProbeTarget, path: &str) -> ProbeResult {
        let url = target.url(path);
        tracing::debug!("Healthcheck GET {}", url);

        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
                ProbeResult {
                    name: target.name.clone(),
                    url,
                    status_code: Some(status),
                    body,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("Can not connect to {}: {}", url, e);
                ProbeResult {
                    name: target.name.clone(),
                    url,
                    status_code: None,
                    body: Value::Null,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, targets: &[ProbeTarget], path: &str) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(self.probe_one(target, path).await);
        }
        results
    }
}

/// Log the results and fail if any target did not answer 200
pub fn evaluate(results: &[ProbeResult]) -> Result<()> {
    tracing::info!("===== Healthcheck results =====");
    for result in results {
        let status = result
            .status_code
            .map(|s| s.to_string())
            .unwrap_or_else(|| "timeout".to_string());
        if result.passed() {
            tracing::info!("{} || {} || {}", result.name, result.url, status);
        } else {
            tracing::error!("{} || {} || {}", result.name, result.url, status);
            tracing::error!("Body: {}", result.body);
        }
    }

    let failed: Vec<String> = results
        .iter()
        .filter(|r| !r.passed())
        .map(|r| r.name.clone())
        .collect();

    if failed.is_empty() {
        tracing::info!("===== Healthcheck passed! =====");
        Ok(())
    } else {
        tracing::error!("===== Healthcheck failed! =====");
        Err(DeployError::HealthcheckFailed { failed })
    }
}
