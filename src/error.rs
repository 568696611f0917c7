//! Error types for gcp-deploy.
//!
//! Every failure below the dispatcher is a [`DeployError`]. The binary maps the
//! variant to a process exit code in exactly one place (see [`DeployError::exit_code`]).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for deploy operations.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Exit code for fatal configuration, provider and validation errors.
pub const EXIT_FATAL: u8 = 3;
/// Exit code for routing/ingress lookup failures.
pub const EXIT_INGRESS: u8 = 2;
/// Exit code for a failed post-deploy healthcheck.
pub const EXIT_HEALTHCHECK: u8 = 4;

/// Main error type for gcp-deploy.
#[derive(Error, Debug)]
pub enum DeployError {
    // Configuration errors
    #[error("Failed to read metadata file {path:?}: {source}")]
    MetadataRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metadata file {path:?}: {reason}")]
    MetadataInvalid { path: PathBuf, reason: String },

    #[error("Failed to load GCP credentials from {path:?}: {reason}")]
    Credentials { path: PathBuf, reason: String },

    #[error("Missing required argument: --{0}")]
    MissingArgument(&'static str),

    // Provider errors
    #[error("GCP API error {status}: {message}{}", format_details(.details))]
    Api {
        status: u16,
        message: String,
        details: Vec<String>,
    },

    #[error("HTTP request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {context}: {reason}")]
    MalformedResponse { context: String, reason: String },

    // Operation errors
    #[error("{code} {message}: {}", .errors.join(", "))]
    OperationFailed {
        operation: String,
        code: String,
        message: String,
        errors: Vec<String>,
    },

    #[error("Operation {operation} did not finish within {}s", .waited.as_secs())]
    OperationTimeout { operation: String, waited: Duration },

    #[error("Instance group {group} did not return status isStable: true in time interval {} seconds", .budget.as_secs())]
    StabilizationTimeout { group: String, budget: Duration },

    // Release errors
    #[error("Version {version} of {service} is already deployed and is current (in load balancer)")]
    VersionIsLive { service: String, version: String },

    #[error("Current version of {service} is unknown; refusing to {action}")]
    LiveVersionUnknown { service: String, action: &'static str },

    #[error("Healthcheck failed for: {}", .failed.join(", "))]
    HealthcheckFailed { failed: Vec<String> },

    #[error("Failed to write deploy result {path:?}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Routing errors
    #[error("Ingress lookup failed: {0}")]
    Ingress(String),
}

fn format_details(details: &[String]) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(" ({})", details.join("; "))
    }
}

impl DeployError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::Ingress(_) | DeployError::LiveVersionUnknown { .. } => EXIT_INGRESS,
            DeployError::HealthcheckFailed { .. } => EXIT_HEALTHCHECK,
            _ => EXIT_FATAL,
        }
    }

    pub(crate) fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::MalformedResponse {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
