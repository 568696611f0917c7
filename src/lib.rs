//! Blue-green deployment of managed instance groups to Google Cloud Platform.
//!
//! A release is a full parallel stack of Compute Engine resources named after
//! its service and version. Deploying creates the stack in dependency order and
//! healthchecks it; deleting removes it in reverse order. The live version comes
//! from the GKE ingress that routes traffic to one of the stacks.

pub mod app;
pub mod error;
pub mod gcp;
pub mod healthcheck;
pub mod ingress;
pub mod metadata;
pub mod release;
pub mod resource;

pub use error::{DeployError, Result};
