//! GCP API interaction module
//!
//! This module provides the provider side of a deployment: authentication,
//! the REST client, the Compute Engine resource calls and operation waiting.
//!
//! # Module Structure
//!
//! - [`auth`] - Service account authentication and token caching
//! - [`client`] - Main GCP client and URL builders
//! - [`compute`] - The [`compute::ComputeApi`] seam used by the orchestrator
//! - [`http`] - HTTP utilities for REST API calls
//! - [`operation`] - Operation and stabilization waiting
//!
//! # Example
//!
//! ```ignore
//! use gcp_deploy::gcp::{auth::GcpCredentials, client::GcpClient, compute::ComputeApi};
//! use gcp_deploy::resource::ResourceKind;
//!
//! async fn example() -> gcp_deploy::error::Result<()> {
//!     let credentials = GcpCredentials::from_key_file("key.json".as_ref())?;
//!     let client = GcpClient::new(std::sync::Arc::new(credentials), "my-project", "europe-west1")?;
//!     let images = client.list(ResourceKind::Image).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod compute;
pub mod http;
pub mod operation;
