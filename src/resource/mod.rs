//! Stack resources
//!
//! This module knows which resource kinds make up a release stack, how they
//! are named, and what is currently deployed.
//!
//! # Architecture
//!
//! - [`kind`] - The fixed set of resource kinds and where they live in the API
//! - [`naming`] - Encode/decode contract between resource names and versions
//! - [`inventory`] - Snapshot of deployed resources rebuilt from the provider
//! - [`reconcile`] - Stale version computation against the live version

pub mod inventory;
pub mod kind;
pub mod naming;
pub mod reconcile;

pub use inventory::{collect, Inventory, InventoryEntry};
pub use kind::{Location, ResourceKind};
pub use naming::{normalize_version, DecodeError, DiskRole, NameDecoder, ResourceKey};
pub use reconcile::{reconcile, Reconciliation};
