//! Resource Inventory
//!
//! Lists the provider resources of one service and decodes the version token
//! from every name. The result is an immutable [`Inventory`] snapshot that is
//! rebuilt on every run and passed explicitly to whoever needs it.

use super::kind::ResourceKind;
use super::naming::{DecodeError, NameDecoder};
use crate::error::Result;
use crate::gcp::compute::ComputeApi;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Address status of an address bound to a forwarding rule
const ADDRESS_IN_USE: &str = "IN_USE";

/// One discovered resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub kind: ResourceKind,
    pub name: String,
    /// RFC 3339 `creationTimestamp` as reported by the provider
    pub created: Option<String>,
    pub version: String,
    pub instance: Option<String>,
}

/// Snapshot of every stack resource of one service
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    service: String,
    entries: BTreeMap<ResourceKind, Vec<InventoryEntry>>,
    /// Every address of the service whatever its status, for deletion
    addresses: Vec<InventoryEntry>,
    failures: Vec<DecodeError>,
}

impl Inventory {
    /// Build a snapshot from raw list responses. Items whose name does not contain
    /// the service are ignored; names that contain it but cannot be decoded are kept
    /// as failures and do not stop the listing.
    pub fn from_listing<I>(decoder: &NameDecoder, listing: I) -> Self
    where
        I: IntoIterator<Item = (ResourceKind, Vec<Value>)>,
    {
        let mut inventory = Inventory {
            service: decoder.service().to_string(),
            ..Default::default()
        };

        for (kind, items) in listing {
            let entries = inventory.entries.entry(kind).or_default();

            for item in &items {
                let Some(name) = item.get("name").and_then(|v| v.as_str()) else {
                    continue;
                };
                if !name.contains(decoder.service()) {
                    continue;
                }

                match decoder.decode(kind, name) {
                    Ok(key) => {
                        let entry = InventoryEntry {
                            kind,
                            name: name.to_string(),
                            created: item
                                .get("creationTimestamp")
                                .and_then(|v| v.as_str())
                                .map(str::to_string),
                            version: key.version,
                            instance: key.instance,
                        };
                        if kind != ResourceKind::Address {
                            entries.push(entry);
                            continue;
                        }
                        // Only addresses bound to a forwarding rule count as deployed
                        if item.get("status").and_then(|v| v.as_str()) == Some(ADDRESS_IN_USE) {
                            entries.push(entry.clone());
                        }
                        inventory.addresses.push(entry);
                    }
                    Err(err) => {
                        tracing::warn!("Failed to retrieve version from resource {}", err);
                        inventory.failures.push(err);
                    }
                }
            }

            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
        inventory.addresses.sort_by(|a, b| a.name.cmp(&b.name));

        inventory
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn entries(&self, kind: ResourceKind) -> &[InventoryEntry] {
        self.entries.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names of a kind that belong to one version
    pub fn names(&self, kind: ResourceKind, version: &str) -> Vec<String> {
        self.entries(kind)
            .iter()
            .filter(|e| e.version == version)
            .map(|e| e.name.clone())
            .collect()
    }

    /// Names of a kind to remove when deleting one version. Unlike [`Inventory::names`]
    /// this includes addresses left RESERVED by a stack whose forwarding rule is gone.
    pub fn deletable_names(&self, kind: ResourceKind, version: &str) -> Vec<String> {
        if kind != ResourceKind::Address {
            return self.names(kind, version);
        }
        self.addresses
            .iter()
            .filter(|e| e.version == version)
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn versions(&self, kind: ResourceKind) -> BTreeSet<String> {
        self.entries(kind).iter().map(|e| e.version.clone()).collect()
    }

    /// Versions per kind, for every kind in the stack
    pub fn version_map(&self) -> BTreeMap<ResourceKind, BTreeSet<String>> {
        ResourceKind::ALL
            .iter()
            .map(|kind| (*kind, self.versions(*kind)))
            .collect()
    }

    /// Union of versions over all kinds
    pub fn all_versions(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flatten()
            .map(|e| e.version.clone())
            .collect()
    }

    pub fn contains_version(&self, version: &str) -> bool {
        self.entries.values().flatten().any(|e| e.version == version)
    }

    /// Names that contained the service but did not decode
    pub fn failures(&self) -> &[DecodeError] {
        &self.failures
    }

    /// Version of the most recently created instance group, other than `excluding`
    pub fn newest_group_version(&self, excluding: &str) -> Option<String> {
        self.entries(ResourceKind::InstanceGroupManager)
            .iter()
            .filter(|e| e.version != excluding)
            .max_by(|a, b| a.created.cmp(&b.created))
            .map(|e| e.version.clone())
    }
}

/// List every stack resource kind of the service and build a snapshot
pub async fn collect(client: &dyn ComputeApi, decoder: &NameDecoder) -> Result<Inventory> {
    let mut listing = Vec::with_capacity(ResourceKind::ALL.len());

    for kind in ResourceKind::ALL {
        tracing::info!(
            "Getting {} resources of service: {}",
            kind.display_name(),
            decoder.service()
        );
        listing.push((kind, client.list(kind).await?));
    }

    let inventory = Inventory::from_listing(decoder, listing);

    for kind in ResourceKind::ALL {
        let entries = inventory.entries(kind);
        if entries.is_empty() {
            tracing::info!("Not found items for resource: {}", kind);
        } else {
            tracing::info!(
                "Found {}: {}",
                kind,
                entries
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    if !inventory.failures().is_empty() {
        tracing::warn!(
            "{} resource names of {} could not be decoded and were skipped",
            inventory.failures().len(),
            decoder.service()
        );
    }

    Ok(inventory)
}
