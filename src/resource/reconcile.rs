//! Version Reconciler
//!
//! Decides which deployed versions are stale: everything in the inventory
//! that is not the live version.

use super::inventory::Inventory;
use std::collections::BTreeSet;

/// Outcome of comparing the inventory with the live version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Live version, `None` when the routing layer could not tell
    pub live: Option<String>,
    /// Deployed versions other than the live one
    pub stale: BTreeSet<String>,
}

impl Reconciliation {
    pub fn live_known(&self) -> bool {
        self.live.is_some()
    }

    pub fn is_stale(&self, version: &str) -> bool {
        self.stale.contains(version)
    }
}

/// Compute the stale version set
pub fn reconcile(inventory: &Inventory, live: Option<&str>) -> Reconciliation {
    let mut stale = inventory.all_versions();

    match live {
        Some(live) => {
            stale.remove(live);
        }
        None => tracing::warn!(
            "Current version of {} is unknown; every deployed version is treated as not live",
            inventory.service()
        ),
    }

    Reconciliation {
        live: live.map(str::to_string),
        stale,
    }
}
