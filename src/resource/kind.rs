//! Resource kinds managed by a release stack

use serde::Serialize;
use std::fmt;

/// Where a resource lives in the Compute Engine API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Global,
    Regional,
}

/// The fixed set of resource kinds that make up a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ResourceKind {
    #[serde(rename = "images")]
    Image,
    #[serde(rename = "instanceTemplates")]
    InstanceTemplate,
    #[serde(rename = "regionInstanceGroupManagers")]
    InstanceGroupManager,
    #[serde(rename = "autoscalers")]
    Autoscaler,
    #[serde(rename = "regionBackendServices")]
    BackendService,
    #[serde(rename = "forwardingRules")]
    ForwardingRule,
    #[serde(rename = "addresses")]
    Address,
}

impl ResourceKind {
    /// Creation order
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Image,
        ResourceKind::InstanceTemplate,
        ResourceKind::InstanceGroupManager,
        ResourceKind::Autoscaler,
        ResourceKind::BackendService,
        ResourceKind::Address,
        ResourceKind::ForwardingRule,
    ];

    /// Deletion order, most dependent first
    pub const DELETE_ORDER: [ResourceKind; 7] = [
        ResourceKind::ForwardingRule,
        ResourceKind::Address,
        ResourceKind::BackendService,
        ResourceKind::Autoscaler,
        ResourceKind::InstanceGroupManager,
        ResourceKind::InstanceTemplate,
        ResourceKind::Image,
    ];

    pub fn location(self) -> Location {
        match self {
            ResourceKind::Image | ResourceKind::InstanceTemplate => Location::Global,
            _ => Location::Regional,
        }
    }

    /// REST collection name
    pub fn collection(self) -> &'static str {
        match self {
            ResourceKind::Image => "images",
            ResourceKind::InstanceTemplate => "instanceTemplates",
            ResourceKind::InstanceGroupManager => "instanceGroupManagers",
            ResourceKind::Autoscaler => "autoscalers",
            ResourceKind::BackendService => "backendServices",
            ResourceKind::ForwardingRule => "forwardingRules",
            ResourceKind::Address => "addresses",
        }
    }

    /// Key used in inventory reports
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Image => "images",
            ResourceKind::InstanceTemplate => "instanceTemplates",
            ResourceKind::InstanceGroupManager => "regionInstanceGroupManagers",
            ResourceKind::Autoscaler => "autoscalers",
            ResourceKind::BackendService => "regionBackendServices",
            ResourceKind::ForwardingRule => "forwardingRules",
            ResourceKind::Address => "addresses",
        }
    }

    /// Human readable name for log lines
    pub fn display_name(self) -> &'static str {
        match self {
            ResourceKind::Image => "disk image",
            ResourceKind::InstanceTemplate => "instance template",
            ResourceKind::InstanceGroupManager => "regional managed instance group",
            ResourceKind::Autoscaler => "regional autoscaler",
            ResourceKind::BackendService => "backend service",
            ResourceKind::ForwardingRule => "forwarding rule",
            ResourceKind::Address => "ip address",
        }
    }

    /// Whether names of this kind carry a service instance token
    pub fn is_per_instance(self) -> bool {
        matches!(
            self,
            ResourceKind::BackendService | ResourceKind::ForwardingRule | ResourceKind::Address
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
