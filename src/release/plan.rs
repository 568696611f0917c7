//! Release Plan
//!
//! Request bodies for every resource of a release stack. All functions are pure:
//! the same release and metadata always produce the same bodies.

use super::Release;
use crate::metadata::{Metadata, ServiceInstance};
use crate::resource::ResourceKind;
use serde_json::{json, Value};

/// Base of absolute self-links used to cross-reference resources
pub const SELF_LINK_BASE: &str = "https://www.googleapis.com/compute/v1";

fn project_link(metadata: &Metadata, path: &str) -> String {
    format!("{}/projects/{}/{}", SELF_LINK_BASE, metadata.project(), path)
}

fn global_link(metadata: &Metadata, collection: &str, name: &str) -> String {
    project_link(metadata, &format!("global/{}/{}", collection, name))
}

fn regional_link(metadata: &Metadata, collection: &str, name: &str) -> String {
    project_link(
        metadata,
        &format!("regions/{}/{}/{}", metadata.region(), collection, name),
    )
}

pub fn image_link(metadata: &Metadata, image: &str) -> String {
    global_link(metadata, "images", image)
}

pub fn instance_template_link(metadata: &Metadata, template: &str) -> String {
    global_link(metadata, "instanceTemplates", template)
}

pub fn instance_group_link(metadata: &Metadata, group: &str) -> String {
    regional_link(metadata, "instanceGroups", group)
}

pub fn instance_group_manager_link(metadata: &Metadata, group: &str) -> String {
    regional_link(metadata, "instanceGroupManagers", group)
}

pub fn backend_service_link(metadata: &Metadata, backend: &str) -> String {
    regional_link(metadata, "backendServices", backend)
}

pub fn health_check_link(metadata: &Metadata, health_check: &str) -> String {
    regional_link(metadata, "healthChecks", health_check)
}

/// Boot and data images cut from the golden source disks
pub fn disk_images(release: &Release, metadata: &Metadata) -> Vec<Value> {
    [
        (&release.boot_image_name, &metadata.gce_instance.source_boot_disk, "boot"),
        (&release.data_image_name, &metadata.gce_instance.source_data_disk, "data"),
    ]
    .into_iter()
    .map(|(name, source, role)| {
        json!({
            "name": name,
            "description": format!("{} disk of {} version {}", role, release.service, release.version),
            "sourceDisk": source,
            "storageLocations": [metadata.region()],
        })
    })
    .collect()
}

fn attached_disk(metadata: &Metadata, image: &str, boot: bool, index: u32, size_gb: u32) -> Value {
    json!({
        "autoDelete": true,
        "boot": boot,
        "deviceName": image,
        "index": index,
        "initializeParams": {
            "diskSizeGb": size_gb.to_string(),
            "diskType": metadata.gce_instance.disk_type,
            "sourceImage": image_link(metadata, image),
        },
        "kind": "compute#attachedDisk",
        "mode": "READ_WRITE",
        "type": "PERSISTENT",
    })
}

pub fn instance_template(release: &Release, metadata: &Metadata) -> Value {
    let instance = &metadata.gce_instance;

    json!({
        "description": format!(
            "Instance Template of service {} version {}",
            release.service, release.version
        ),
        "kind": "compute#instanceTemplate",
        "name": release.instance_template_name,
        "properties": {
            "canIpForward": false,
            "disks": [
                attached_disk(metadata, &release.boot_image_name, true, 0, instance.boot_disk_size_gb),
                attached_disk(metadata, &release.data_image_name, false, 1, instance.data_disk_size_gb),
            ],
            "machineType": instance.machine_type,
            "metadata": {
                "items": [{
                    "key": instance.startup_script_key,
                    "value": format!("{} {}", instance.startup_script, release.service),
                }],
                "kind": "compute#metadata",
            },
            "networkInterfaces": [{
                "kind": "compute#networkInterface",
                "name": "nic0",
                "network": metadata.gcp_project.network,
                "subnetwork": metadata.gcp_project.subnetwork,
            }],
            "reservationAffinity": {
                "consumeReservationType": "ANY_RESERVATION",
            },
            "scheduling": {
                "automaticRestart": true,
                "onHostMaintenance": "MIGRATE",
                "preemptible": false,
                "provisioningModel": "STANDARD",
            },
            "serviceAccounts": [{
                "email": metadata.gcp_project.service_account,
                "scopes": ["https://www.googleapis.com/auth/cloud-platform"],
            }],
            "shieldedInstanceConfig": {
                "enableIntegrityMonitoring": true,
                "enableSecureBoot": false,
                "enableVtpm": true,
            },
            "tags": {
                "items": instance.tags,
            },
        },
    })
}

pub fn instance_group_manager(release: &Release, metadata: &Metadata) -> Value {
    let group = &metadata.gce_instance_group;

    json!({
        "kind": "compute#instanceGroupManager",
        "name": release.instance_group_name,
        "autoHealingPolicies": [{
            "healthCheck": group.auto_healing.health_check,
            "initialDelaySec": group.auto_healing.initial_delay_sec,
        }],
        "baseInstanceName": release.base_instance_name,
        "distributionPolicy": {
            "targetShape": group.distribution_policy.target_shape,
            "zones": group.distribution_policy.zones,
        },
        "instanceGroup": instance_group_link(metadata, &release.instance_group_name),
        "instanceTemplate": instance_template_link(metadata, &release.instance_template_name),
        "listManagedInstancesResults": "PAGELESS",
        "targetSize": group.target_size,
        "updatePolicy": {
            "instanceRedistributionType": "PROACTIVE",
            "maxSurge": { "fixed": 3 },
            "maxUnavailable": { "fixed": 3 },
            "minimalAction": "REPLACE",
            "replacementMethod": "SUBSTITUTE",
            "type": "OPPORTUNISTIC",
        },
    })
}

pub fn autoscaler(release: &Release, metadata: &Metadata) -> Value {
    let scaling = &metadata.gce_instance_group.scaling;

    json!({
        "name": release.autoscaler_name,
        "target": instance_group_manager_link(metadata, &release.instance_group_name),
        "autoscalingPolicy": {
            "coolDownPeriodSec": scaling.cool_down_period_sec,
            "cpuUtilization": {
                "utilizationTarget": scaling.cpu_utilization_target,
            },
            "customMetricUtilizations": scaling.custom_metric_utilizations,
            "maxNumReplicas": scaling.max_num_replicas,
            "minNumReplicas": scaling.min_num_replicas,
            "mode": scaling.mode,
        },
    })
}

/// One regional backend service per service instance, all backed by the release group
pub fn backend_services(release: &Release, metadata: &Metadata) -> Vec<Value> {
    let lb = &metadata.load_balancer;

    release
        .instances
        .iter()
        .map(|instance| {
            json!({
                "kind": "compute#backendService",
                "name": release.instance_resource_name(ResourceKind::BackendService, &instance.name),
                "description": format!(
                    "Backend of {} instance {} version {}",
                    release.service, instance.name, release.version
                ),
                "loadBalancingScheme": lb.load_balancing_scheme,
                "protocol": lb.protocol,
                "sessionAffinity": lb.session_affinity,
                "timeoutSec": lb.timeout_sec,
                "backends": [{
                    "balancingMode": lb.balancing_mode,
                    "group": instance_group_link(metadata, &release.instance_group_name),
                }],
                "connectionDraining": {
                    "drainingTimeoutSec": lb.draining_timeout_sec,
                },
                "healthChecks": [health_check_link(metadata, &instance.healthcheck)],
            })
        })
        .collect()
}

/// One internal address per service instance
pub fn addresses(release: &Release, metadata: &Metadata) -> Vec<Value> {
    release
        .instances
        .iter()
        .map(|instance| {
            json!({
                "name": release.instance_resource_name(ResourceKind::Address, &instance.name),
                "subnetwork": metadata.gcp_project.subnetwork,
                "addressType": metadata.load_balancer.load_balancing_scheme,
            })
        })
        .collect()
}

/// Forwarding rule of one service instance, bound to an already reserved address
pub fn forwarding_rule(
    release: &Release,
    metadata: &Metadata,
    instance: &ServiceInstance,
    ip_address: &str,
) -> Value {
    let ports: Vec<String> = instance.ports().iter().map(u16::to_string).collect();
    let backend = release.instance_resource_name(ResourceKind::BackendService, &instance.name);

    json!({
        "kind": "compute#forwardingRule",
        "name": release.instance_resource_name(ResourceKind::ForwardingRule, &instance.name),
        "IPAddress": ip_address,
        "IPProtocol": "TCP",
        "backendService": backend_service_link(metadata, &backend),
        "description": format!(
            "Forwarding rule of {} instance {} version {}",
            release.service, instance.name, release.version
        ),
        "loadBalancingScheme": metadata.load_balancer.load_balancing_scheme,
        "network": metadata.gcp_project.network,
        "networkTier": "PREMIUM",
        "ports": ports,
        "subnetwork": metadata.gcp_project.subnetwork,
    })
}
