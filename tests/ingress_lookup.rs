//! Integration tests for the live version lookup using wiremock
//!
//! One mock server plays both the GKE API and the cluster's Kubernetes API:
//! the cluster record points its endpoint back at the mock server.

use gcp_deploy::gcp::auth::StaticToken;
use gcp_deploy::gcp::client::GcpClient;
use gcp_deploy::ingress::{GkeIngress, LiveVersionSource};
use gcp_deploy::metadata::GkeCluster;
use gcp_deploy::DeployError;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLUSTER_PATH: &str = "/container/v1/projects/trading-prod/locations/asia-southeast1/clusters/edge";
const INGRESS_PATH: &str = "/apis/networking.k8s.io/v1/namespaces/ingress/ingresses";

fn lookup(server: &MockServer) -> GkeIngress {
    let client = GcpClient::new(Arc::new(StaticToken("test-token".into())), "trading-prod", "asia-southeast1")
        .unwrap()
        .with_endpoints(
            &format!("{}/compute/v1", server.uri()),
            &format!("{}/container/v1", server.uri()),
        )
        .unwrap();

    GkeIngress::new(
        client,
        GkeCluster {
            name: "edge".into(),
            namespace: "ingress".into(),
            location: "asia-southeast1".into(),
        },
    )
}

async fn mount_cluster(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(CLUSTER_PATH))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "edge",
            "endpoint": server.uri(),
        })))
        .mount(server)
        .await;
}

async fn mount_ingresses(server: &MockServer, items: Value) {
    Mock::given(method("GET"))
        .and(path(INGRESS_PATH))
        .and(query_param("timeoutSeconds", "15"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "IngressList",
            "items": items,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_version_label_of_service_ingress() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_ingresses(
        &server,
        json!([
            {"metadata": {"name": "trading-api-public", "labels": {"version": "1.2.0"}}},
            {"metadata": {"name": "billing", "labels": {"version": "7.0.0"}}}
        ]),
    )
    .await;

    let version = lookup(&server).current_version("trading-api").await.unwrap();
    assert_eq!(version.as_deref(), Some("1-2-0"));
}

#[tokio::test]
async fn test_no_matching_ingress_is_unknown() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_ingresses(
        &server,
        json!([{"metadata": {"name": "billing", "labels": {"version": "7.0.0"}}}]),
    )
    .await;

    let version = lookup(&server).current_version("trading-api").await.unwrap();
    assert_eq!(version, None);
}

#[tokio::test]
async fn test_conflicting_versions_are_unknown() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;
    mount_ingresses(
        &server,
        json!([
            {"metadata": {"name": "trading-api-public", "labels": {"version": "1.2.0"}}},
            {"metadata": {"name": "trading-api-internal", "labels": {"version": "1.1.0"}}}
        ]),
    )
    .await;

    let version = lookup(&server).current_version("trading-api").await.unwrap();
    assert_eq!(version, None);
}

#[tokio::test]
async fn test_cluster_lookup_failure_exits_2() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CLUSTER_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Not found: cluster edge"}
        })))
        .mount(&server)
        .await;

    let err = lookup(&server).current_version("trading-api").await.unwrap_err();
    assert!(matches!(err, DeployError::Ingress(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_kubernetes_api_failure_exits_2() {
    let server = MockServer::start().await;
    mount_cluster(&server).await;

    Mock::given(method("GET"))
        .and(path(INGRESS_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = lookup(&server).current_version("trading-api").await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("403"));
}
