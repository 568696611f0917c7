//! Integration tests for the Compute Engine client using wiremock
//!
//! These tests verify URL construction, pagination, operation handles and
//! error extraction against mocked endpoints.

use gcp_deploy::gcp::auth::StaticToken;
use gcp_deploy::gcp::client::GcpClient;
use gcp_deploy::gcp::compute::ComputeApi;
use gcp_deploy::gcp::operation::{Operation, OperationScope};
use gcp_deploy::resource::ResourceKind;
use gcp_deploy::DeployError;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{bearer_token, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROJECT: &str = "trading-prod";
const REGION: &str = "asia-southeast1";

fn client(server: &MockServer) -> GcpClient {
    GcpClient::new(Arc::new(StaticToken("test-token".into())), PROJECT, REGION)
        .unwrap()
        .with_endpoints(
            &format!("{}/compute/v1", server.uri()),
            &format!("{}/container/v1", server.uri()),
        )
        .unwrap()
}

fn regional(collection: &str) -> String {
    format!("/compute/v1/projects/{}/regions/{}/{}", PROJECT, REGION, collection)
}

fn global(collection: &str) -> String {
    format!("/compute/v1/projects/{}/global/{}", PROJECT, collection)
}

mod listing {
    use super::*;

    /// Test that listing follows nextPageToken until the last page
    #[tokio::test]
    async fn test_list_follows_pagination() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(regional("forwardingRules")))
            .and(query_param("pageToken", "page-2"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "trading-api-srv02-1-0-0"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(regional("forwardingRules")))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "trading-api-srv01-1-0-0"}],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server)
            .list(ResourceKind::ForwardingRule)
            .await
            .unwrap();

        let names: Vec<&str> = items.iter().filter_map(|i| i["name"].as_str()).collect();
        assert_eq!(names, vec!["trading-api-srv01-1-0-0", "trading-api-srv02-1-0-0"]);
    }

    /// Test that an empty collection lists no items
    #[tokio::test]
    async fn test_list_empty_collection() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(global("images")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "compute#imageList"})))
            .mount(&server)
            .await;

        let items = client(&server).list(ResourceKind::Image).await.unwrap();
        assert!(items.is_empty());
    }
}

mod mutations {
    use super::*;

    /// Test that image creation is forced and returns a global operation
    #[tokio::test]
    async fn test_insert_image_uses_force_create() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(global("images")))
            .and(query_param("forceCreate", "true"))
            .and(body_partial_json(json!({"name": "trading-api-1-0-0-boot-img"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-img-1",
                "status": "RUNNING"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let operation = client(&server)
            .insert(
                ResourceKind::Image,
                &json!({"name": "trading-api-1-0-0-boot-img"}),
            )
            .await
            .unwrap();

        assert_eq!(operation, Operation::global("operation-img-1"));
    }

    /// Test that regional mutations return a regional operation
    #[tokio::test]
    async fn test_delete_backend_service_returns_regional_operation() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("{}/trading-api-srv01-1-0-0", regional("backendServices"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-del-1",
                "region": format!("https://www.googleapis.com/compute/v1/projects/{}/regions/{}", PROJECT, REGION)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let operation =
            ComputeApi::delete(&client(&server), ResourceKind::BackendService, "trading-api-srv01-1-0-0")
                .await
                .unwrap();

        assert_eq!(operation.scope, OperationScope::Region(REGION.into()));
    }

    /// Test that resizing posts to the group's resize endpoint
    #[tokio::test]
    async fn test_resize_group() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(format!("{}/trading-api-1-0-0/resize", regional("instanceGroupManagers"))))
            .and(query_param("size", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "operation-resize"})))
            .expect(1)
            .mount(&server)
            .await;

        let operation = client(&server)
            .resize_group("trading-api-1-0-0", 0)
            .await
            .unwrap();

        assert_eq!(operation, Operation::regional("operation-resize", REGION));
    }

    /// Test that zonal operations are polled on the zone collection
    #[tokio::test]
    async fn test_get_zonal_operation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!(
                "/compute/v1/projects/{}/zones/asia-southeast1-b/operations/operation-z",
                PROJECT
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "DONE"})))
            .expect(1)
            .mount(&server)
            .await;

        let operation = Operation {
            name: "operation-z".into(),
            scope: OperationScope::Zone("asia-southeast1-b".into()),
        };
        let response = client(&server).get_operation(&operation).await.unwrap();
        assert_eq!(response["status"], "DONE");
    }
}

mod errors {
    use super::*;

    /// Test that structured provider errors are kept on the error
    #[tokio::test]
    async fn test_api_error_keeps_structured_detail() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(regional("autoscalers")))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {
                    "code": 409,
                    "message": "The resource 'trading-api-1-0-0' already exists",
                    "errors": [{
                        "reason": "alreadyExists",
                        "message": "The resource 'trading-api-1-0-0' already exists"
                    }]
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .insert(ResourceKind::Autoscaler, &json!({"name": "trading-api-1-0-0"}))
            .await
            .unwrap_err();

        match &err {
            DeployError::Api {
                status,
                message,
                details,
            } => {
                assert_eq!(*status, 409);
                assert!(message.contains("already exists"));
                assert_eq!(details.len(), 1);
                assert!(details[0].starts_with("alreadyExists: "));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), 3);
    }

    /// Test that a non-JSON error body is surfaced as-is
    #[tokio::test]
    async fn test_api_error_with_raw_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("{}/missing", regional("addresses"))))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = ComputeApi::get(&client(&server), ResourceKind::Address, "missing")
            .await
            .unwrap_err();

        match err {
            DeployError::Api { status, message, details } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream unavailable");
                assert!(details.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Test that a mutation response without an operation name is rejected
    #[tokio::test]
    async fn test_mutation_without_operation_name() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(global("instanceTemplates")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "RUNNING"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .insert(ResourceKind::InstanceTemplate, &json!({"name": "t"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::MalformedResponse { .. }));
    }
}
