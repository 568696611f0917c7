//! Integration tests for operation and stabilization waits
//!
//! Operation polling runs against wiremock with a short poll interval. The
//! stabilization budget runs on a paused clock against an in-memory provider.

use async_trait::async_trait;
use gcp_deploy::gcp::auth::StaticToken;
use gcp_deploy::gcp::client::GcpClient;
use gcp_deploy::gcp::compute::ComputeApi;
use gcp_deploy::gcp::operation::{Operation, OperationWaiter, WaitSettings};
use gcp_deploy::resource::ResourceKind;
use gcp_deploy::{DeployError, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OPERATION_PATH: &str = "/compute/v1/projects/trading-prod/global/operations/operation-1";

fn client(server: &MockServer) -> GcpClient {
    GcpClient::new(Arc::new(StaticToken("test-token".into())), "trading-prod", "asia-southeast1")
        .unwrap()
        .with_endpoints(
            &format!("{}/compute/v1", server.uri()),
            &format!("{}/container/v1", server.uri()),
        )
        .unwrap()
}

fn fast() -> WaitSettings {
    WaitSettings {
        poll_interval: Duration::from_millis(10),
        ..WaitSettings::default()
    }
}

mod operations {
    use super::*;

    /// RUNNING, RUNNING, then DONE with an embedded error: exactly three polls
    /// and a fatal error carrying the provider's code and message
    #[tokio::test]
    async fn test_done_with_error_after_two_running_polls() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OPERATION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-1",
                "status": "RUNNING"
            })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(OPERATION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "operation-1",
                "status": "DONE",
                "httpErrorStatusCode": 400,
                "httpErrorMessage": "BAD REQUEST",
                "error": {"errors": [{"code": "RESOURCE_NOT_READY", "message": "disk is attached"}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let waiter = OperationWaiter::new(&client, fast());
        let err = waiter
            .wait(&Operation::global("operation-1"), "Creating disk image: img")
            .await
            .unwrap_err();

        match &err {
            DeployError::OperationFailed {
                operation,
                code,
                message,
                errors,
            } => {
                assert_eq!(operation, "operation-1");
                assert_eq!(code, "400");
                assert_eq!(message, "BAD REQUEST");
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("RESOURCE_NOT_READY"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("400 BAD REQUEST: "));
        assert_eq!(err.exit_code(), 3);
    }

    /// A DONE operation without error completes on the first poll
    #[tokio::test]
    async fn test_done_without_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OPERATION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "DONE"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        OperationWaiter::new(&client, fast())
            .wait(&Operation::global("operation-1"), "Creating instance template: t")
            .await
            .unwrap();
    }

    /// A failing status poll is a provider error, not a retry
    #[tokio::test]
    async fn test_status_poll_error_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OPERATION_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Required 'compute.globalOperations.get' permission"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = OperationWaiter::new(&client, fast())
            .wait(&Operation::global("operation-1"), "Deleting disk image: img")
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Api { status: 403, .. }));
    }

    /// With a deadline set, an operation stuck in RUNNING times out
    #[tokio::test]
    async fn test_optional_operation_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OPERATION_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "RUNNING"})))
            .mount(&server)
            .await;

        let client = client(&server);
        let settings = WaitSettings {
            operation_timeout: Some(Duration::from_millis(50)),
            ..fast()
        };
        let err = OperationWaiter::new(&client, settings)
            .wait(&Operation::global("operation-1"), "Creating autoscaler: a")
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::OperationTimeout { .. }));
    }
}

/// Provider whose instance group never reports stable
#[derive(Default)]
struct UnstableGroup {
    polls: AtomicUsize,
    stable_after: Option<usize>,
}

#[async_trait]
impl ComputeApi for UnstableGroup {
    async fn list(&self, _kind: ResourceKind) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn get(&self, _kind: ResourceKind, name: &str) -> Result<Value> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        let stable = self.stable_after.is_some_and(|n| poll >= n);
        Ok(json!({"name": name, "status": {"isStable": stable}}))
    }

    async fn insert(&self, _kind: ResourceKind, _body: &Value) -> Result<Operation> {
        Ok(Operation::global("unused"))
    }

    async fn delete(&self, _kind: ResourceKind, _name: &str) -> Result<Operation> {
        Ok(Operation::global("unused"))
    }

    async fn resize_group(&self, _group: &str, _size: u32) -> Result<Operation> {
        Ok(Operation::global("unused"))
    }

    async fn get_operation(&self, _operation: &Operation) -> Result<Value> {
        Ok(json!({"status": "DONE"}))
    }
}

mod stabilization {
    use super::*;
    use tokio::time::Instant;

    fn budget() -> WaitSettings {
        WaitSettings {
            poll_interval: Duration::from_secs(5),
            stabilization_timeout: Duration::from_secs(20),
            operation_timeout: None,
        }
    }

    /// A 20s budget with 5s polls checks the group four times and sleeps three times
    #[tokio::test(start_paused = true)]
    async fn test_never_stable_group_times_out_after_four_polls() {
        let provider = UnstableGroup::default();
        let waiter = OperationWaiter::new(&provider, budget());

        let started = Instant::now();
        let err = waiter.wait_until_stable("trading-api-1-0-0").await.unwrap_err();

        assert_eq!(provider.polls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
        match err {
            DeployError::StabilizationTimeout { group, budget } => {
                assert_eq!(group, "trading-api-1-0-0");
                assert_eq!(budget, Duration::from_secs(20));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// A group that turns stable on the second poll returns after one sleep
    #[tokio::test(start_paused = true)]
    async fn test_group_stable_on_second_poll() {
        let provider = UnstableGroup {
            stable_after: Some(2),
            ..Default::default()
        };
        let waiter = OperationWaiter::new(&provider, budget());

        let started = Instant::now();
        tokio_test::assert_ok!(waiter.wait_until_stable("trading-api-1-0-0").await);

        assert_eq!(provider.polls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_poll_budget() {
        assert_eq!(budget().stabilization_polls(), 4);
        assert_eq!(WaitSettings::default().stabilization_polls(), 180);
    }
}
