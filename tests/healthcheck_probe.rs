//! Integration tests for the HTTP healthcheck probe using wiremock

use gcp_deploy::healthcheck::{evaluate, HealthProbe, HttpProbe, ProbeTarget};
use gcp_deploy::DeployError;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn target(server: &MockServer, name: &str) -> ProbeTarget {
    let address = server.address();
    ProbeTarget {
        name: name.to_string(),
        ip: address.ip().to_string(),
        port: address.port(),
    }
}

#[tokio::test]
async fn test_all_targets_healthy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/healthcheck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(2)
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();
    let targets = vec![
        target(&server, "trading-api-srv01-1-0-0"),
        target(&server, "trading-api-srv02-1-0-0"),
    ];

    let results = probe.probe(&targets, "/healthcheck").await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.passed()));
    assert_eq!(results[0].body["status"], "ok");
    tokio_test::assert_ok!(evaluate(&results));
}

#[tokio::test]
async fn test_non_200_fails_the_check() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/healthcheck"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_secs(2)).unwrap();
    let results = probe
        .probe(&[target(&server, "trading-api-srv01-1-0-0")], "/healthcheck")
        .await;

    assert_eq!(results[0].status_code, Some(503));
    assert_eq!(results[0].body, json!("warming up"));

    let err = evaluate(&results).unwrap_err();
    assert!(matches!(err, DeployError::HealthcheckFailed { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_slow_target_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/healthcheck"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_millis(100)).unwrap();
    let results = probe
        .probe(&[target(&server, "trading-api-srv01-1-0-0")], "healthcheck")
        .await;

    assert_eq!(results[0].status_code, None);
    assert!(results[0].error.is_some());
    assert!(!results[0].passed());
    assert!(evaluate(&results).is_err());
}
