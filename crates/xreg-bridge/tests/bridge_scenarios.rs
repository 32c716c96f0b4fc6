//! End-to-end exercises of the Bridge startup handshake and composite
//! routes against stubbed adapters, covering spec §8 scenarios S1 and S6.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use xreg_bridge::{AdapterDescriptor, BridgeConfig, BridgeError};

fn model_body(group_type: &str) -> String {
    format!(
        r#"{{"groups":{{"{group_type}":{{"plural":"{group_type}","singular":"pkg","resources":{{"packages":{{"plural":"packages"}}}}}}}}}}"#
    )
}

const CAPABILITIES_BODY: &str = r#"{
    "pagination": true,
    "filtering": true,
    "sort": true,
    "inline": true,
    "specversions": ["1.0-rc2"],
    "apis": ["/", "/model", "/capabilities"]
}"#;

fn descriptor(url: String) -> AdapterDescriptor {
    AdapterDescriptor {
        url,
        api_key: None,
        timeout_ms: 2_000,
        health_path: "/health".to_string(),
    }
}

#[tokio::test]
async fn s1_merged_registry_root() {
    let mut node = mockito::Server::new_async().await;
    let _node_model = node.mock("GET", "/model").with_status(200).with_body(model_body("noderegistries")).create_async().await;
    let _node_caps = node.mock("GET", "/capabilities").with_status(200).with_body(CAPABILITIES_BODY).create_async().await;

    let mut python = mockito::Server::new_async().await;
    let _py_model = python.mock("GET", "/model").with_status(200).with_body(model_body("pythonregistries")).create_async().await;
    let _py_caps = python.mock("GET", "/capabilities").with_status(200).with_body(CAPABILITIES_BODY).create_async().await;

    let config = BridgeConfig {
        adapters: vec![descriptor(node.url()), descriptor(python.url())],
        ..Default::default()
    };

    let state = xreg_bridge::bootstrap(config).await.unwrap();
    let app = xreg_bridge::router(state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert!(body["noderegistriesurl"].is_string());
    assert_eq!(body["noderegistriescount"], 1);
    assert!(body["pythonregistriesurl"].is_string());
    assert_eq!(body["pythonregistriescount"], 1);
    assert_eq!(body["specversion"], "1.0-rc2");

    let url_fields: Vec<&String> = body
        .as_object()
        .unwrap()
        .keys()
        .filter(|k| k.ends_with("url"))
        .collect();
    assert_eq!(url_fields.len(), 2, "expected exactly two <grouptype>url fields, got {url_fields:?}");
}

#[tokio::test]
async fn s6_duplicate_group_type_at_startup_is_rejected() {
    let mut node_a = mockito::Server::new_async().await;
    let _a_model = node_a.mock("GET", "/model").with_status(200).with_body(model_body("noderegistries")).create_async().await;
    let _a_caps = node_a.mock("GET", "/capabilities").with_status(200).with_body(CAPABILITIES_BODY).create_async().await;

    let mut node_b = mockito::Server::new_async().await;
    let _b_model = node_b.mock("GET", "/model").with_status(200).with_body(model_body("noderegistries")).create_async().await;
    let _b_caps = node_b.mock("GET", "/capabilities").with_status(200).with_body(CAPABILITIES_BODY).create_async().await;

    let config = BridgeConfig {
        adapters: vec![descriptor(node_a.url()), descriptor(node_b.url())],
        ..Default::default()
    };

    let err = xreg_bridge::bootstrap(config).await.unwrap_err();
    assert!(matches!(err, BridgeError::DuplicateGroupType { .. }));
}

#[tokio::test]
async fn unreachable_adapter_fails_handshake_with_service_unavailable() {
    let config = BridgeConfig {
        adapters: vec![descriptor("http://127.0.0.1:1".to_string())],
        ..Default::default()
    };
    let err = xreg_bridge::bootstrap(config).await.unwrap_err();
    assert!(matches!(err, BridgeError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn unknown_group_type_is_not_found() {
    let mut node = mockito::Server::new_async().await;
    let _model = node.mock("GET", "/model").with_status(200).with_body(model_body("noderegistries")).create_async().await;
    let _caps = node.mock("GET", "/capabilities").with_status(200).with_body(CAPABILITIES_BODY).create_async().await;

    let config = BridgeConfig {
        adapters: vec![descriptor(node.url())],
        ..Default::default()
    };
    let state = xreg_bridge::bootstrap(config).await.unwrap();
    let app = xreg_bridge::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/pythonregistries/pypi.org/packages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
