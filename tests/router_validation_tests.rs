use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

fn test_app() -> Router {
    let cfg = netprobe::config::Config::default();
    let state = netprobe::router::ProbeState::new(cfg).expect("state should build");
    netprobe::router::probe_router(state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let json: Value = serde_json::from_slice(&body).expect("response body was not JSON");
    (status, json)
}

#[tokio::test]
async fn root_reports_service_identity() {
    let (status, body) = get(test_app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "netprobe");
    assert_eq!(body["auth_mode"], "Entra ID Managed Identity");
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn healthcheck_reports_unhealthy_database_with_200() {
    // No database is configured in tests; the probe must degrade to an
    // unhealthy marker in the body, never an error status.
    let (status, body) = get(test_app(), "/api/healthcheck").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "unhealthy");
    assert!(body["timestamp"].as_f64().is_some());
}

#[tokio::test]
async fn sql_probes_report_inline_errors_with_200() {
    let (status, body) = get(test_app(), "/api/sqlversion").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "Unable to retrieve SQL version");

    let (status, body) = get(test_app(), "/api/sqlsrcip").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], "Unable to retrieve source IP");
}

#[tokio::test]
async fn pi_returns_requested_digits() {
    let (status, body) = get(test_app(), "/api/pi?digits=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["digits"], 5);
    assert_eq!(body["pi"], "3.14159");
    assert!(body["computation_time"].as_str().is_some());
}

#[tokio::test]
async fn pi_defaults_to_one_thousand_digits() {
    let (status, body) = get(test_app(), "/api/pi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["digits"], 1000);
    let rendered = body["pi"].as_str().expect("pi should be a string");
    assert!(rendered.starts_with("3.14159265358979"));
    assert_eq!(rendered.len(), 1002);
}

#[tokio::test]
async fn pi_rejects_out_of_range_digits() {
    let (status, body) = get(test_app(), "/api/pi?digits=10001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = get(test_app(), "/api/pi?digits=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dns_rejects_oversized_hostnames() {
    let long = "a".repeat(254);
    let (status, body) = get(test_app(), &format!("/api/dns/{long}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn dns_rejects_blocked_hostnames() {
    let (status, body) = get(test_app(), "/api/dns/localhost").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("blocked"));
}

#[tokio::test]
async fn reversedns_rejects_invalid_ip() {
    let (status, body) = get(test_app(), "/api/reversedns/not-an-ip").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("IPv4 or IPv6"));
}

#[tokio::test]
async fn reversedns_rejects_private_ip() {
    let (status, _) = get(test_app(), "/api/reversedns/192.168.1.1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn curl_rejects_loopback_target() {
    let (status, body) = get(test_app(), "/api/curl?url=http://127.0.0.1/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn curl_rejects_non_http_schemes() {
    let (status, _) = get(test_app(), "/api/curl?url=ftp://example.com/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(test_app(), "/api/curl?url=file:///etc/passwd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn curl_rejects_metadata_endpoint_without_marker_match() {
    // 169.254.169.254 carries no deny-list marker; only the structured
    // range check stops it.
    let (status, body) = get(test_app(), "/api/curl?url=http://169.254.169.254/latest/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"]["message"].as_str().unwrap_or_default();
    assert!(message.contains("private or reserved"));
}

#[tokio::test]
async fn curl_requires_url_parameter() {
    let resp = test_app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/curl")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let resp = test_app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/printenv")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
