//! Dispatcher and HTTP integration tests
//!
//! Runs full invocations against in-memory collaborators and against
//! local axum servers standing in for the Slack webhook and Secret
//! Manager. Covers delivery classification, headers, secret lookup and
//! the push endpoint.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gke_notify::{
    Dispatcher, FailureKind, HttpWebhookSender, InvocationContext, MemorySecretStore,
    MemoryWebhookSender, NotificationEvent, NotifierConfig, Outcome, SecretManagerClient,
    SecretRef, SecretStore, SkipReason,
};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const WEBHOOK_URL: &str = "https://hooks.slack.com/services/T000/B000/XXXX";

fn config() -> NotifierConfig {
    NotifierConfig::new("sandbox", "slack-webhook-url", "#gke-notifications")
}

fn secrets() -> Arc<MemorySecretStore> {
    Arc::new(MemorySecretStore::new().with_secret("sandbox", "slack-webhook-url", WEBHOOK_URL))
}

fn upgrade_event() -> NotificationEvent {
    NotificationEvent::default()
        .with_attribute("cluster_name", "sandbox-gke-cluster")
        .with_attribute("cluster_location", "europe-west2")
        .with_attribute("project_id", "4325342324")
        .with_attribute(
            "type_url",
            "type.googleapis.com/google.container.v1beta1.UpgradeEvent",
        )
        .with_attribute(
            "payload",
            r#"{"resourceType":"MASTER","operationStartTime":"2022-02-17T14:21:17.624225580Z","currentVersion":"1.21.5-gke.1802","targetVersion":"1.21.6-gke.1500"}"#,
        )
        .with_data(BASE64.encode("This is a test notification"))
}

fn ctx() -> InvocationContext {
    InvocationContext::new("4111677166000558", "2022-02-17T14:21:18.801Z")
}

/// Serve `app` on an ephemeral local port
async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ─── Dispatcher with in-memory collaborators ─────────────────────

#[tokio::test]
async fn test_delivered_on_200() {
    let sender = Arc::new(MemoryWebhookSender::default());
    let dispatcher = Dispatcher::new(config(), secrets(), sender.clone());

    let outcome = dispatcher.handle(&upgrade_event(), &ctx()).await;
    assert!(matches!(outcome, Outcome::Delivered(ref r) if r.status == 200));

    let posts = sender.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].url, WEBHOOK_URL);
    assert_eq!(posts[0].message.channel, "#gke-notifications");
    assert_eq!(
        posts[0].message.field_value("Details"),
        Some("This is a test notification")
    );
}

#[tokio::test]
async fn test_non_200_is_delivery_failure() {
    for status in [201, 400, 404, 500] {
        let sender = Arc::new(MemoryWebhookSender::responding(status, "channel_not_found"));
        let dispatcher = Dispatcher::new(config(), secrets(), sender.clone());

        match dispatcher.handle(&upgrade_event(), &ctx()).await {
            Outcome::Failed { kind, detail } => {
                assert_eq!(kind, FailureKind::DeliveryFailure);
                assert!(detail.contains(&status.to_string()));
                assert!(detail.contains("channel_not_found"));
            }
            other => panic!("status {} gave {:?}", status, other),
        }
        assert_eq!(sender.posts().len(), 1);
    }
}

#[tokio::test]
async fn test_secret_failure_prevents_delivery() {
    let sender = Arc::new(MemoryWebhookSender::default());
    let dispatcher = Dispatcher::new(config(), Arc::new(MemorySecretStore::new()), sender.clone());

    let outcome = dispatcher.handle(&upgrade_event(), &ctx()).await;
    match outcome {
        Outcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::SecretUnavailable);
            assert!(detail.contains("projects/sandbox/secrets/slack-webhook-url/versions/latest"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(sender.posts().is_empty());
}

#[tokio::test]
async fn test_unrecognized_type_skipped_without_post() {
    let sender = Arc::new(MemoryWebhookSender::default());
    let dispatcher = Dispatcher::new(config(), secrets(), sender.clone());
    let event = upgrade_event().with_attribute("type_url", "UpgradeInfoEvent");

    let outcome = dispatcher.handle(&event, &ctx()).await;
    assert_eq!(
        outcome,
        Outcome::Skipped(SkipReason::UnrecognizedType("UpgradeInfoEvent".to_string()))
    );
    assert!(sender.posts().is_empty());
}

// ─── Real HTTP webhook ───────────────────────────────────────────

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(HeaderMap, Vec<u8>)>>>,
}

async fn capture(State(captured): State<Captured>, headers: HeaderMap, body: axum::body::Bytes) -> StatusCode {
    captured
        .requests
        .lock()
        .unwrap()
        .push((headers, body.to_vec()));
    StatusCode::OK
}

#[tokio::test]
async fn test_http_sender_headers_and_body() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/hook", post(capture))
        .with_state(captured.clone());
    let addr = spawn(app).await;
    let url = format!("http://{}/hook", addr);

    let secrets = Arc::new(MemorySecretStore::new().with_secret("sandbox", "slack-webhook-url", &url));
    let sender = Arc::new(HttpWebhookSender::new(reqwest::Client::new()));
    let dispatcher = Dispatcher::new(config(), secrets, sender);

    let outcome = dispatcher.handle(&upgrade_event(), &ctx()).await;
    assert!(matches!(outcome, Outcome::Delivered(_)), "got {:?}", outcome);

    let requests = captured.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (headers, body) = &requests[0];

    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["content-length"], body.len().to_string().as_str());

    let json: serde_json::Value = serde_json::from_slice(body).unwrap();
    assert_eq!(json["username"], "GKE Notifications");
    assert_eq!(json["channel"], "#gke-notifications");
    assert_eq!(json["attachments"][0]["color"], "#9733EE");
    assert_eq!(json["attachments"][0]["fields"].as_array().unwrap().len(), 9);
}

#[tokio::test]
async fn test_http_sender_error_status() {
    let app = Router::new().route(
        "/hook",
        post(|| async { (StatusCode::FORBIDDEN, "invalid_token") }),
    );
    let addr = spawn(app).await;
    let url = format!("http://{}/hook", addr);

    let secrets = Arc::new(MemorySecretStore::new().with_secret("sandbox", "slack-webhook-url", &url));
    let sender = Arc::new(HttpWebhookSender::new(reqwest::Client::new()));
    let dispatcher = Dispatcher::new(config(), secrets, sender);

    match dispatcher.handle(&upgrade_event(), &ctx()).await {
        Outcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::DeliveryFailure);
            assert_eq!(detail, "Webhook returned HTTP 403: invalid_token");
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_sender_unreachable() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/hook", addr);
    let secrets = Arc::new(MemorySecretStore::new().with_secret("sandbox", "slack-webhook-url", &url));
    let sender = Arc::new(HttpWebhookSender::new(reqwest::Client::new()));
    let dispatcher = Dispatcher::new(config(), secrets, sender);

    let outcome = dispatcher.handle(&upgrade_event(), &ctx()).await;
    assert!(matches!(
        outcome,
        Outcome::Failed { kind: FailureKind::DeliveryFailure, .. }
    ));
}

// ─── Secret Manager client ───────────────────────────────────────

async fn fake_gcp(headers: HeaderMap, uri: Uri) -> (StatusCode, String) {
    match uri.path() {
        "/computeMetadata/v1/instance/service-accounts/default/token" => {
            if headers.get("metadata-flavor").map(|v| v == "Google") != Some(true) {
                return (StatusCode::FORBIDDEN, "missing Metadata-Flavor".to_string());
            }
            (
                StatusCode::OK,
                r#"{"access_token":"test-token","expires_in":3599,"token_type":"Bearer"}"#
                    .to_string(),
            )
        }
        "/v1/projects/sandbox/secrets/slack-webhook-url/versions/latest:access" => {
            if headers.get("authorization").map(|v| v == "Bearer test-token") != Some(true) {
                return (StatusCode::UNAUTHORIZED, "bad token".to_string());
            }
            let body = serde_json::json!({
                "name": "projects/1234/secrets/slack-webhook-url/versions/7",
                "payload": {"data": BASE64.encode(WEBHOOK_URL)}
            });
            (StatusCode::OK, body.to_string())
        }
        _ => (StatusCode::NOT_FOUND, "Secret not found".to_string()),
    }
}

#[tokio::test]
async fn test_secret_manager_access() {
    let addr = spawn(Router::new().fallback(fake_gcp)).await;
    let base = format!("http://{}", addr);
    let client = SecretManagerClient::with_endpoints(reqwest::Client::new(), &base, &base);

    let value = client
        .access(&SecretRef::new("sandbox", "slack-webhook-url", "latest"))
        .await
        .unwrap();
    assert_eq!(value, WEBHOOK_URL);
}

#[tokio::test]
async fn test_secret_manager_not_found() {
    let addr = spawn(Router::new().fallback(fake_gcp)).await;
    let base = format!("http://{}", addr);
    let client = SecretManagerClient::with_endpoints(reqwest::Client::new(), &base, &base);

    let err = client
        .access(&SecretRef::new("sandbox", "other", "latest"))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("projects/sandbox/secrets/other/versions/latest"));
    assert!(message.contains("404"));
}

async fn metadata_unavailable() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "metadata service restarting")
}

#[tokio::test]
async fn test_secret_manager_metadata_error_status() {
    let api = spawn(Router::new().fallback(fake_gcp)).await;
    let metadata = spawn(Router::new().fallback(metadata_unavailable)).await;
    let client = SecretManagerClient::with_endpoints(
        reqwest::Client::new(),
        format!("http://{}", api),
        format!("http://{}", metadata),
    );

    let err = client
        .access(&SecretRef::new("sandbox", "slack-webhook-url", "latest"))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("metadata server returned 503"));
    assert!(message.contains("metadata service restarting"));
    assert_eq!(FailureKind::from(&err), FailureKind::SecretUnavailable);
}

#[tokio::test]
async fn test_secret_manager_metadata_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);

    let api = spawn(Router::new().fallback(fake_gcp)).await;
    let client = SecretManagerClient::with_endpoints(
        reqwest::Client::new(),
        format!("http://{}", api),
        format!("http://{}", closed),
    );
    let sender = Arc::new(MemoryWebhookSender::default());
    let dispatcher = Dispatcher::new(config(), Arc::new(client), sender.clone());

    match dispatcher.handle(&upgrade_event(), &ctx()).await {
        Outcome::Failed { kind, detail } => {
            assert_eq!(kind, FailureKind::SecretUnavailable);
            assert!(detail.contains("metadata server unreachable"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(sender.posts().is_empty());
}

// ─── Push endpoint ───────────────────────────────────────────────

fn push_body(event: &NotificationEvent) -> String {
    serde_json::json!({
        "message": event,
        "subscription": "projects/sandbox/subscriptions/gke-notify"
    })
    .to_string()
}

async fn post_push(app: Router, body: String) -> StatusCode {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_push_delivers_and_acks() {
    let sender = Arc::new(MemoryWebhookSender::default());
    let dispatcher = Arc::new(Dispatcher::new(config(), secrets(), sender.clone()));

    let status = post_push(gke_notify::server::router(dispatcher), push_body(&upgrade_event())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(sender.posts().len(), 1);
}

#[tokio::test]
async fn test_push_failure_acked_by_default() {
    let sender = Arc::new(MemoryWebhookSender::responding(500, "oops"));
    let dispatcher = Arc::new(Dispatcher::new(config(), secrets(), sender));

    let status = post_push(gke_notify::server::router(dispatcher), push_body(&upgrade_event())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_push_failure_redelivered_when_enabled() {
    let mut config = config();
    config.redeliver_on_failure = true;
    let sender = Arc::new(MemoryWebhookSender::responding(500, "oops"));
    let dispatcher = Arc::new(Dispatcher::new(config, secrets(), sender));

    let status = post_push(gke_notify::server::router(dispatcher), push_body(&upgrade_event())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_push_invalid_envelope() {
    let sender = Arc::new(MemoryWebhookSender::default());
    let dispatcher = Arc::new(Dispatcher::new(config(), secrets(), sender.clone()));

    let status = post_push(gke_notify::server::router(dispatcher), "{\"nope\": 1}".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(sender.posts().is_empty());
}

#[tokio::test]
async fn test_healthz() {
    let dispatcher = Arc::new(Dispatcher::new(
        config(),
        secrets(),
        Arc::new(MemoryWebhookSender::default()),
    ));
    let request = axum::http::Request::builder()
        .uri("/healthz")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = gke_notify::server::router(dispatcher)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}
