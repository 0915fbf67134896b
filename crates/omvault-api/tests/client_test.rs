#![allow(clippy::unwrap_used)]
// Integration tests for `OmvClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use omvault_api::cookies::{self, StoredCookie};
use omvault_api::{ErrorKind, OmvClient};

// ── Helpers ─────────────────────────────────────────────────────────

fn login_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error": null,
        "response": { "authenticated": true }
    }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error": { "code": code, "message": message },
        "response": null
    }))
}

async fn setup() -> (MockServer, tempfile::TempDir, OmvClient) {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = OmvClient::new(
        &server.address().to_string(),
        "admin",
        "hunter2".to_string().into(),
        false,
        true,
        dir.path(),
    )
    .unwrap();
    (server, dir, client)
}

// ── Login tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn connect_success_writes_cookie_file() {
    let (server, dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "session", "method": "login" })))
        .respond_with(
            login_ok().insert_header("set-cookie", "X-OPENMEDIAVAULT-SESSIONID=abc123; Path=/"),
        )
        .mount(&server)
        .await;

    assert!(client.connect().await);
    assert!(client.connected());
    assert!(client.last_error().is_none());

    let saved = cookies::load(&dir.path().join(cookies::COOKIE_FILE_NAME))
        .expect("cookie file written after login");
    assert!(
        saved
            .iter()
            .any(|c| c.name == "X-OPENMEDIAVAULT-SESSIONID" && c.value == "abc123")
    );
}

#[tokio::test]
async fn connect_rejected_credentials() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .respond_with(rpc_error(4000, "Incorrect username or password."))
        .mount(&server)
        .await;

    assert!(!client.connect().await);
    assert!(!client.connected());
    assert_eq!(client.last_error(), Some(ErrorKind::InvalidAuth));
}

#[tokio::test]
async fn connect_unauthenticated_body() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": null,
            "response": { "authenticated": false }
        })))
        .mount(&server)
        .await;

    assert!(!client.connect().await);
    assert_eq!(client.last_error(), Some(ErrorKind::InvalidAuth));
}

#[tokio::test]
async fn connect_http_error_status() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(!client.connect().await);
    assert_eq!(client.last_error(), Some(ErrorKind::Http(503)));
}

#[tokio::test]
async fn connect_unreachable_host() {
    let dir = tempfile::tempdir().unwrap();
    // Reserved TEST-NET-1 address: nothing listens there.
    let client = OmvClient::new(
        "192.0.2.1:9",
        "admin",
        "pw".to_string().into(),
        false,
        true,
        dir.path(),
    )
    .unwrap()
    .with_timeout(Duration::from_millis(250));

    assert!(!client.connect().await);
    assert_eq!(client.last_error(), Some(ErrorKind::CannotConnect));
}

#[tokio::test]
async fn connect_resumes_persisted_cookies() {
    let (server, dir, client) = setup().await;

    cookies::save(
        &dir.path().join(cookies::COOKIE_FILE_NAME),
        &[StoredCookie {
            name: "X-OPENMEDIAVAULT-SESSIONID".into(),
            value: "resumed".into(),
        }],
    )
    .unwrap();

    // Login must carry the preloaded cookie so the server-side session
    // can continue instead of starting over.
    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(header("cookie", "X-OPENMEDIAVAULT-SESSIONID=resumed"))
        .respond_with(login_ok())
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.connect().await);
}

// ── Query tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn query_returns_response_payload() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "session" })))
        .respond_with(login_ok())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "System", "method": "getInformation" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": null,
            "response": { "hostname": "nas1", "version": "6.0" }
        })))
        .mount(&server)
        .await;

    assert!(client.connect().await);
    let data = client
        .query("System", "getInformation", json!({}))
        .await
        .expect("payload");
    assert_eq!(data["hostname"], "nas1");
    assert_eq!(data["version"], "6.0");
}

#[tokio::test]
async fn query_without_connection_stays_offline() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .respond_with(rpc_error(4000, "Incorrect username or password."))
        .mount(&server)
        .await;

    // connect fails; the query inside the backoff window must not retry.
    assert!(!client.connect().await);
    let before = server.received_requests().await.unwrap().len();
    assert!(client.query("System", "getInformation", json!({})).await.is_none());
    let after = server.received_requests().await.unwrap().len();
    assert_eq!(before, after, "backoff window must suppress traffic");
}

#[tokio::test]
async fn query_session_expiry_triggers_single_relogin() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "session", "method": "login" })))
        .respond_with(login_ok())
        .expect(2) // initial connect + exactly one re-auth
        .mount(&server)
        .await;

    // First data call hits an expired session, the retry succeeds.
    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "System", "method": "getInformation" })))
        .respond_with(rpc_error(5001, "Session expired."))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "System", "method": "getInformation" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": null,
            "response": { "hostname": "nas1", "version": "6.0" }
        })))
        .mount(&server)
        .await;

    assert!(client.connect().await);
    let data = client
        .query("System", "getInformation", json!({}))
        .await
        .expect("retried payload");
    assert_eq!(data["hostname"], "nas1");
    assert_eq!(data["version"], "6.0");
    assert!(client.connected());
}

#[tokio::test]
async fn query_expiry_on_both_attempts_gives_up() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "session" })))
        .respond_with(login_ok())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "System" })))
        .respond_with(rpc_error(5002, "Session not authenticated."))
        .mount(&server)
        .await;

    assert!(client.connect().await);
    // Expired, re-auth succeeds, retry expires again: one retry max.
    assert!(client.query("System", "getInformation", json!({})).await.is_none());
}

#[tokio::test]
async fn query_malformed_body_disconnects() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "session" })))
        .respond_with(login_ok())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "System" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    assert!(client.connect().await);
    assert!(client.query("System", "getInformation", json!({})).await.is_none());
    assert!(!client.connected(), "malformed body tears the session down");
}

#[tokio::test]
async fn query_rpc_error_keeps_session() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "session" })))
        .respond_with(login_ok())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .and(body_partial_json(json!({ "service": "Nope" })))
        .respond_with(rpc_error(3000, "Invalid RPC service"))
        .mount(&server)
        .await;

    assert!(client.connect().await);
    assert!(client.query("Nope", "missing", json!({})).await.is_none());
    // A plain RPC fault degrades one call, not the whole session.
    assert!(client.connected());
}

// ── Backoff tests ───────────────────────────────────────────────────

#[tokio::test]
async fn backoff_gates_reconnect_attempts() {
    let (server, dir, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .respond_with(rpc_error(4000, "Incorrect username or password."))
        .mount(&server)
        .await;

    let client = OmvClient::new(
        &server.address().to_string(),
        "admin",
        "wrong".to_string().into(),
        false,
        true,
        dir.path(),
    )
    .unwrap()
    .with_retry_interval(Duration::from_secs(60));

    assert!(!client.connect().await);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // Inside the window: no reconnect, no HTTP traffic.
    assert!(!client.connection_check().await);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn elapsed_backoff_allows_one_reconnect() {
    let (server, dir, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .respond_with(rpc_error(4000, "Incorrect username or password."))
        .mount(&server)
        .await;

    let client = OmvClient::new(
        &server.address().to_string(),
        "admin",
        "wrong".to_string().into(),
        false,
        true,
        dir.path(),
    )
    .unwrap()
    .with_retry_interval(Duration::from_millis(50));

    assert!(!client.connect().await);
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(!client.connection_check().await);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        2,
        "exactly one reconnect attempt after the window elapses"
    );
}

#[tokio::test]
async fn connection_check_fast_path_when_connected() {
    let (server, _dir, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rpc.php"))
        .respond_with(login_ok())
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.connect().await);
    assert!(client.connection_check().await);
    assert!(client.connection_check().await);
}
