// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! HTTP integration tests for the VPN manager API.
//!
//! These tests use `axum-test` to run the full request/response cycle through
//! the Axum router, rate limiter included. The driver program is a small
//! POSIX shell script keeping one line per client, revoked by line number.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use tempfile::TempDir;
use vpn_manager::application::create_router;
use vpn_manager::manager::VpnManager;
use vpn_manager::process::ClientProgram;
use vpn_manager::rate_limit::RateLimiter;
use vpn_manager::registry::{Limits, Registry};

const FAKE_PROGRAM: &str = r#"
STATE="$(dirname "$0")/clients"
[ -f "$STATE" ] || : > "$STATE"
case "$1" in
  new)
    echo "$2" >> "$STATE"
    printf 'ovpn for %s\n' "$2"
    ;;
  revoke)
    count=$(wc -l < "$STATE" | tr -d ' ')
    if [ "$2" -ge 1 ] && [ "$2" -le "$count" ]; then
      sed -i "$2d" "$STATE"
    else
      exit 1
    fi
    ;;
  *)
    exit 2
    ;;
esac
"#;

const LIMITS: Limits = Limits {
    max_clients: 10,
    max_clients_per_user: 5,
};

struct TestContext {
    server: TestServer,
    // kept alive for the lifetime of the server
    _dir: TempDir,
}

fn program(dir: &Path, script: &str) -> ClientProgram {
    let path = dir.join("client.sh");
    std::fs::write(&path, script).unwrap();
    ClientProgram::new("sh", Duration::from_secs(10)).arg(path)
}

/// Creates a test server with capacity 10, 5 clients per user and the fake
/// driver program.
fn create_test_server_with(script: &str, max_requests: u64, cache_size: usize) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(VpnManager::new(
        Registry::new(),
        program(dir.path(), script),
        LIMITS,
        cache_size,
    ));
    let rate_limiter = Arc::new(RateLimiter::new(max_requests, 3));
    let app = create_router(manager, rate_limiter);
    TestContext {
        server: TestServer::new(app).unwrap(),
        _dir: dir,
    }
}

fn create_test_server() -> TestContext {
    create_test_server_with(FAKE_PROGRAM, 1000, 100)
}

fn real_ip() -> HeaderName {
    HeaderName::from_static("x-real-ip")
}

fn ip(value: &'static str) -> HeaderValue {
    HeaderValue::from_static(value)
}

async fn new_client(server: &TestServer, owner: &'static str) -> String {
    let response = server.get("/new").add_header(real_ip(), ip(owner)).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["file_name"].as_str().unwrap().to_string()
}

// =============================================================================
// End-to-end client lifecycle
// =============================================================================

/// Issue, download, delete, download again.
#[tokio::test]
async fn test_client_lifecycle() {
    let ctx = create_test_server();
    let server = &ctx.server;

    let response = server.get("/new").add_header(real_ip(), ip("1.2.3.4")).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let client_id = body["client_id"].as_str().unwrap().to_string();
    let file_name = body["file_name"].as_str().unwrap().to_string();
    assert_eq!(file_name, format!("{client_id}.ovpn"));
    assert_eq!(body["download"], format!("/get/{file_name}"));

    let response = server
        .get(&format!("/get/{file_name}"))
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.header(header::CONTENT_TYPE),
        "application/octet-stream"
    );
    assert_eq!(
        response.as_bytes().as_ref(),
        format!("ovpn for {client_id}\n").as_bytes()
    );

    let response = server
        .get(&format!("/delete/{file_name}"))
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["client_id"], client_id.as_str());

    let response = server
        .get(&format!("/get/{file_name}"))
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], 400);
    assert_eq!(body["message"], format!("Client {client_id} not found"));
}

#[tokio::test]
async fn test_owner_quota_returns_400() {
    let ctx = create_test_server();
    for _ in 0..LIMITS.max_clients_per_user {
        new_client(&ctx.server, "1.2.3.4").await;
    }

    let response = ctx
        .server
        .get("/new")
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["message"],
        "You have already allocated many clients. Please delete some."
    );

    // somebody else is still welcome
    new_client(&ctx.server, "5.6.7.8").await;
}

#[tokio::test]
async fn test_capacity_returns_400() {
    let ctx = create_test_server();
    for owner in ["1.1.1.1", "2.2.2.2"] {
        for _ in 0..LIMITS.max_clients_per_user {
            new_client(&ctx.server, owner).await;
        }
    }

    let response = ctx
        .server
        .get("/new")
        .add_header(real_ip(), ip("3.3.3.3"))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["message"],
        "Reached the maximum number of registered clients."
    );
}

#[tokio::test]
async fn test_failing_program_returns_400() {
    let ctx = create_test_server_with("exit 1\n", 1000, 100);
    let response = ctx
        .server
        .get("/new")
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["message"],
        "Couldn't add a new client. Contact the vpn server admin."
    );
}

// =============================================================================
// Get endpoint
// =============================================================================

#[tokio::test]
async fn test_get_without_file_name_returns_400() {
    let ctx = create_test_server();
    for path in ["/get", "/get/not-a-file"] {
        let response = ctx.server.get(path).add_header(real_ip(), ip("1.2.3.4")).await;
        response.assert_status_bad_request();
    }
}

#[tokio::test]
async fn test_get_pruned_file_returns_500() {
    let ctx = create_test_server_with(FAKE_PROGRAM, 1000, 4);
    let mut files = Vec::new();
    for owner in ["1.1.1.1", "1.1.1.1", "2.2.2.2", "2.2.2.2"] {
        files.push(new_client(&ctx.server, owner).await);
    }

    let response = ctx
        .server
        .get(&format!("/get/{}", files[0]))
        .add_header(real_ip(), ip("1.1.1.1"))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert!(body["message"].as_str().unwrap().contains("/delete"));

    // the registration survived, so it can still be deleted
    let response = ctx
        .server
        .get(&format!("/delete/{}", files[0]))
        .add_header(real_ip(), ip("1.1.1.1"))
        .await;
    response.assert_status_ok();

    let response = ctx
        .server
        .get(&format!("/get/{}", files[3]))
        .add_header(real_ip(), ip("2.2.2.2"))
        .await;
    response.assert_status_ok();
}

// =============================================================================
// Delete endpoint
// =============================================================================

#[tokio::test]
async fn test_delete_without_id_returns_400() {
    let ctx = create_test_server();
    let response = ctx
        .server
        .get("/delete")
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("You need to provide a client ID")
    );
}

#[tokio::test]
async fn test_delete_unknown_returns_400() {
    let ctx = create_test_server();
    let response = ctx
        .server
        .get("/delete/does-not-exist.ovpn")
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Client does-not-exist not found");
}

#[tokio::test]
async fn test_delete_someone_elses_client_returns_400() {
    let ctx = create_test_server();
    let file_name = new_client(&ctx.server, "1.2.3.4").await;

    let response = ctx
        .server
        .get(&format!("/delete/{file_name}"))
        .add_header(real_ip(), ip("6.6.6.6"))
        .await;
    response.assert_status_bad_request();

    // still downloadable by its owner
    let response = ctx
        .server
        .get(&format!("/get/{file_name}"))
        .add_header(real_ip(), ip("1.2.3.4"))
        .await;
    response.assert_status_ok();
}

// =============================================================================
// Informational endpoints
// =============================================================================

#[tokio::test]
async fn test_ip_and_myip_echo_the_proxy_header() {
    let ctx = create_test_server();
    for path in ["/ip", "/myip"] {
        let response = ctx.server.get(path).add_header(real_ip(), ip("9.8.7.6")).await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({"ip": "9.8.7.6"}));
    }
}

#[tokio::test]
async fn test_root_is_about() {
    let ctx = create_test_server();
    let root: serde_json::Value = ctx.server.get("/").await.json();
    let about: serde_json::Value = ctx.server.get("/about").await.json();
    assert_eq!(root, about);
}

#[tokio::test]
async fn test_unknown_path_lists_public_endpoints() {
    let ctx = create_test_server();
    let response = ctx.server.get("/handle_route_new").await;
    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["endpoints"],
        serde_json::json!(["/new", "/delete", "/ip", "/myip", "/about"])
    );
}

// =============================================================================
// Rate limiting
// =============================================================================

/// With a limit of 5 and a grace of 3: calls 1-4 pass, 5-7 get a message,
/// 8 and later get nothing.
#[tokio::test]
async fn test_rate_limit_tiers() {
    let ctx = create_test_server_with(FAKE_PROGRAM, 5, 100);

    for _ in 1..5 {
        let response = ctx.server.get("/myip").add_header(real_ip(), ip("1.2.3.4")).await;
        response.assert_status_ok();
    }
    for _ in 5..8 {
        let response = ctx.server.get("/myip").add_header(real_ip(), ip("1.2.3.4")).await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Are you a bot?");
    }
    for _ in 8..10 {
        let response = ctx.server.get("/myip").add_header(real_ip(), ip("1.2.3.4")).await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert!(response.as_bytes().is_empty());
        assert_eq!(response.header(header::CONNECTION), "close");
    }

    // other sources are unaffected
    let response = ctx.server.get("/myip").add_header(real_ip(), ip("4.3.2.1")).await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_unknown_paths_count_toward_the_limit() {
    let ctx = create_test_server_with(FAKE_PROGRAM, 5, 100);

    for _ in 1..5 {
        let response = ctx.server.get("/nope").add_header(real_ip(), ip("1.2.3.4")).await;
        response.assert_status_not_found();
    }

    let response = ctx.server.get("/myip").add_header(real_ip(), ip("1.2.3.4")).await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Are you a bot?");
}
