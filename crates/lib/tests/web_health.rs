//! Integration test: start the web front end on a free port and drive it over HTTP.
//! The upstream points at a closed local port, so only paths that never reach the
//! network succeed; the server task is left running when the test ends.

use lib::config::{Credentials, UpstreamSettings};
use lib::gateway::MessagingGateway;
use lib::tools::Dispatcher;
use std::sync::Arc;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn offline_dispatcher() -> Dispatcher {
    let dead = format!("http://127.0.0.1:{}", free_port());
    let settings = UpstreamSettings {
        credentials: Credentials {
            api_key: "test-key".to_string(),
            phone: "910000000000".to_string(),
        },
        base_url: dead,
        fallback_base_urls: Vec::new(),
        timeout: Duration::from_secs(2),
    };
    let gateway = MessagingGateway::from_settings(&settings).expect("build gateway");
    Dispatcher::new(Arc::new(gateway))
}

/// Spawn the server and wait until `GET /` answers. Returns the base URL.
async fn start_web() -> String {
    let port = free_port();
    let dispatcher = offline_dispatcher();
    tokio::spawn(async move {
        let _ = lib::web::run_web("127.0.0.1", port, dispatcher).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/", base)).send().await {
            if resp.status().is_success() {
                return base;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("web front end on port {} did not come up within 5s", port);
}

#[tokio::test]
async fn health_responds_with_running() {
    let base = start_web().await;
    let json: serde_json::Value = reqwest::get(format!("{}/", base))
        .await
        .expect("GET /")
        .json()
        .await
        .expect("parse JSON");
    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(json.get("service").and_then(|v| v.as_str()), Some("periskope"));
    assert_eq!(json.get("tools").and_then(|v| v.as_u64()), Some(8));
}

#[tokio::test]
async fn catalog_lists_eight_tools() {
    let base = start_web().await;
    let json: serde_json::Value = reqwest::get(format!("{}/api/tools", base))
        .await
        .expect("GET /api/tools")
        .json()
        .await
        .expect("parse JSON");
    let tools = json["tools"].as_array().expect("tools array");
    assert_eq!(tools.len(), 8);
    assert_eq!(tools[5]["name"], "create_whatsapp_group");
    assert_eq!(tools[5]["inputSchema"]["required"], serde_json::json!(["name", "members"]));
}

#[tokio::test]
async fn status_codes_follow_dispatch_errors() {
    let base = start_web().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/create-group", base))
        .json(&serde_json::json!({"name": "Team", "members": []}))
        .send()
        .await
        .expect("POST create-group");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.expect("envelope");
    assert_eq!(body["isError"], true);
    assert_eq!(body["content"][0]["type"], "text");

    let resp = client
        .post(format!("{}/api/tools/delete_everything", base))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("POST unknown tool");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{}/api/send-message", base))
        .json(&serde_json::json!({"chatId": "917060284729", "message": "hi"}))
        .send()
        .await
        .expect("POST send-message");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = resp.json().await.expect("envelope");
    let text = body["content"][0]["text"].as_str().unwrap_or_default();
    assert!(text.starts_with("Error executing send_whatsapp_message:"), "{}", text);
}

#[tokio::test]
async fn health_lists_endpoints() {
    let base = start_web().await;
    let json: serde_json::Value = reqwest::get(format!("{}/", base))
        .await
        .expect("GET /")
        .json()
        .await
        .expect("parse JSON");
    let endpoints: Vec<&str> = json["endpoints"]
        .as_array()
        .expect("endpoints array")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(endpoints.len(), 8);
    assert!(endpoints.contains(&"POST /api/send-message"));
    assert!(endpoints.contains(&"GET /api/messages/:chat_id?limit="));
}

#[tokio::test]
async fn malformed_requests_get_error_envelopes() {
    let base = start_web().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/messages/917060284729?limit=abc", base))
        .send()
        .await
        .expect("GET messages");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.expect("envelope");
    assert_eq!(body["isError"], true);
    let text = body["content"][0]["text"].as_str().unwrap_or_default();
    assert!(text.starts_with("Error executing get_chat_messages:"), "{}", text);

    let resp = client
        .post(format!("{}/api/send-message", base))
        .header("content-type", "application/json")
        .body("{bad")
        .send()
        .await
        .expect("POST send-message");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.expect("envelope");
    assert_eq!(body["isError"], true);
    let text = body["content"][0]["text"].as_str().unwrap_or_default();
    assert!(text.contains("invalid JSON body"), "{}", text);

    // A broken body must not run the tool with empty arguments.
    let resp = client
        .post(format!("{}/api/tools/get_all_messages", base))
        .header("content-type", "application/json")
        .body("{\"limit\": ")
        .send()
        .await
        .expect("POST get_all_messages");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.expect("envelope");
    let text = body["content"][0]["text"].as_str().unwrap_or_default();
    assert!(text.starts_with("Error executing get_all_messages:"), "{}", text);
    assert!(text.contains("invalid JSON body"), "{}", text);
}

#[tokio::test]
async fn empty_tool_body_means_no_arguments() {
    let base = start_web().await;
    let client = reqwest::Client::new();

    // No arguments passes validation, then fails upstream (502), not 400.
    let resp = client
        .post(format!("{}/api/tools/get_whatsapp_chats", base))
        .send()
        .await
        .expect("POST get_whatsapp_chats");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
}
