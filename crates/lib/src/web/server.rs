//! HTTP front end. Every route builds an [`Invocation`] and runs it through the dispatcher.

use crate::tools::{error_envelope, DispatchError, Dispatcher, Invocation, ResultEnvelope};
use crate::tools::{CREATE_GROUP, GET_CHATS, GET_CHAT_MESSAGES, SEND_MEDIA, SEND_MESSAGE};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const SERVICE_NAME: &str = "periskope";

/// Routes advertised by `GET /`.
pub const ENDPOINTS: &[&str] = &[
    "GET /",
    "GET /api/tools",
    "POST /api/tools/:name",
    "POST /api/send-message",
    "GET /api/chats?type=user|group",
    "GET /api/messages/:chat_id?limit=",
    "POST /api/send-media",
    "POST /api/create-group",
];

#[derive(Clone)]
pub struct WebState {
    pub dispatcher: Dispatcher,
    pub port: u16,
}

/// Bind `bind:port` and serve until SIGINT/SIGTERM.
pub async fn run_web(bind: &str, port: u16, dispatcher: Dispatcher) -> Result<()> {
    let app = router(WebState { dispatcher, port });

    let bind_addr = format!("{}:{}", bind.trim(), port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("web front end listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("web server exited")?;
    log::info!("web front end stopped");
    Ok(())
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/:name", post(call_tool))
        .route("/api/send-message", post(send_message))
        .route("/api/chats", get(list_chats))
        .route("/api/messages/:chat_id", get(chat_messages))
        .route("/api/send-media", post(send_media))
        .route("/api/create-group", post(create_group))
        .with_state(state)
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

type EnvelopeResponse = (StatusCode, Json<ResultEnvelope>);

fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::UnknownAction(_) => StatusCode::NOT_FOUND,
        DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
        DispatchError::Gateway(_) => StatusCode::BAD_GATEWAY,
    }
}

/// 400 with an error envelope, for requests that never got as far as the dispatcher.
fn rejected(action: &str, reason: impl Into<String>) -> EnvelopeResponse {
    let err = DispatchError::Validation(reason.into());
    (StatusCode::BAD_REQUEST, Json(error_envelope(action, &err)))
}

/// Decode a JSON request body. An empty body decodes as `null`.
fn parse_body<T: DeserializeOwned>(action: &str, body: &Bytes) -> Result<T, EnvelopeResponse> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        &b"null"[..]
    } else {
        &body[..]
    };
    serde_json::from_slice(raw).map_err(|e| rejected(action, format!("invalid JSON body: {}", e)))
}

fn parse_query<T>(action: &str, query: Result<Query<T>, QueryRejection>) -> Result<T, EnvelopeResponse> {
    query
        .map(|Query(q)| q)
        .map_err(|e| rejected(action, format!("invalid query string: {}", e.body_text())))
}

async fn run(state: &WebState, invocation: Invocation) -> EnvelopeResponse {
    match state.dispatcher.try_dispatch(&invocation).await {
        Ok(out) => (StatusCode::OK, Json(out.into_envelope())),
        Err(e) => (status_for(&e), Json(error_envelope(&invocation.action, &e))),
    }
}

/// GET / returns a simple health JSON with the route list.
async fn health_http(State(state): State<WebState>) -> Json<Value> {
    Json(json!({
        "runtime": "running",
        "service": SERVICE_NAME,
        "port": state.port,
        "tools": state.dispatcher.registry().describe().len(),
        "endpoints": ENDPOINTS,
    }))
}

async fn list_tools(State(state): State<WebState>) -> Json<Value> {
    Json(json!({ "tools": state.dispatcher.registry().tool_infos() }))
}

/// POST /api/tools/:name with the arguments object as body (empty body means no arguments).
async fn call_tool(State(state): State<WebState>, Path(name): Path<String>, body: Bytes) -> EnvelopeResponse {
    let arguments: Value = match parse_body(&name, &body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    run(&state, Invocation::new(name, arguments)).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SendMessageBody {
    chat_id: String,
    message: String,
}

async fn send_message(State(state): State<WebState>, body: Bytes) -> EnvelopeResponse {
    let body: SendMessageBody = match parse_body::<Option<_>>(SEND_MESSAGE, &body) {
        Ok(b) => b.unwrap_or_default(),
        Err(resp) => return resp,
    };
    let args = json!({ "chat_id": body.chat_id, "message": body.message });
    run(&state, Invocation::new(SEND_MESSAGE, args)).await
}

#[derive(Debug, Deserialize)]
struct ChatsQuery {
    #[serde(rename = "type")]
    chat_type: Option<String>,
}

async fn list_chats(
    State(state): State<WebState>,
    query: Result<Query<ChatsQuery>, QueryRejection>,
) -> EnvelopeResponse {
    let q = match parse_query(GET_CHATS, query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let mut args = Map::new();
    if let Some(t) = q.chat_type.filter(|t| !t.trim().is_empty()) {
        args.insert("chat_type".to_string(), Value::String(t));
    }
    run(&state, Invocation::new(GET_CHATS, Value::Object(args))).await
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    limit: Option<u64>,
}

async fn chat_messages(
    State(state): State<WebState>,
    Path(chat_id): Path<String>,
    query: Result<Query<MessagesQuery>, QueryRejection>,
) -> EnvelopeResponse {
    let q = match parse_query(GET_CHAT_MESSAGES, query) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let mut args = json!({ "chat_id": chat_id });
    if let Some(limit) = q.limit {
        args["limit"] = json!(limit);
    }
    run(&state, Invocation::new(GET_CHAT_MESSAGES, args)).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SendMediaBody {
    chat_id: String,
    media_url: String,
    caption: Option<String>,
}

async fn send_media(State(state): State<WebState>, body: Bytes) -> EnvelopeResponse {
    let body: SendMediaBody = match parse_body::<Option<_>>(SEND_MEDIA, &body) {
        Ok(b) => b.unwrap_or_default(),
        Err(resp) => return resp,
    };
    let mut args = json!({ "to": body.chat_id, "media_url": body.media_url });
    if let Some(c) = body.caption {
        args["caption"] = json!(c);
    }
    run(&state, Invocation::new(SEND_MEDIA, args)).await
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateGroupBody {
    name: String,
    members: Vec<String>,
}

async fn create_group(State(state): State<WebState>, body: Bytes) -> EnvelopeResponse {
    let body: CreateGroupBody = match parse_body::<Option<_>>(CREATE_GROUP, &body) {
        Ok(b) => b.unwrap_or_default(),
        Err(resp) => return resp,
    };
    let args = json!({ "name": body.name, "members": body.members });
    run(&state, Invocation::new(CREATE_GROUP, args)).await
}
