use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use snafu::ResultExt;

use murmur_core::{ChatRequest, RelayErrorBody};

use crate::config::RelayConfig;
use crate::decode::spawn_transcoder;
use crate::error::{BindListenerSnafu, RelayError, RelayResult, ServeSnafu};
use crate::upstream::OllamaClient;

#[derive(Clone)]
pub struct AppState {
    upstream: OllamaClient,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            upstream: OllamaClient::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .with_state(state)
}

/// Forwards a conversation to the model server and streams the generated
/// text back as plain bytes, token by token.
async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    tracing::debug!(turns = request.messages.len(), "relaying chat request");

    let upstream_body = match state.upstream.stream_chat(&request.messages).await {
        Ok(body) => body,
        Err(error) => return upstream_failure(&error),
    };

    let token_stream = spawn_transcoder(upstream_body);

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(token_stream),
    )
        .into_response()
}

/// Maps an upstream failure to the fixed JSON error shape.
///
/// Status reflects what the model server answered; a transport-level failure
/// that never produced a response reports status zero.
fn upstream_failure(error: &RelayError) -> Response {
    let body = match error {
        RelayError::UpstreamStatus { status, detail, .. } => {
            RelayErrorBody::upstream(*status, detail.clone())
        }
        other => RelayErrorBody::upstream(0, other.to_string()),
    };

    tracing::warn!(status = body.status, detail = %body.detail, "upstream chat failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Binds the listener and serves until interrupted.
pub async fn serve(config: RelayConfig) -> RelayResult<()> {
    let state = AppState::new(&config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context(BindListenerSnafu {
            stage: "bind-listener",
            addr: config.bind_addr.clone(),
        })?;

    tracing::info!(addr = %config.bind_addr, upstream = %config.upstream_chat_url(), "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(ServeSnafu { stage: "serve" })
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install ctrl-c handler");
    }
}
