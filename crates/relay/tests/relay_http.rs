use std::net::SocketAddr;

use axum::Router;
use futures::StreamExt;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;

use murmur_core::{ChatRequest, ChatTurn, Role};
use murmur_relay::{AppState, RelayConfig, router};

async fn spawn_app(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve test app");
    });
    addr
}

async fn spawn_fake_upstream(ndjson: &'static str) -> SocketAddr {
    let app = Router::new().route(
        "/api/chat",
        post(move || async move {
            // Deliver the payload in small chunks so the relay has to
            // reassemble lines across transport boundaries.
            let chunks: Vec<Result<Vec<u8>, std::io::Error>> = ndjson
                .as_bytes()
                .chunks(7)
                .map(|chunk| Ok(chunk.to_vec()))
                .collect();
            Body::from_stream(futures::stream::iter(chunks))
        }),
    );
    spawn_app(app).await
}

async fn spawn_failing_upstream(status: StatusCode, detail: &'static str) -> SocketAddr {
    let app = Router::new().route(
        "/api/chat",
        post(move || async move { (status, detail).into_response() }),
    );
    spawn_app(app).await
}

async fn spawn_relay(upstream: SocketAddr) -> SocketAddr {
    let config = RelayConfig {
        ollama_host: format!("http://{upstream}"),
        ..RelayConfig::default()
    };
    spawn_app(router(AppState::new(&config))).await
}

fn sample_request() -> ChatRequest {
    ChatRequest {
        messages: vec![
            ChatTurn::new(Role::System, "You are a helpful assistant."),
            ChatTurn::new(Role::User, "Hello"),
        ],
    }
}

#[tokio::test]
async fn streams_token_text_from_upstream() {
    let upstream = spawn_fake_upstream(concat!(
        "{\"message\":{\"content\":\"Hi\"},\"done\":false}\n",
        "{\"message\":{\"content\":\" there\"},\"done\":false}\n",
        "not json at all\n",
        "{\"message\":{\"content\":\"!\"},\"done\":false}\n",
        "{\"message\":{\"content\":\"\"},\"done\":true}\n",
    ))
    .await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{relay}/api/chat"))
        .json(&sample_request())
        .send()
        .await
        .expect("relay request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/plain; charset=utf-8")
    );

    let text = response.text().await.expect("relay body");
    assert_eq!(text, "Hi there!");
}

#[tokio::test]
async fn mid_stream_upstream_failure_aborts_the_relay_body() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async {
            // Pause before the error so the response head and first chunk
            // are flushed to the relay before the connection dies; an
            // immediately-ready error would abort the response pre-headers.
            let chunks = futures::stream::unfold(0u8, |step| async move {
                match step {
                    0 => Some((
                        Ok(b"{\"message\":{\"content\":\"partial\"},\"done\":false}\n".to_vec()),
                        1,
                    )),
                    1 => {
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        Some((
                            Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
                            2,
                        ))
                    }
                    _ => None,
                }
            });
            Body::from_stream(chunks)
        }),
    );
    let upstream = spawn_app(app).await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{relay}/api/chat"))
        .json(&sample_request())
        .send()
        .await
        .expect("relay request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let mut body = response.bytes_stream();
    let mut text = String::new();
    let mut aborted = false;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => text.push_str(std::str::from_utf8(&bytes).expect("utf8 body")),
            Err(_) => {
                aborted = true;
                break;
            }
        }
    }

    assert_eq!(text, "partial");
    assert!(aborted, "truncated upstream must not read as a completed body");
}

#[tokio::test]
async fn upstream_error_becomes_fixed_json_shape() {
    let upstream = spawn_failing_upstream(StatusCode::SERVICE_UNAVAILABLE, "model overloaded").await;
    let relay = spawn_relay(upstream).await;

    let response = reqwest::Client::new()
        .post(format!("http://{relay}/api/chat"))
        .json(&sample_request())
        .send()
        .await
        .expect("relay request");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = response.json().await.expect("error body");
    assert_eq!(body["error"], "Ollama error");
    assert_eq!(body["status"], 503);
    assert_eq!(body["detail"], "model overloaded");
}

#[tokio::test]
async fn unreachable_upstream_reports_status_zero() {
    // Bind and immediately drop a listener so the port is very likely free.
    let dead_addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind probe listener");
        listener.local_addr().expect("local addr")
    };
    let relay = spawn_relay(dead_addr).await;

    let response = reqwest::Client::new()
        .post(format!("http://{relay}/api/chat"))
        .json(&sample_request())
        .send()
        .await
        .expect("relay request");

    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = response.json().await.expect("error body");
    assert_eq!(body["error"], "Ollama error");
    assert_eq!(body["status"], 0);
}
