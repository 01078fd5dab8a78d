use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use murmur_core::{RelayErrorBody, StreamEventMapped, StreamEventPayload};

use crate::text::Utf8StreamDecoder;
use crate::transport::{CancelHandle, RelayStream, RelayTransport, StreamRequest};

/// HTTP transport against a relay endpoint.
///
/// Each `open` spawns one worker that posts the conversation, then races the
/// cancellation token against the next body chunk. The response body is raw
/// token text, decoded incrementally so split multi-byte sequences survive
/// chunk boundaries.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    http: reqwest::Client,
    chat_url: String,
}

impl HttpRelayTransport {
    /// `relay_url` is the relay's base address, e.g. `http://127.0.0.1:8080`.
    pub fn new(relay_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            chat_url: format!("{}/api/chat", relay_url.trim_end_matches('/')),
        }
    }
}

impl RelayTransport for HttpRelayTransport {
    fn open(&self, request: StreamRequest) -> RelayStream {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        tokio::spawn(run_stream_worker(
            self.http.clone(),
            self.chat_url.clone(),
            request,
            event_tx,
            token.clone(),
        ));

        RelayStream {
            events: UnboundedReceiverStream::new(event_rx),
            cancel: CancelHandle::new(token),
        }
    }
}

async fn run_stream_worker(
    http: reqwest::Client,
    chat_url: String,
    request: StreamRequest,
    event_tx: mpsc::UnboundedSender<StreamEventMapped>,
    token: CancellationToken,
) {
    let target = request.target;
    let send = |payload: StreamEventPayload| {
        event_tx.send(StreamEventMapped { target, payload }).is_ok()
    };

    let response = tokio::select! {
        _ = token.cancelled() => return,
        response = http.post(&chat_url).json(&request.request).send() => response,
    };

    let response = match response {
        Ok(response) => response,
        Err(error) => {
            send(StreamEventPayload::Error(error.to_string()));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let detail = tokio::select! {
            _ = token.cancelled() => return,
            body = response.text() => failure_detail(status.as_u16(), body.ok()),
        };
        send(StreamEventPayload::Error(detail));
        return;
    }

    let mut body = response.bytes_stream();
    let mut decoder = Utf8StreamDecoder::new();

    loop {
        let chunk = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(
                    conversation_id = %target.conversation_id,
                    session_id = target.session_id.0,
                    "stream cancelled"
                );
                return;
            }
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                let text = decoder.decode(&bytes);
                if !text.is_empty() && !send(StreamEventPayload::Delta(text)) {
                    return;
                }
            }
            Some(Err(error)) => {
                send(StreamEventPayload::Error(error.to_string()));
                return;
            }
            None => {
                let tail = decoder.flush();
                if !tail.is_empty() && !send(StreamEventPayload::Delta(tail)) {
                    return;
                }
                send(StreamEventPayload::Done);
                return;
            }
        }
    }
}

/// Extracts the diagnostic detail from a relay error response.
///
/// The relay answers failures with `{ "error", "status", "detail" }`; when
/// the body is missing or carries no detail the HTTP status stands in.
fn failure_detail(status: u16, body: Option<String>) -> String {
    let body = body.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<RelayErrorBody>(&body) {
        if !parsed.detail.is_empty() {
            return parsed.detail;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}
