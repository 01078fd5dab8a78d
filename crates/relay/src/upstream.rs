use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use snafu::ResultExt;

use murmur_core::ChatTurn;

use crate::config::RelayConfig;
use crate::error::{RelayResult, UpstreamRequestSnafu, UpstreamStatusSnafu};

/// Request body the model server expects on its chat endpoint.
#[derive(Debug, Serialize)]
struct UpstreamChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
}

/// Thin client for the model server's streaming chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    chat_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            chat_url: config.upstream_chat_url(),
            model: config.ollama_model.clone(),
        }
    }

    /// Starts a streaming chat request and returns the raw body byte stream.
    ///
    /// A non-success status is read to completion and surfaced as
    /// [`crate::error::RelayError::UpstreamStatus`] with whatever detail the
    /// server sent.
    pub async fn stream_chat(
        &self,
        messages: &[ChatTurn],
    ) -> RelayResult<BoxStream<'static, Result<Bytes, reqwest::Error>>> {
        let body = UpstreamChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        let response = self
            .http
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .context(UpstreamRequestSnafu { stage: "send-chat" })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return UpstreamStatusSnafu {
                stage: "chat-status",
                status: status.as_u16(),
                detail,
            }
            .fail();
        }

        Ok(response.bytes_stream().boxed())
    }
}
