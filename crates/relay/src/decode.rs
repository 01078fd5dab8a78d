use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One decoded update from the upstream line-delimited JSON stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// A non-empty generated text fragment, to be forwarded verbatim.
    Token(String),
    /// Upstream signaled completion; nothing after this may be emitted.
    Done,
}

#[derive(Debug, Deserialize)]
struct UpstreamChunk {
    #[serde(default)]
    message: Option<UpstreamChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct UpstreamChunkMessage {
    #[serde(default)]
    content: String,
}

/// Reassembles newline-delimited JSON out of an arbitrarily fragmented byte
/// stream and extracts the generated text.
///
/// Transport chunk boundaries carry no meaning: bytes accumulate until a
/// newline, the trailing partial line stays buffered for the next push.
/// Blank lines are skipped; malformed lines are dropped (counted, never
/// fatal); a `done: true` object finishes the stream even if more bytes
/// arrive afterwards.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    dropped_lines: u64,
    finished: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns the updates it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamUpdate> {
        if self.finished {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut updates = Vec::new();
        while let Some(newline_index) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_index).collect();
            let line = &line[..line.len() - 1];

            let (token, done) = self.decode_line(line);
            if let Some(token) = token {
                updates.push(StreamUpdate::Token(token));
            }
            if done {
                self.finished = true;
                self.buffer.clear();
                updates.push(StreamUpdate::Done);
                return updates;
            }
        }

        updates
    }

    /// Number of malformed lines discarded so far.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }

    /// True once upstream signaled `done`.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decodes one complete line into an optional token and the done flag.
    /// A final object may carry both a token and `done: true`.
    fn decode_line(&mut self, line: &[u8]) -> (Option<String>, bool) {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return (None, false);
        }

        let chunk: UpstreamChunk = match serde_json::from_slice(trimmed) {
            Ok(chunk) => chunk,
            Err(error) => {
                // Malformed lines must not abort the stream; count them so
                // drops stay visible in the logs.
                self.dropped_lines = self.dropped_lines.saturating_add(1);
                tracing::warn!(
                    line_bytes = trimmed.len(),
                    dropped_lines = self.dropped_lines,
                    %error,
                    "dropping malformed upstream line"
                );
                return (None, false);
            }
        };

        let token = chunk
            .message
            .map(|message| message.content)
            .filter(|content| !content.is_empty());

        (token, chunk.done)
    }
}

/// Spawns a worker that transcodes an upstream body into a plain token byte
/// stream suitable for an HTTP response body.
///
/// A mid-stream upstream failure is forwarded as a stream error so the
/// response body aborts instead of ending as if the answer were complete.
pub fn spawn_transcoder<S, E>(upstream: S) -> UnboundedReceiverStream<Result<Bytes, std::io::Error>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (token_tx, token_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_transcoder(upstream, token_tx));
    UnboundedReceiverStream::new(token_rx)
}

async fn run_transcoder<S, E>(
    upstream: S,
    token_tx: mpsc::UnboundedSender<Result<Bytes, std::io::Error>>,
) where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: std::fmt::Display,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut assembler = LineAssembler::new();

    while let Some(chunk) = upstream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                // Mid-stream transport failure: abort the output so the
                // partial text cannot pass for a completed response.
                tracing::warn!(%error, "upstream body failed mid-stream");
                let _ = token_tx.send(Err(std::io::Error::other(error.to_string())));
                return;
            }
        };

        for update in assembler.push(&chunk) {
            match update {
                StreamUpdate::Token(token) => {
                    if token_tx.send(Ok(Bytes::from(token))).is_err() {
                        // Downstream hung up; stop reading upstream.
                        return;
                    }
                }
                StreamUpdate::Done => {
                    log_dropped_lines(&assembler);
                    return;
                }
            }
        }

        if assembler.is_finished() {
            log_dropped_lines(&assembler);
            return;
        }
    }

    log_dropped_lines(&assembler);
}

fn log_dropped_lines(assembler: &LineAssembler) {
    if assembler.dropped_lines() > 0 {
        tracing::warn!(
            dropped_lines = assembler.dropped_lines(),
            "stream finished with malformed upstream lines dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_text(updates: &[StreamUpdate]) -> String {
        updates
            .iter()
            .filter_map(|update| match update {
                StreamUpdate::Token(token) => Some(token.as_str()),
                StreamUpdate::Done => None,
            })
            .collect()
    }

    fn sample_payload() -> Vec<u8> {
        concat!(
            "{\"message\":{\"content\":\"Hi\"},\"done\":false}\n",
            "{\"message\":{\"content\":\" there\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        )
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn output_is_independent_of_chunk_boundaries() {
        let payload = sample_payload();

        let mut reference = LineAssembler::new();
        let reference_updates = reference.push(&payload);
        let expected_text = collect_text(&reference_updates);
        assert_eq!(expected_text, "Hi there");

        for chunk_size in 1..payload.len() {
            let mut assembler = LineAssembler::new();
            let mut updates = Vec::new();
            for chunk in payload.chunks(chunk_size) {
                updates.extend(assembler.push(chunk));
            }

            assert_eq!(collect_text(&updates), expected_text, "chunk size {chunk_size}");
            assert_eq!(updates.last(), Some(&StreamUpdate::Done));
        }
    }

    #[test]
    fn malformed_lines_are_dropped_without_terminating() {
        let payload = concat!(
            "{\"message\":{\"content\":\"a\"},\"done\":false}\n",
            "this is not json\n",
            "{\"message\":{\"content\":\"b\"},\"done\":false}\n",
        );

        let mut assembler = LineAssembler::new();
        let updates = assembler.push(payload.as_bytes());

        assert_eq!(collect_text(&updates), "ab");
        assert_eq!(assembler.dropped_lines(), 1);
        assert!(!assembler.is_finished());
    }

    #[test]
    fn done_cuts_off_later_bytes() {
        let payload = concat!(
            "{\"message\":{\"content\":\"early\"},\"done\":false}\n",
            "{\"done\":true}\n",
            "{\"message\":{\"content\":\"late\"},\"done\":false}\n",
        );

        let mut assembler = LineAssembler::new();
        let updates = assembler.push(payload.as_bytes());

        assert_eq!(collect_text(&updates), "early");
        assert_eq!(updates.last(), Some(&StreamUpdate::Done));
        assert!(assembler.is_finished());
        assert!(assembler.push(b"{\"message\":{\"content\":\"x\"},\"done\":false}\n").is_empty());
    }

    #[test]
    fn blank_and_empty_token_lines_are_no_ops() {
        let payload = concat!(
            "\n",
            "   \n",
            "{\"message\":{\"content\":\"\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"kept\"},\"done\":false}\n",
        );

        let mut assembler = LineAssembler::new();
        let updates = assembler.push(payload.as_bytes());

        assert_eq!(updates, vec![StreamUpdate::Token("kept".to_string())]);
        assert_eq!(assembler.dropped_lines(), 0);
    }

    #[test]
    fn final_line_may_carry_token_and_done_together() {
        let payload = "{\"message\":{\"content\":\"bye\"},\"done\":true}\n";

        let mut assembler = LineAssembler::new();
        let updates = assembler.push(payload.as_bytes());

        assert_eq!(collect_text(&updates), "bye");
        assert!(assembler.is_finished());
    }

    #[tokio::test]
    async fn transcoder_concatenates_tokens_into_body_bytes() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = sample_payload()
            .chunks(5)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        let mut body = spawn_transcoder(futures::stream::iter(chunks));
        let mut text = String::new();
        while let Some(Ok(bytes)) = body.next().await {
            text.push_str(std::str::from_utf8(&bytes).unwrap());
        }

        assert_eq!(text, "Hi there");
    }

    #[tokio::test]
    async fn transcoder_aborts_on_mid_stream_upstream_failure() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(
                b"{\"message\":{\"content\":\"partial\"},\"done\":false}\n",
            )),
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
        ];

        let mut body = spawn_transcoder(futures::stream::iter(chunks));

        let first = body.next().await.expect("token item").expect("token bytes");
        assert_eq!(first, Bytes::from_static(b"partial"));

        let second = body.next().await.expect("error item");
        assert!(second.is_err(), "mid-stream failure must not end cleanly");
        assert!(body.next().await.is_none());
    }
}
