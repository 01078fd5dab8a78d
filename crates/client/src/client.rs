use futures::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use murmur_core::{StreamEventMapped, StreamEventPayload, StreamTarget};

use crate::error::ClientResult;
use crate::transport::{CancelHandle, RelayTransport, StreamRequest};
use crate::workspace::ChatWorkspace;

/// How one send operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// One in-flight send: the event feed plus a clonable cancel handle the
/// embedder can wire to a stop action.
#[derive(Debug)]
pub struct ActiveSend {
    pub target: StreamTarget,
    pub cancel: CancelHandle,
    events: UnboundedReceiverStream<StreamEventMapped>,
}

/// Drives the send/stream/cancel lifecycle against a relay transport.
///
/// `begin_send` prepares the workspace and opens the transport; `drive`
/// consumes the event feed to completion, folding every event back into the
/// workspace. The two are split so the embedder can hold the cancel handle
/// while the drive future is pending.
pub struct ChatClient<T> {
    workspace: ChatWorkspace,
    transport: T,
}

impl<T: RelayTransport> ChatClient<T> {
    pub fn new(workspace: ChatWorkspace, transport: T) -> Self {
        Self {
            workspace,
            transport,
        }
    }

    pub fn workspace(&self) -> &ChatWorkspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut ChatWorkspace {
        &mut self.workspace
    }

    /// Starts a send against the active conversation.
    pub fn begin_send(&mut self, text: &str) -> ClientResult<ActiveSend> {
        let prepared = self.workspace.begin_send(text)?;
        let stream = self.transport.open(StreamRequest {
            target: prepared.target,
            request: prepared.request,
        });

        Ok(ActiveSend {
            target: prepared.target,
            cancel: stream.cancel,
            events: stream.events,
        })
    }

    /// Consumes the event feed until it settles.
    ///
    /// A feed that closes without a terminal event is a cancellation: the
    /// transport worker observed the cancel token and stopped mid-stream.
    pub async fn drive(&mut self, send: ActiveSend) -> SendOutcome {
        let ActiveSend {
            target, mut events, ..
        } = send;

        while let Some(event) = events.next().await {
            if event.target != target {
                continue;
            }
            match event.payload {
                StreamEventPayload::Delta(fragment) => {
                    self.workspace.apply_delta(target, &fragment);
                }
                StreamEventPayload::Done => {
                    self.workspace.complete(target);
                    return SendOutcome::Completed;
                }
                StreamEventPayload::Error(detail) => {
                    self.workspace.fail(target, &detail);
                    return SendOutcome::Failed;
                }
            }
        }

        self.workspace.cancel(target);
        SendOutcome::Cancelled
    }
}
