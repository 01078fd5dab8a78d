use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use murmur_core::{ChatRequest, StreamEventMapped, StreamTarget};

/// Everything a transport needs to run one send operation.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub target: StreamTarget,
    pub request: ChatRequest,
}

/// Cooperative cancellation handle for one in-flight stream.
///
/// Cancelling is observed by the transport worker at its next suspension
/// point; the worker then closes the event channel without a terminal event.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One open stream: the ordered event feed plus its cancel handle.
#[derive(Debug)]
pub struct RelayStream {
    pub events: UnboundedReceiverStream<StreamEventMapped>,
    pub cancel: CancelHandle,
}

/// Seam between the conversation state machine and the wire.
///
/// `open` must not block: implementations spawn a worker and return the
/// channel immediately. Dropping the returned stream stops the worker at its
/// next send.
pub trait RelayTransport: Send + Sync {
    fn open(&self, request: StreamRequest) -> RelayStream;
}
