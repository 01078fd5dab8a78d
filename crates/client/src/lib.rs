pub mod client;
pub mod error;
pub mod http;
pub mod text;
pub mod transport;
pub mod workspace;

pub use client::{ActiveSend, ChatClient, SendOutcome};
pub use error::{ClientError, ClientResult};
pub use http::HttpRelayTransport;
pub use text::Utf8StreamDecoder;
pub use transport::{CancelHandle, RelayStream, RelayTransport, StreamRequest};
pub use workspace::{
    CANCELLED_NOTICE, ChatWorkspace, DEFAULT_SYSTEM_PROMPT, PreparedSend,
};
