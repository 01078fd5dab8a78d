pub mod config;
pub mod decode;
pub mod error;
pub mod server;
pub mod upstream;

pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use server::{AppState, router, serve};
