use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("failed to create store directory at {path}"))]
    CreateStoreDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to read store key '{key}' from {path}"))]
    ReadKey {
        stage: &'static str,
        key: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to write store key '{key}' to {path}"))]
    WriteKey {
        stage: &'static str,
        key: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize conversation collection"))]
    SerializeConversations {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;
