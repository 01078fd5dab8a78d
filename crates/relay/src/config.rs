use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{ConfigExtractSnafu, RelayResult};

/// Default model server location, Ollama's conventional loopback port.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Default local model identifier.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

/// Default relay listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Relay configuration, sourced from the environment with defaults.
///
/// Recognized variables: `OLLAMA_HOST`, `OLLAMA_MODEL`, `RELAY_BIND_ADDR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub ollama_host: String,
    pub ollama_model: String,
    pub bind_addr: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl RelayConfig {
    /// Loads configuration by layering environment variables over defaults.
    pub fn from_env() -> RelayResult<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::raw().only(&["ollama_host", "ollama_model"]))
            .merge(Env::prefixed("RELAY_"))
            .extract()
            .context(ConfigExtractSnafu {
                stage: "extract-relay-config",
            })
    }

    /// Upstream chat endpoint derived from the configured host.
    pub fn upstream_chat_url(&self) -> String {
        format!("{}/api/chat", self.ollama_host.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_conventional_local_setup() {
        let config = RelayConfig::default();
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert_eq!(config.ollama_model, "llama3.1:8b");
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn chat_url_tolerates_trailing_slash() {
        let config = RelayConfig {
            ollama_host: "http://localhost:11434/".to_string(),
            ..RelayConfig::default()
        };
        assert_eq!(config.upstream_chat_url(), "http://localhost:11434/api/chat");
    }
}
