use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::retry::RetryConfig;
use crate::{ApiEmbedder, EmbedError, Embedder, StubEmbedder};

/// Environment variable that overrides [`EmbedderConfig::api_url`].
pub const ENV_API_URL: &str = "TITLECAT_EMBED_API_URL";
/// Environment variable holding a bearer token for the embedding provider.
pub const ENV_API_TOKEN: &str = "TITLECAT_EMBED_API_TOKEN";

/// Which model backs the embedder and how its vectors are post-processed.
///
/// # Example
/// ```no_run
/// use embed::EmbedderConfig;
///
/// let cfg = EmbedderConfig {
///     mode: "api".into(),
///     api_url: Some("https://router.huggingface.co/hf-inference/models/BAAI/bge-small-en-v1.5/pipeline/feature-extraction".into()),
///     api_auth_header: Some("Bearer hf_xxx".into()),
///     api_provider: Some("hf".into()),
///     ..Default::default()
/// };
///
/// let embedder = cfg.build().expect("valid embedder config");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderConfig {
    /// `"stub"` (deterministic, offline) or `"api"` (remote HTTP provider).
    pub mode: String,
    /// Label reported by [`Embedder::model_name`]; also sent to OpenAI-style providers.
    pub model_name: String,
    /// Output dimension of the stub embedder. Ignored in API mode.
    pub dimension: usize,
    /// Normalize vectors to unit length before returning them.
    pub normalize: bool,
    /// Inference endpoint when [`mode`](Self::mode) is `"api"`.
    pub api_url: Option<String>,
    /// Authorization header (e.g., `"Bearer hf_xxx"`).
    pub api_auth_header: Option<String>,
    /// Remote provider hint: `"hf"`, `"openai"`, or `"custom"` (default).
    pub api_provider: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub api_timeout_secs: u64,
    /// Retry policy for API calls. Defaults apply when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            mode: "stub".into(),
            model_name: "bge-small-en-v1.5".into(),
            dimension: 384,
            normalize: true,
            api_url: None,
            api_auth_header: None,
            api_provider: None,
            api_timeout_secs: 30,
            retry: None,
        }
    }
}

impl EmbedderConfig {
    /// Apply `TITLECAT_EMBED_API_URL` / `TITLECAT_EMBED_API_TOKEN` on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_url = Some(url);
            }
        }
        if self.api_auth_header.is_none() {
            if let Ok(token) = std::env::var(ENV_API_TOKEN) {
                if !token.trim().is_empty() {
                    self.api_auth_header = Some(format!("Bearer {}", token.trim()));
                }
            }
        }
        self
    }

    /// Construct the configured embedder.
    pub fn build(&self) -> Result<Arc<dyn Embedder>, EmbedError> {
        match self.mode.to_ascii_lowercase().as_str() {
            "stub" | "fast" => {
                if self.dimension == 0 {
                    return Err(EmbedError::InvalidConfig(
                        "stub dimension must be greater than zero".into(),
                    ));
                }
                let stub = StubEmbedder::new(self.dimension)
                    .with_model_name(self.model_name.clone())
                    .with_normalize(self.normalize);
                Ok(Arc::new(stub))
            }
            "api" => Ok(Arc::new(ApiEmbedder::new(self)?)),
            other => Err(EmbedError::InvalidConfig(format!(
                "unknown embedder mode `{other}` (expected `stub` or `api`)"
            ))),
        }
    }
}
