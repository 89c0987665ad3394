use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::normalize::normalize_l2;
use crate::retry::{execute_with_retry_async, RetryConfig};
use crate::{EmbedError, Embedder, EmbedderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiProviderKind {
    HuggingFace,
    OpenAI,
    Custom,
}

impl ApiProviderKind {
    fn from_hint(hint: Option<&str>) -> Self {
        match hint.unwrap_or("custom").to_ascii_lowercase().as_str() {
            "hf" | "huggingface" => ApiProviderKind::HuggingFace,
            "openai" | "gpt" => ApiProviderKind::OpenAI,
            _ => ApiProviderKind::Custom,
        }
    }
}

/// Embedder backed by a remote feature-extraction endpoint.
///
/// Batches are sent as a single request. Transient failures (connect errors,
/// 429, 5xx) are retried with exponential backoff.
#[derive(Debug, Clone)]
pub struct ApiEmbedder {
    client: reqwest::Client,
    url: String,
    auth_header: Option<String>,
    provider: ApiProviderKind,
    model_name: String,
    normalize: bool,
    retry: RetryConfig,
}

impl ApiEmbedder {
    pub fn new(cfg: &EmbedderConfig) -> Result<Self, EmbedError> {
        let url = cfg
            .api_url
            .clone()
            .ok_or_else(|| EmbedError::InvalidConfig("api_url is required for api mode".into()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.api_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| EmbedError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            auth_header: cfg.api_auth_header.clone(),
            provider: ApiProviderKind::from_hint(cfg.api_provider.as_deref()),
            model_name: cfg.model_name.clone(),
            normalize: cfg.normalize,
            retry: cfg.retry.unwrap_or_default(),
        })
    }

    fn build_payload(&self, texts: &[String]) -> Value {
        match self.provider {
            ApiProviderKind::HuggingFace => json!({ "inputs": texts }),
            ApiProviderKind::OpenAI => json!({ "input": texts, "model": self.model_name }),
            ApiProviderKind::Custom => json!({ "texts": texts }),
        }
    }

    async fn send(&self, payload: &Value) -> Result<Value, EmbedError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(header) = self.auth_header.as_deref() {
            request = request.header("Authorization", header);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbedError::Request(format!("timeout: {e}"))
            } else {
                EmbedError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| EmbedError::Response(format!("invalid JSON: {e}")))
    }
}

#[async_trait]
impl Embedder for ApiEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Response("response did not contain embeddings".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = self.build_payload(texts);
        let outcome = execute_with_retry_async(&self.retry, |_attempt| self.send(&payload)).await;
        if outcome.attempts > 1 {
            tracing::debug!(
                attempts = outcome.attempts,
                elapsed_ms = outcome.total_duration.as_millis() as u64,
                provider = ?self.provider,
                "embedding call needed retries"
            );
        }

        let mut vectors = parse_embeddings_from_value(outcome.into_result()?)?;
        if vectors.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        if self.normalize {
            for vector in vectors.iter_mut() {
                normalize_l2(vector);
            }
        }
        Ok(vectors)
    }
}

fn parse_embeddings_from_value(value: Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_embedding_collection(embeddings);
            }

            if let Some(Value::Array(items)) = map.remove("data") {
                let mut vectors = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(mut obj) => match obj.remove("embedding") {
                            Some(embedding) => vectors.push(parse_embedding_vector(embedding)?),
                            None => {
                                return Err(EmbedError::Response(
                                    "missing `embedding` field in data item".into(),
                                ))
                            }
                        },
                        _ => {
                            return Err(EmbedError::Response(
                                "unexpected entry inside `data` array".into(),
                            ))
                        }
                    }
                }
                return Ok(vectors);
            }

            Err(EmbedError::Response("unsupported API response shape".into()))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Vec::new())
            } else if items.iter().all(|item| matches!(item, Value::Array(_))) {
                items.into_iter().map(parse_embedding_vector).collect()
            } else {
                parse_embedding_vector(Value::Array(items)).map(|vec| vec![vec])
            }
        }
        other => parse_embedding_vector(other).map(|vec| vec![vec]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, EmbedError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| match entry {
                Value::Number(num) => num
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| EmbedError::Response("non-finite embedding value".into())),
                other => Err(EmbedError::Response(format!(
                    "embedding entries must be numbers, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(EmbedError::Response(format!(
            "embedding vector must be an array, got {other:?}"
        ))),
    }
}
