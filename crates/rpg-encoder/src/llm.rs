//! LLM and embedding capability traits.
//!
//! Credential plumbing, provider selection and retries are out of scope —
//! these traits describe only the two operations the encoder actually
//! calls. [`NullLlm`] and [`NullEmbedder`] are the built-in fallback used
//! whenever no provider is configured; the deterministic heuristic in
//! [`crate::semantic`] takes over in that case.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no LLM provider configured")]
    Unavailable,
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Free-text and schema-constrained completion.
#[async_trait]
pub trait LlmCompletion: Send + Sync {
    async fn complete_text(&self, prompt: &str, deadline: Duration) -> Result<String, LlmError>;

    async fn complete_json(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        deadline: Duration,
    ) -> Result<serde_json::Value, LlmError>;
}

/// Dense embeddings for hybrid search (optional; absent when no vector
/// index is configured).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

/// The no-op LLM: always reports itself unavailable. Callers fall back to
/// the deterministic heuristic extractor rather than treating this as an
/// error, unless the caller explicitly required an LLM.
pub struct NullLlm;

#[async_trait]
impl LlmCompletion for NullLlm {
    async fn complete_text(&self, _prompt: &str, _deadline: Duration) -> Result<String, LlmError> {
        Err(LlmError::Unavailable)
    }

    async fn complete_json(
        &self,
        _prompt: &str,
        _schema: &serde_json::Value,
        _deadline: Duration,
    ) -> Result<serde_json::Value, LlmError> {
        Err(LlmError::Unavailable)
    }
}

pub struct NullEmbedder;

#[async_trait]
impl EmbeddingProvider for NullEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Err(LlmError::Unavailable)
    }
}

/// Illustrative HTTP-based completion adapter, gated behind the `http-llm`
/// feature. Not wired to any particular provider's auth scheme — callers
/// supply the endpoint and headers; this exists to show the shape a real
/// adapter takes, not to be production credential plumbing.
#[cfg(feature = "http-llm")]
pub struct HttpLlm {
    pub endpoint: String,
    pub bearer_token: Option<String>,
    client: reqwest::Client,
}

#[cfg(feature = "http-llm")]
impl HttpLlm {
    pub fn new(endpoint: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bearer_token,
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "http-llm")]
#[async_trait]
impl LlmCompletion for HttpLlm {
    async fn complete_text(&self, prompt: &str, deadline: Duration) -> Result<String, LlmError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .timeout(deadline)
            .json(&serde_json::json!({ "prompt": prompt }));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        resp.text()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }

    async fn complete_json(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
        deadline: Duration,
    ) -> Result<serde_json::Value, LlmError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .timeout(deadline)
            .json(&serde_json::json!({ "prompt": prompt, "schema": schema }));
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_llm_is_unavailable() {
        let llm = NullLlm;
        let err = llm
            .complete_text("hi", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Unavailable));
    }
}
