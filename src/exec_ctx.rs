//! Execution context shared across stage invocations.
//!
//! [`ExecCtx`] carries the HTTP client, both upstream backends with their
//! endpoints and model names, the transport backoff for the story call, and
//! the optional event handler. It is built once and shared by every request
//! the pipeline runs.

use crate::backend::{Backend, BackoffConfig, OpenAiBackend};
use crate::error::Result;
use crate::events::EventHandler;
use crate::image::{ImageBackend, MiniMaxBackend};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Default text-generation model.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Default image-generation model.
pub const DEFAULT_IMAGE_MODEL: &str = "image-01";

/// Shared execution context for stage invocations.
///
/// Cloning is cheap: the client and backends are reference counted.
///
/// # Example
///
/// ```
/// use comic_pipeline::ExecCtx;
///
/// let ctx = ExecCtx::builder("https://api.openai.com/v1")
///     .image_base_url("https://api.minimax.io")
///     .llm_model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// assert_eq!(ctx.llm_base_url, "https://api.openai.com");
/// ```
#[derive(Clone)]
pub struct ExecCtx {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Base URL for the text-generation provider.
    pub llm_base_url: String,
    /// Text-generation backend. Default: [`OpenAiBackend`] without a key.
    pub backend: Arc<dyn Backend>,
    /// Model name sent with every story request.
    pub llm_model: String,
    /// Transport retry for the story call. Default: [`BackoffConfig::none()`].
    pub backoff: BackoffConfig,
    /// Base URL for the image provider.
    pub image_base_url: String,
    /// Image backend. Default: [`MiniMaxBackend`] without a key.
    pub image_backend: Arc<dyn ImageBackend>,
    /// Model name sent with every image request.
    pub image_model: String,
    /// Optional event handler for lifecycle and panel events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(llm_base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            llm_base_url: llm_base_url.into(),
            backend: None,
            llm_model: None,
            backoff: None,
            image_base_url: None,
            image_backend: None,
            image_model: None,
            event_handler: None,
            timeout: None,
        }
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("llm_base_url", &self.llm_base_url)
            .field("backend", &self.backend.name())
            .field("llm_model", &self.llm_model)
            .field("backoff", &self.backoff)
            .field("image_base_url", &self.image_base_url)
            .field("image_backend", &self.image_backend.name())
            .field("image_model", &self.image_model)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    llm_base_url: String,
    backend: Option<Arc<dyn Backend>>,
    llm_model: Option<String>,
    backoff: Option<BackoffConfig>,
    image_base_url: Option<String>,
    image_backend: Option<Arc<dyn ImageBackend>>,
    image_model: Option<String>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the text-generation backend.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use the OpenAI-compatible backend with API key authentication.
    pub fn openai_with_key(mut self, api_key: impl Into<String>) -> Self {
        self.backend = Some(Arc::new(OpenAiBackend::new().with_api_key(api_key)));
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    /// Set the transport retry configuration for the story call.
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Set the image provider base URL. Defaults to the text-generation base URL.
    pub fn image_base_url(mut self, url: impl Into<String>) -> Self {
        self.image_base_url = Some(url.into());
        self
    }

    /// Set the image backend.
    pub fn image_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.image_backend = Some(backend);
        self
    }

    /// Use the MiniMax-style image backend with API key authentication.
    pub fn minimax_with_key(mut self, api_key: impl Into<String>) -> Self {
        self.image_backend = Some(Arc::new(MiniMaxBackend::new().with_api_key(api_key)));
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = Some(model.into());
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set a client-wide request timeout.
    ///
    /// Off by default: image attempts carry their own timeout and the story
    /// call is unbounded. Ignored when a custom `Client` is provided.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the execution context.
    ///
    /// Fails only if the default HTTP client cannot be constructed.
    pub fn build(self) -> Result<ExecCtx> {
        let client = match self.client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };
        let llm_base_url = normalize_base_url(&self.llm_base_url);
        let image_base_url = self
            .image_base_url
            .as_deref()
            .map(normalize_base_url)
            .unwrap_or_else(|| llm_base_url.clone());

        Ok(ExecCtx {
            client,
            llm_base_url,
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(OpenAiBackend::new())),
            llm_model: self
                .llm_model
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            backoff: self.backoff.unwrap_or_else(BackoffConfig::none),
            image_base_url,
            image_backend: self
                .image_backend
                .unwrap_or_else(|| Arc::new(MiniMaxBackend::new())),
            image_model: self
                .image_model
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            event_handler: self.event_handler,
        })
    }
}

/// Strip known provider path suffixes from a base URL.
/// Backends append their own paths, so this prevents double-pathing.
/// e.g., "https://api.openai.com/v1" -> "https://api.openai.com"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    // longest first
    for suffix in &["/v1/chat/completions", "/v1/image_generation", "/v1/chat", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url_strips_v1() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1"), "https://api.openai.com");
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
    }

    #[test]
    fn test_normalize_base_url_strips_full_paths() {
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1/chat/completions"),
            "https://api.openai.com"
        );
        assert_eq!(
            normalize_base_url("https://api.minimax.io/v1/image_generation"),
            "https://api.minimax.io"
        );
    }

    #[test]
    fn test_normalize_base_url_preserves_clean() {
        assert_eq!(normalize_base_url("http://localhost:8000"), "http://localhost:8000");
        assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
    }

    #[test]
    fn test_builder_defaults() {
        let ctx = ExecCtx::builder("http://localhost:8000").build().unwrap();
        assert_eq!(ctx.image_base_url, "http://localhost:8000");
        assert_eq!(ctx.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(ctx.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(ctx.backend.name(), "openai");
        assert_eq!(ctx.image_backend.name(), "minimax");
        assert_eq!(ctx.backoff.max_retries, 0);
        assert!(ctx.event_handler.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let ctx = ExecCtx::builder("http://llm")
            .image_base_url("http://img/v1/")
            .llm_model("m1")
            .image_model("m2")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(ctx.image_base_url, "http://img");
        assert_eq!(ctx.llm_model, "m1");
        assert_eq!(ctx.image_model, "m2");
    }
}
