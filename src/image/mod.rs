//! Image generation: backend trait, providers, and the per-panel stage.
//!
//! ```text
//! PanelImageGenerator ──► ImageRequest ──► ImageBackend::generate() ──► URL
//!         │ 4 panels concurrently                │
//!         │ retry + per-attempt timeout   ┌──────┴──────┐
//!         ▼                          MiniMaxBackend  MockImageBackend
//!     ComicResult
//! ```

pub mod generator;
pub mod minimax;
pub mod mock;

pub use generator::{PanelImageGenerator, COMPOSITION_HINT};
pub use minimax::MiniMaxBackend;
pub use mock::MockImageBackend;

use crate::backend::BackoffConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Square edge length requested for every panel image.
pub const IMAGE_SIZE: u32 = 512;

/// A single image request. One image per call.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    /// Number of images to generate. Always 1 for panels.
    pub n: u32,
    /// Ask the provider to return a hosted URL rather than inline data.
    pub response_format: String,
    /// Let the provider rewrite the prompt before generation.
    pub prompt_optimizer: bool,
}

impl ImageRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            width: IMAGE_SIZE,
            height: IMAGE_SIZE,
            n: 1,
            response_format: "url".to_string(),
            prompt_optimizer: true,
        }
    }
}

/// Abstraction over image providers.
///
/// Implementations return the URL of the first generated image. Anything
/// that is not a usable URL must come back as an error so the caller can
/// retry it.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(
        &self,
        client: &Client,
        base_url: &str,
        request: &ImageRequest,
    ) -> Result<String>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Retry policy for one panel: attempt count, backoff between attempts,
/// and the bound on each individual attempt.
#[derive(Debug, Clone)]
pub struct ImageRetryPolicy {
    pub backoff: BackoffConfig,
    pub attempt_timeout: Duration,
}

impl Default for ImageRetryPolicy {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::panel_images(),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl ImageRetryPolicy {
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.backoff.max_attempts()
    }
}
