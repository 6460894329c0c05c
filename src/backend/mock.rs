//! Mock text-generation backend for testing without a live provider.
//!
//! # Example
//!
//! ```
//! use comic_pipeline::backend::MockBackend;
//!
//! let mock = MockBackend::fixed(r#"{"title": "t", "panels": []}"#);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;

/// A test backend that plays back scripted replies in order.
///
/// `Ok(text)` entries are returned as responses, `Err(status)` entries as
/// [`PipelineError::HttpError`]. Cycles back to the beginning when all
/// entries have been consumed. Every prompt received is recorded.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<std::result::Result<String, u16>>,
    index: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create a mock backend with the given canned responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock with a mix of successes and HTTP failures.
    pub fn scripted(replies: Vec<std::result::Result<String, u16>>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock that always fails with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self::scripted(vec![Err(status)])
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self) -> std::result::Result<String, u16> {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        self.prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.prompt.clone());

        match self.next_reply() {
            Ok(text) => Ok(LlmResponse {
                text,
                status: 200,
                metadata: None,
            }),
            Err(status) => Err(PipelineError::HttpError {
                status,
                body: "mock failure".to_string(),
                retry_after: None,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
