//! Scriptable image backend for tests and demos.
//!
//! Failures are keyed by a substring of the prompt, so a test can make one
//! panel (identified by its visual description) misbehave while the others
//! succeed.
//!
//! ```
//! use comic_pipeline::image::MockImageBackend;
//!
//! let mock = MockImageBackend::new()
//!     .fail_first("drawbridge", 2)
//!     .always_fail("dragon");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{ImageBackend, ImageRequest};
use crate::error::Result;
use crate::PipelineError;

#[derive(Debug, Clone, Copy)]
enum Behavior {
    FailFirst(usize),
    AlwaysFail,
    Hang,
    Panic,
}

#[derive(Debug)]
struct Rule {
    needle: String,
    behavior: Behavior,
}

/// A test image backend that hands out numbered URLs.
#[derive(Debug, Default)]
pub struct MockImageBackend {
    rules: Vec<Rule>,
    prompts: Mutex<Vec<String>>,
    issued: AtomicUsize,
}

impl MockImageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `times` requests whose prompt contains `needle`.
    pub fn fail_first(self, needle: impl Into<String>, times: usize) -> Self {
        self.rule(needle, Behavior::FailFirst(times))
    }

    /// Fail every request whose prompt contains `needle`.
    pub fn always_fail(self, needle: impl Into<String>) -> Self {
        self.rule(needle, Behavior::AlwaysFail)
    }

    /// Never answer requests whose prompt contains `needle`.
    pub fn hang(self, needle: impl Into<String>) -> Self {
        self.rule(needle, Behavior::Hang)
    }

    /// Panic on requests whose prompt contains `needle`.
    pub fn panic_on(self, needle: impl Into<String>) -> Self {
        self.rule(needle, Behavior::Panic)
    }

    fn rule(mut self, needle: impl Into<String>, behavior: Behavior) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            behavior,
        });
        self
    }

    /// Number of requests received whose prompt contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }

    /// Every prompt received so far, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Record the prompt and return how many times this rule's needle has been seen.
    fn record(&self, prompt: &str) -> Option<(Behavior, usize)> {
        let mut prompts = self
            .prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        prompts.push(prompt.to_string());

        let rule = self.rules.iter().find(|r| prompt.contains(&r.needle))?;
        let seen = prompts.iter().filter(|p| p.contains(&rule.needle)).count();
        Some((rule.behavior, seen))
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    async fn generate(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &ImageRequest,
    ) -> Result<String> {
        let failure = || PipelineError::StageFailed {
            stage: "image".into(),
            message: "mock image failure".into(),
        };

        match self.record(&request.prompt) {
            Some((Behavior::AlwaysFail, _)) => return Err(failure()),
            Some((Behavior::FailFirst(times), seen)) if seen <= times => return Err(failure()),
            Some((Behavior::Hang, _)) => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
            }
            Some((Behavior::Panic, _)) => panic!("mock image backend panicked"),
            _ => {}
        }

        let n = self.issued.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("https://images.example/{}.png", n))
    }

    fn name(&self) -> &'static str {
        "mock-image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(mock: &MockImageBackend, prompt: &str) -> Result<String> {
        mock.generate(&Client::new(), "http://unused", &ImageRequest::new("m", prompt))
            .await
    }

    #[tokio::test]
    async fn test_issues_numbered_urls() {
        let mock = MockImageBackend::new();
        assert_eq!(call(&mock, "a").await.unwrap(), "https://images.example/1.png");
        assert_eq!(call(&mock, "b").await.unwrap(), "https://images.example/2.png");
    }

    #[tokio::test]
    async fn test_fail_first_then_succeed() {
        let mock = MockImageBackend::new().fail_first("bridge", 2);
        assert!(call(&mock, "the bridge").await.is_err());
        assert!(call(&mock, "other").await.is_ok());
        assert!(call(&mock, "the bridge").await.is_err());
        assert!(call(&mock, "the bridge").await.is_ok());
        assert_eq!(mock.calls_matching("bridge"), 3);
    }

    #[tokio::test]
    async fn test_always_fail() {
        let mock = MockImageBackend::new().always_fail("dragon");
        for _ in 0..5 {
            assert!(call(&mock, "a dragon").await.is_err());
        }
        assert_eq!(mock.calls_matching("dragon"), 5);
    }
}
