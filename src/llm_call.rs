//! Story stage: brief in, validated four-panel story out.
//!
//! [`StoryCall`] renders the story prompt, sends it to the text-generation
//! backend (with optional transport backoff from the [`ExecCtx`]), and runs the
//! reply through [`StoryResponseParser`]. A malformed reply is not an error:
//! it becomes the fallback story. Only a failed call or an empty reply is.

use crate::{
    backend::{self, LlmConfig, LlmRequest},
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    parsing::StoryResponseParser,
    payload::{BoxFut, Payload, StageOutcome},
    prompt::StoryPromptBuilder,
    types::{ComicBrief, ComicStory},
    PipelineError,
};

/// The text-generation stage of the pipeline.
///
/// # Example
///
/// ```no_run
/// use comic_pipeline::{ComicBrief, ExecCtx, StoryCall};
/// use comic_pipeline::payload::Payload;
///
/// # async fn run() -> comic_pipeline::Result<()> {
/// let ctx = ExecCtx::builder("https://api.openai.com").openai_with_key("sk-...").build()?;
/// let brief = ComicBrief::new("a knight", "a wizard", "manga");
/// let story = StoryCall::new().invoke(&ctx, brief).await?.into_value();
/// println!("{}", story.title);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StoryCall {
    name: String,
    prompt: StoryPromptBuilder,
    config: LlmConfig,
}

impl StoryCall {
    /// The story call asks for JSON mode, since the reply must be a bare
    /// JSON object.
    pub fn new() -> Self {
        Self {
            name: "story".to_string(),
            prompt: StoryPromptBuilder::new(),
            config: LlmConfig::default().with_json_mode(true),
        }
    }

    /// Replace the prompt builder (e.g. to use a custom template).
    pub fn with_prompt(mut self, prompt: StoryPromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    /// Set the sampling configuration.
    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn build_request(&self, ctx: &ExecCtx, brief: &ComicBrief) -> LlmRequest {
        LlmRequest {
            model: ctx.llm_model.clone(),
            prompt: self.prompt.build(brief),
            config: self.config.clone(),
        }
    }

    /// Call the backend and return the raw reply text.
    async fn fetch_reply(&self, ctx: &ExecCtx, brief: &ComicBrief) -> Result<String> {
        let request = self.build_request(ctx, brief);

        let mut on_retry = |attempt: u32, delay: std::time::Duration, reason: &str| {
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason,
                "retrying story request"
            );
        };

        let response = backend::with_backoff(
            &ctx.backend,
            &ctx.client,
            &ctx.llm_base_url,
            &request,
            &ctx.backoff,
            Some(&mut on_retry),
        )
        .await
        .map_err(|e| PipelineError::StageFailed {
            stage: self.name.clone(),
            message: e.to_string(),
        })?;

        if response.text.trim().is_empty() {
            return Err(PipelineError::EmptyOutput(format!(
                "{} backend",
                ctx.backend.name()
            )));
        }

        let meta = response.metadata.as_ref();
        tracing::debug!(
            backend = ctx.backend.name(),
            status = response.status,
            chars = response.text.len(),
            model = meta.and_then(|m| m.get("model")).and_then(|v| v.as_str()).unwrap_or("-"),
            total_tokens = ?meta
                .and_then(|m| m.pointer("/usage/total_tokens"))
                .and_then(|v| v.as_u64()),
            "story reply received"
        );
        Ok(response.text)
    }
}

impl Default for StoryCall {
    fn default() -> Self {
        Self::new()
    }
}

impl Payload for StoryCall {
    type Input = ComicBrief;
    type Output = ComicStory;

    fn kind(&self) -> &'static str {
        "llm-call"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        brief: ComicBrief,
    ) -> BoxFut<'a, Result<StageOutcome<ComicStory>>> {
        Box::pin(async move {
            emit(
                &ctx.event_handler,
                Event::StageStart {
                    name: self.name.clone(),
                    kind: self.kind(),
                },
            );

            let raw = match self.fetch_reply(ctx, &brief).await {
                Ok(raw) => raw,
                Err(e) => {
                    emit(
                        &ctx.event_handler,
                        Event::StageEnd {
                            name: self.name.clone(),
                            ok: false,
                        },
                    );
                    return Err(e);
                }
            };

            let outcome = StoryResponseParser::new().parse(&raw);

            if let Some(reason) = outcome.fallback_reason() {
                tracing::warn!(reason, "story reply rejected, using fallback story");
                emit(
                    &ctx.event_handler,
                    Event::StoryFallback {
                        reason: reason.to_string(),
                    },
                );
            }

            emit(
                &ctx.event_handler,
                Event::StageEnd {
                    name: self.name.clone(),
                    ok: true,
                },
            );
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::events::EventLog;
    use crate::parsing::{DEFAULT_ART_STYLE, FALLBACK_TITLE};
    use crate::test_support::{knight_wizard_brief, story_reply};
    use std::sync::Arc;

    fn ctx(backend: Arc<MockBackend>, log: Arc<EventLog>) -> ExecCtx {
        ExecCtx::builder("http://unused")
            .backend(backend)
            .event_handler(log)
            .llm_model("story-model")
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_request_uses_ctx_model_and_prompt() {
        let ctx = ExecCtx::builder("http://unused")
            .llm_model("story-model")
            .build()
            .unwrap();
        let request = StoryCall::new().build_request(&ctx, &knight_wizard_brief());
        assert_eq!(request.model, "story-model");
        assert!(request.prompt.contains("A brave knight"));
        assert!(request.prompt.contains("A wise wizard"));
        assert!(request.prompt.contains("anime manga style"));
        assert!(request.config.json_mode);
    }

    #[tokio::test]
    async fn test_valid_reply_completes() {
        let backend = Arc::new(MockBackend::fixed(story_reply()));
        let log = Arc::new(EventLog::new());
        let outcome = StoryCall::new()
            .invoke(&ctx(backend.clone(), log.clone()), knight_wizard_brief())
            .await
            .unwrap();

        assert!(!outcome.is_fallback());
        let story = outcome.into_value();
        assert_eq!(story.title, "The Quest Begins");
        // reply carries no artStyle
        assert_eq!(story.art_style, DEFAULT_ART_STYLE);
        assert_eq!(story.panels[2].dialogue_text, "");
        assert_eq!(backend.prompts().len(), 1);
        assert!(log
            .events()
            .iter()
            .any(|e| matches!(e, Event::StageEnd { ok: true, .. })));
    }

    #[tokio::test]
    async fn test_reply_without_art_style_gets_default() {
        let backend = Arc::new(MockBackend::fixed(story_reply()));
        let brief = knight_wizard_brief();
        assert_ne!(brief.art_style, DEFAULT_ART_STYLE);
        let story = StoryCall::new()
            .invoke(&ctx(backend, Arc::new(EventLog::new())), brief)
            .await
            .unwrap()
            .into_value();
        assert_eq!(story.art_style, "comic book style");
    }

    #[tokio::test]
    async fn test_malformed_reply_falls_back() {
        let backend = Arc::new(MockBackend::fixed("Sorry, I can't draw comics."));
        let log = Arc::new(EventLog::new());
        let outcome = StoryCall::new()
            .invoke(&ctx(backend, log.clone()), knight_wizard_brief())
            .await
            .unwrap();

        assert!(outcome.is_fallback());
        let story = outcome.into_value();
        assert_eq!(story.title, FALLBACK_TITLE);
        assert_eq!(story.art_style, DEFAULT_ART_STYLE);
        assert!(log
            .events()
            .iter()
            .any(|e| matches!(e, Event::StoryFallback { .. })));
    }

    #[tokio::test]
    async fn test_backend_error_is_fatal() {
        let backend = Arc::new(MockBackend::failing(500));
        let log = Arc::new(EventLog::new());
        let err = StoryCall::new()
            .invoke(&ctx(backend, log.clone()), knight_wizard_brief())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::StageFailed { ref stage, .. } if stage == "story"));
        assert!(err.to_string().contains("HTTP 500"));
        assert!(log
            .events()
            .iter()
            .any(|e| matches!(e, Event::StageEnd { ok: false, .. })));
    }

    #[tokio::test]
    async fn test_empty_reply_is_fatal() {
        let backend = Arc::new(MockBackend::fixed("   \n"));
        let err = StoryCall::new()
            .invoke(&ctx(backend, Arc::new(EventLog::new())), knight_wizard_brief())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyOutput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_backoff_from_ctx() {
        let backend = Arc::new(MockBackend::scripted(vec![Err(503), Ok(story_reply())]));
        let ctx = ExecCtx::builder("http://unused")
            .backend(backend.clone())
            .backoff(crate::backend::BackoffConfig::standard())
            .build()
            .unwrap();
        let outcome = StoryCall::new()
            .invoke(&ctx, knight_wizard_brief())
            .await
            .unwrap();
        assert!(!outcome.is_fallback());
        assert_eq!(backend.prompts().len(), 2);
    }
}
