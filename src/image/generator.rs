//! The image stage: one illustration per panel, generated concurrently.

use crate::error::Result;
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::image::{ImageRequest, ImageRetryPolicy};
use crate::payload::{BoxFut, Payload, StageOutcome};
use crate::types::{ComicImagePanel, ComicPanel, ComicResult, ComicStory, PANEL_COUNT};
use crate::PipelineError;
use futures::future::join_all;
use std::sync::Arc;

/// Appended to every panel prompt.
pub const COMPOSITION_HINT: &str =
    "Single comic panel, clear composition, expressive characters, no text or speech bubbles.";

/// Generates the four panel images of a story.
///
/// Each panel gets its own retry loop; a panel that exhausts its attempts
/// (or whose task panics) is given an empty `image_url` and never affects
/// the other three. Output order always matches story order.
#[derive(Debug, Clone)]
pub struct PanelImageGenerator {
    name: String,
    policy: ImageRetryPolicy,
}

impl PanelImageGenerator {
    pub fn new() -> Self {
        Self {
            name: "panel-images".to_string(),
            policy: ImageRetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ImageRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ImageRetryPolicy {
        &self.policy
    }

    /// Build the image prompt for one panel.
    pub fn panel_prompt(panel: &ComicPanel, art_style: &str) -> String {
        format!(
            "{} Art style: {}. {}",
            panel.visual_description.trim(),
            art_style.trim(),
            COMPOSITION_HINT
        )
    }

    /// Generate all panels and assemble the result in panel order.
    pub async fn generate(&self, ctx: &ExecCtx, story: ComicStory) -> ComicResult {
        let shared = Arc::new(ctx.clone());

        let handles: Vec<_> = story
            .panels
            .iter()
            .map(|panel| {
                let ctx = shared.clone();
                let policy = self.policy.clone();
                let number = panel.panel_number;
                let prompt = Self::panel_prompt(panel, &story.art_style);
                tokio::spawn(async move { generate_panel(&ctx, &policy, number, prompt).await })
            })
            .collect();

        let mut urls = join_all(handles)
            .await
            .into_iter()
            .zip(1u8..)
            .map(|(joined, number)| {
                joined.unwrap_or_else(|e| {
                    tracing::error!(panel = number, error = %e, "panel task aborted");
                    emit(
                        &ctx.event_handler,
                        Event::PanelFinished {
                            panel: number,
                            ok: false,
                            attempts: 0,
                        },
                    );
                    String::new()
                })
            });

        let result = ComicResult {
            title: story.title,
            art_style: story.art_style,
            panels: story
                .panels
                .map(|panel| ComicImagePanel::new(panel, urls.next().unwrap_or_default())),
        };

        tracing::info!(
            title = %result.title,
            success = result.success_count(),
            total = PANEL_COUNT,
            "panel images generated"
        );
        result
    }
}

impl Default for PanelImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the attempt loop for one panel. Returns `""` when every attempt fails.
async fn generate_panel(
    ctx: &ExecCtx,
    policy: &ImageRetryPolicy,
    panel: u8,
    prompt: String,
) -> String {
    let request = ImageRequest::new(&ctx.image_model, prompt);
    let max_attempts = policy.max_attempts();

    for attempt in 1..=max_attempts {
        emit(&ctx.event_handler, Event::PanelAttempt { panel, attempt });

        let outcome = tokio::time::timeout(
            policy.attempt_timeout,
            ctx.image_backend
                .generate(&ctx.client, &ctx.image_base_url, &request),
        )
        .await;

        let error = match outcome {
            Ok(Ok(url)) if !url.is_empty() => {
                tracing::debug!(panel, attempt, "panel image ready");
                emit(
                    &ctx.event_handler,
                    Event::PanelFinished {
                        panel,
                        ok: true,
                        attempts: attempt,
                    },
                );
                return url;
            }
            Ok(Ok(_)) => PipelineError::EmptyOutput("image backend returned an empty URL".into()),
            Ok(Err(e)) => e,
            Err(_) => PipelineError::Timeout(policy.attempt_timeout),
        };

        if attempt < max_attempts {
            let delay = policy.backoff.delay_for_attempt(attempt - 1);
            tracing::warn!(
                panel,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "panel image attempt failed, retrying"
            );
            emit(
                &ctx.event_handler,
                Event::PanelRetry {
                    panel,
                    attempt: attempt + 1,
                    delay_ms: delay.as_millis() as u64,
                    reason: error.to_string(),
                },
            );
            tokio::time::sleep(delay).await;
        } else {
            tracing::error!(panel, attempts = max_attempts, error = %error, "panel image failed");
        }
    }

    emit(
        &ctx.event_handler,
        Event::PanelFinished {
            panel,
            ok: false,
            attempts: max_attempts,
        },
    );
    String::new()
}

impl Payload for PanelImageGenerator {
    type Input = ComicStory;
    type Output = ComicResult;

    fn kind(&self) -> &'static str {
        "panel-images"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        input: ComicStory,
    ) -> BoxFut<'a, Result<StageOutcome<ComicResult>>> {
        Box::pin(async move {
            emit(
                &ctx.event_handler,
                Event::StageStart {
                    name: self.name.clone(),
                    kind: self.kind(),
                },
            );
            let result = self.generate(ctx, input).await;
            emit(
                &ctx.event_handler,
                Event::StageEnd {
                    name: self.name.clone(),
                    ok: true,
                },
            );
            let missing = PANEL_COUNT - result.success_count();
            if missing == 0 {
                Ok(StageOutcome::Complete(result))
            } else {
                Ok(StageOutcome::Fallback {
                    value: result,
                    reason: format!("{} of {} panels have no image", missing, PANEL_COUNT),
                })
            }
        })
    }
}
