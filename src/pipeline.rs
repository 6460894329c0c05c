//! Request orchestration: story stage, then image stage, tracked in the ledger.
//!
//! ```text
//! submit(brief) ──validate──► ledger.create ──spawn──► run(id, brief)
//!                                                        │
//!   pending ─► generating_story ─► generating_images ─► completed
//!        └──────────────┴──────────────────┴──────────► error
//! ```
//!
//! `submit` returns as soon as the request is admitted. The spawned task is
//! the single writer for its ledger entry until it reaches a terminal state.

use crate::{
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    image::PanelImageGenerator,
    ledger::RequestLedger,
    llm_call::StoryCall,
    payload::Payload,
    types::{ComicBrief, ComicResult, RequestId, RequestStatus},
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// An admitted request and the task driving it.
#[derive(Debug)]
pub struct Submission {
    pub id: RequestId,
    /// Resolves to the terminal status once the request finishes.
    pub handle: JoinHandle<RequestStatus>,
}

/// Composes the story and image stages and drives tracked requests through
/// their lifecycle.
///
/// Cheap to clone; clones share the context, ledger, and stages.
#[derive(Clone)]
pub struct ComicPipeline {
    ctx: Arc<ExecCtx>,
    ledger: Arc<RequestLedger>,
    story: Arc<StoryCall>,
    images: Arc<PanelImageGenerator>,
}

impl std::fmt::Debug for ComicPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComicPipeline")
            .field("ctx", &self.ctx)
            .field("story", &self.story.name())
            .field("images", &self.images.name())
            .finish()
    }
}

impl ComicPipeline {
    pub fn new(ctx: ExecCtx, ledger: Arc<RequestLedger>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            ledger,
            story: Arc::new(StoryCall::new()),
            images: Arc::new(PanelImageGenerator::new()),
        }
    }

    pub fn with_story_stage(mut self, story: StoryCall) -> Self {
        self.story = Arc::new(story);
        self
    }

    pub fn with_image_stage(mut self, images: PanelImageGenerator) -> Self {
        self.images = Arc::new(images);
        self
    }

    pub fn ledger(&self) -> &Arc<RequestLedger> {
        &self.ledger
    }

    pub fn ctx(&self) -> &ExecCtx {
        &self.ctx
    }

    /// Validate and admit a brief, then run it in the background.
    ///
    /// A brief that fails validation is rejected before any ledger entry is
    /// allocated. Must be called from within a tokio runtime.
    pub async fn submit(&self, brief: ComicBrief) -> Result<Submission> {
        brief.validate()?;
        let id = self.ledger.create(brief.clone()).await.id;
        tracing::info!(request_id = %id, art_style = %brief.art_style, "comic request accepted");

        let pipeline = self.clone();
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(pipeline.run(id, brief)).catch_unwind().await {
                Ok(status) => status,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(request_id = %id, panic = %message, "pipeline task panicked");
                    pipeline
                        .record_failure(id, format!("internal error: {}", message))
                        .await;
                    RequestStatus::Error
                }
            }
        });

        Ok(Submission { id, handle })
    }

    /// Drive one tracked request to a terminal state and return it.
    ///
    /// Failures are recorded in the ledger rather than returned.
    pub async fn run(&self, id: RequestId, brief: ComicBrief) -> RequestStatus {
        match self.drive(id, brief).await {
            Ok(()) => {
                tracing::info!(request_id = %id, "comic completed");
                RequestStatus::Completed
            }
            Err(e) => {
                tracing::error!(request_id = %id, error = %e, "comic generation failed");
                self.record_failure(id, e.to_string()).await;
                RequestStatus::Error
            }
        }
    }

    /// Run both stages without ledger tracking.
    pub async fn generate(&self, brief: ComicBrief) -> Result<ComicResult> {
        brief.validate()?;
        let story = self.story.invoke(&self.ctx, brief).await?.into_value();
        Ok(self.images.invoke(&self.ctx, story).await?.into_value())
    }

    async fn drive(&self, id: RequestId, brief: ComicBrief) -> Result<()> {
        self.advance(id, RequestStatus::GeneratingStory).await?;
        let story = self.story.invoke(&self.ctx, brief).await?;
        if let Some(reason) = story.fallback_reason() {
            tracing::warn!(request_id = %id, reason, "continuing with fallback story");
        }

        self.advance(id, RequestStatus::GeneratingImages).await?;
        let result = self.images.invoke(&self.ctx, story.into_value()).await?;
        if let Some(reason) = result.fallback_reason() {
            tracing::warn!(request_id = %id, reason, "comic has missing panels");
        }

        let from = self.ledger.complete(id, result.into_value()).await?;
        self.status_changed(id, from, RequestStatus::Completed);
        Ok(())
    }

    async fn advance(&self, id: RequestId, next: RequestStatus) -> Result<()> {
        let from = self.ledger.transition(id, next).await?;
        self.status_changed(id, from, next);
        Ok(())
    }

    async fn record_failure(&self, id: RequestId, message: String) {
        match self.ledger.fail(id, message).await {
            Ok(from) => self.status_changed(id, from, RequestStatus::Error),
            Err(e) => tracing::warn!(request_id = %id, error = %e, "could not record failure"),
        }
    }

    fn status_changed(&self, id: RequestId, from: RequestStatus, to: RequestStatus) {
        tracing::debug!(request_id = %id, %from, %to, "status changed");
        emit(
            &self.ctx.event_handler,
            Event::StatusChanged {
                request_id: id,
                from,
                to,
            },
        );
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
