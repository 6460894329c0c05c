//! # Comic Pipeline
//!
//! Turns a short character/style brief into a finished four-panel comic.
//!
//! A request flows through two stages: a **story stage** that asks a text
//! model for a four-panel script and validates it (substituting a fixed
//! fallback story when the reply is unusable), and an **image stage** that
//! illustrates all four panels concurrently, retrying each panel on its own
//! and leaving a panel blank rather than failing the comic. Every request is
//! tracked in an in-memory ledger through its lifecycle and evicted by age.
//!
//! ## Core Concepts
//!
//! - **[`Payload`]** — a pipeline stage: typed input, typed output, explicit
//!   [`StageOutcome`] (complete or fallback), fatal errors as `Err`.
//! - **[`ExecCtx`]** — shared execution context (HTTP client, text and image
//!   backends, model names, optional event handler).
//! - **[`StoryCall`]** — story stage: prompt, text generation, parsing.
//! - **[`PanelImageGenerator`]** — image stage: four panels in parallel with
//!   bounded retry.
//! - **[`ComicPipeline`]** — composes both stages and drives tracked requests
//!   `pending → generating_story → generating_images → completed | error`.
//! - **[`RequestLedger`]** — the injected in-memory request store.
//!
//! ## Quick Start
//!
//! ```no_run
//! use comic_pipeline::{ComicBrief, ComicPipeline, ExecCtx, RequestLedger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ExecCtx::builder("https://api.openai.com")
//!         .openai_with_key("sk-...")
//!         .image_base_url("https://api.minimax.io")
//!         .minimax_with_key("...")
//!         .build()?;
//!     let pipeline = ComicPipeline::new(ctx, Arc::new(RequestLedger::new()));
//!
//!     let brief = ComicBrief::new("A brave knight", "A wise wizard", "anime manga style")
//!         .with_theme("medieval adventure");
//!     let submission = pipeline.submit(brief).await?;
//!     let status = submission.handle.await?;
//!     println!("{} finished as {}", submission.id, status);
//!     Ok(())
//! }
//! ```

// --- Stages and their building blocks ---
pub mod backend;
pub mod events;
pub mod exec_ctx;
pub mod image;
pub mod llm_call;
pub mod parsing;
pub mod payload;
pub mod prompt;

// --- Request tracking and service ---
pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod retention;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{BackoffConfig, LlmConfig, MockBackend, OpenAiBackend};
pub use error::{PipelineError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use image::{ImageRetryPolicy, MiniMaxBackend, MockImageBackend, PanelImageGenerator};
pub use ledger::RequestLedger;
pub use llm_call::StoryCall;
pub use parsing::StoryResponseParser;
pub use payload::{BoxFut, Payload, StageOutcome};
pub use pipeline::{ComicPipeline, Submission};
pub use prompt::StoryPromptBuilder;
pub use types::{
    ComicBrief, ComicImagePanel, ComicPanel, ComicResult, ComicStory, RequestId, RequestStatus,
    TrackedRequest,
};
