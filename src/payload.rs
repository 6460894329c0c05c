//! Stage trait and outcome types.
//!
//! Each pipeline stage implements [`Payload`]: it takes a typed input, runs
//! against an [`ExecCtx`], and returns a [`StageOutcome`]. Recoverable
//! problems (a malformed story, a panel that never got an image) are reported
//! as [`StageOutcome::Fallback`]; only unrecoverable ones come back as `Err`.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use std::future::Future;
use std::pin::Pin;

/// A boxed, pinned, Send future -- the return type of [`Payload::invoke`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a stage that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    /// The stage produced its output as intended.
    Complete(T),
    /// The stage recovered locally and substituted or degraded its output.
    Fallback {
        value: T,
        /// Why the stage had to fall back.
        reason: String,
    },
}

impl<T> StageOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Complete(value) => value,
            StageOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageOutcome::Complete(value) => value,
            StageOutcome::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StageOutcome::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            StageOutcome::Complete(_) => None,
            StageOutcome::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        match self {
            StageOutcome::Complete(value) => StageOutcome::Complete(f(value)),
            StageOutcome::Fallback { value, reason } => StageOutcome::Fallback {
                value: f(value),
                reason,
            },
        }
    }
}

/// A pipeline stage.
///
/// Stages are composed explicitly by [`ComicPipeline`](crate::pipeline::ComicPipeline);
/// they share no state beyond the [`ExecCtx`] they are invoked with.
pub trait Payload: Send + Sync {
    type Input: Send;
    type Output: Send;

    /// Stable identifier for the stage type (e.g. `"llm-call"`, `"panel-images"`).
    fn kind(&self) -> &'static str;

    /// Instance name (for logging/events).
    fn name(&self) -> &str;

    /// Execute the stage.
    fn invoke<'a>(
        &'a self,
        ctx: &'a ExecCtx,
        input: Self::Input,
    ) -> BoxFut<'a, Result<StageOutcome<Self::Output>>>;
}
