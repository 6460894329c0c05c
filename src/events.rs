//! Event hooks for request lifecycle and panel generation.
//!
//! Provides an optional, non-intrusive way to observe pipeline execution.
//! Stages emit events when they start and finish, when a request changes
//! status, and for every image attempt and retry. Implement
//! [`EventHandler`] to receive them for progress tracking or tests.

use crate::types::{RequestId, RequestStatus};
use std::sync::Arc;

/// Events emitted during pipeline execution.
#[derive(Debug, Clone)]
pub enum Event {
    /// A tracked request moved to a new lifecycle state.
    StatusChanged {
        request_id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    },
    /// A stage has started executing.
    StageStart {
        /// Instance name of the stage.
        name: String,
        /// Stable type identifier (e.g. `"llm-call"`, `"panel-images"`).
        kind: &'static str,
    },
    /// A stage has finished executing.
    StageEnd {
        name: String,
        /// Whether the stage returned an output (fallbacks count as ok).
        ok: bool,
    },
    /// The story parser substituted the fallback story.
    StoryFallback {
        /// Why validation failed.
        reason: String,
    },
    /// An image request for a panel is about to be sent.
    PanelAttempt {
        /// 1-based panel number.
        panel: u8,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// A panel attempt failed and will be retried after a delay.
    PanelRetry {
        panel: u8,
        /// The attempt that is about to be made (2 or later).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        /// Description of the failure that triggered the retry.
        reason: String,
    },
    /// A panel reached its final outcome.
    PanelFinished {
        panel: u8,
        /// Whether the panel received an image URL.
        ok: bool,
        /// Total attempts made for this panel.
        attempts: u32,
    },
}

/// Handler for pipeline events.
///
/// This is entirely optional -- the pipeline works without an event handler.
///
/// # Example
///
/// ```
/// use comic_pipeline::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::StatusChanged { request_id, to, .. } => println!("{request_id}: {to}"),
///             Event::PanelFinished { panel, ok, .. } => println!("panel {panel} ok={ok}"),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the pipeline emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use comic_pipeline::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::PanelRetry { panel, attempt, .. } = event {
///         eprintln!("retrying panel {panel} (attempt {attempt})");
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

/// Collects every event it receives. Useful in tests and demos.
#[derive(Debug, Default)]
pub struct EventLog {
    events: std::sync::Mutex<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far, in arrival order.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Status transitions recorded for one request, in order.
    pub fn statuses_for(&self, id: RequestId) -> Vec<RequestStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::StatusChanged { request_id, to, .. } if request_id == id => Some(to),
                _ => None,
            })
            .collect()
    }
}

impl EventHandler for EventLog {
    fn on_event(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_without_handler_is_noop() {
        emit(&None, Event::PanelAttempt { panel: 1, attempt: 1 });
    }

    #[test]
    fn test_fn_handler_receives_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handler: Option<Arc<dyn EventHandler>> =
            Some(Arc::new(FnEventHandler(move |_e: Event| {
                seen.fetch_add(1, Ordering::Relaxed);
            })));
        emit(&handler, Event::PanelAttempt { panel: 1, attempt: 1 });
        emit(&handler, Event::PanelFinished { panel: 1, ok: true, attempts: 1 });
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_event_log_filters_statuses_by_request() {
        let log = EventLog::new();
        let a = RequestId::new();
        let b = RequestId::new();
        log.on_event(Event::StatusChanged {
            request_id: a,
            from: RequestStatus::Pending,
            to: RequestStatus::GeneratingStory,
        });
        log.on_event(Event::StatusChanged {
            request_id: b,
            from: RequestStatus::Pending,
            to: RequestStatus::Error,
        });
        assert_eq!(log.statuses_for(a), vec![RequestStatus::GeneratingStory]);
        assert_eq!(log.events().len(), 2);
    }
}
