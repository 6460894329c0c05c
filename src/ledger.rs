//! In-memory store of tracked requests.
//!
//! [`RequestLedger`] is the only shared mutable state in the service. Every
//! status change goes through it, so the lifecycle rules in
//! [`RequestStatus::can_transition_to`] are enforced in one place. Readers get
//! cloned snapshots, never references into the map.

use crate::error::Result;
use crate::types::{ComicBrief, ComicResult, RequestId, RequestStatus, TrackedRequest};
use crate::PipelineError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct RequestLedger {
    entries: RwLock<HashMap<RequestId, TrackedRequest>>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new `pending` request created now.
    pub async fn create(&self, brief: ComicBrief) -> TrackedRequest {
        self.create_at(brief, Utc::now()).await
    }

    /// Admit a new `pending` request with an explicit creation time.
    pub async fn create_at(&self, brief: ComicBrief, created_at: DateTime<Utc>) -> TrackedRequest {
        let request = TrackedRequest::new(brief, created_at);
        self.entries
            .write()
            .await
            .insert(request.id, request.clone());
        tracing::debug!(request_id = %request.id, "request admitted");
        request
    }

    pub async fn get(&self, id: RequestId) -> Option<TrackedRequest> {
        self.entries.read().await.get(&id).cloned()
    }

    /// Up to `limit` requests, newest first.
    pub async fn list_recent(&self, limit: usize) -> Vec<TrackedRequest> {
        let entries = self.entries.read().await;
        let mut requests: Vec<TrackedRequest> = entries.values().cloned().collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests.truncate(limit);
        requests
    }

    /// Move a request to `next`. Returns the status it left.
    pub async fn transition(&self, id: RequestId, next: RequestStatus) -> Result<RequestStatus> {
        self.update(id, next, |_| {}).await
    }

    /// Record the result and move the request to `completed`.
    pub async fn complete(&self, id: RequestId, result: ComicResult) -> Result<RequestStatus> {
        self.update(id, RequestStatus::Completed, |entry| {
            entry.result = Some(result)
        })
        .await
    }

    /// Record the error message and move the request to `error`.
    pub async fn fail(&self, id: RequestId, message: impl Into<String>) -> Result<RequestStatus> {
        let message = message.into();
        self.update(id, RequestStatus::Error, |entry| entry.error = Some(message))
            .await
    }

    async fn update(
        &self,
        id: RequestId,
        next: RequestStatus,
        apply: impl FnOnce(&mut TrackedRequest),
    ) -> Result<RequestStatus> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

        let from = entry.status;
        if !from.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition { from, to: next });
        }
        entry.status = next;
        apply(entry);
        Ok(from)
    }

    /// Remove every entry older than `retention` at `now`, whatever its
    /// status. Returns the number removed.
    pub async fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now.signed_duration_since(entry.created_at) <= retention);
        let removed = before - entries.len();

        if removed > 0 {
            tracing::info!(removed, remaining = entries.len(), "evicted expired requests");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
