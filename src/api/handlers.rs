//! Handlers for the comic endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::{AppError, AppResult};
use super::AppState;
use crate::parsing::truncate;
use crate::types::{ComicBrief, ComicResult, RequestId, RequestStatus, TrackedRequest};
use crate::PipelineError;

/// Number of requests listed by `GET /api/recent-comics`.
pub const RECENT_LIMIT: usize = 10;

/// Descriptions longer than this are cut in the recent list.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicStatusResponse {
    pub request_id: RequestId,
    pub status: RequestStatus,
    #[serde(flatten)]
    pub brief: ComicBrief,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ComicResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TrackedRequest> for ComicStatusResponse {
    fn from(req: TrackedRequest) -> Self {
        Self {
            request_id: req.id,
            status: req.status,
            brief: req.brief,
            created_at: req.created_at,
            result: req.result.filter(|_| req.status == RequestStatus::Completed),
            error: req.error.filter(|_| req.status == RequestStatus::Error),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentComic {
    pub request_id: RequestId,
    pub character1_description: String,
    pub character2_description: String,
    pub art_style: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub has_result: bool,
}

impl From<TrackedRequest> for RecentComic {
    fn from(req: TrackedRequest) -> Self {
        Self {
            request_id: req.id,
            character1_description: truncate(
                &req.brief.character1_description,
                DESCRIPTION_PREVIEW_CHARS,
            ),
            character2_description: truncate(
                &req.brief.character2_description,
                DESCRIPTION_PREVIEW_CHARS,
            ),
            art_style: req.brief.art_style,
            status: req.status,
            created_at: req.created_at,
            has_result: req.result.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
}

/// POST /api/generate-comic -- admit a brief and start generating.
pub async fn generate_comic(
    State(state): State<AppState>,
    body: Result<Json<ComicBrief>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(brief) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let submission = state.pipeline.submit(brief).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            request_id: submission.id,
            status: RequestStatus::Pending,
            message: "Comic generation started",
        }),
    ))
}

/// GET /api/comic-status/{request_id} -- snapshot of one request.
pub async fn comic_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<ComicStatusResponse>> {
    let id: RequestId = request_id.parse()?;
    let tracked = state
        .pipeline
        .ledger()
        .get(id)
        .await
        .ok_or_else(|| PipelineError::NotFound(request_id))?;
    Ok(Json(tracked.into()))
}

/// GET /api/recent-comics -- newest requests first.
pub async fn recent_comics(State(state): State<AppState>) -> Json<Vec<RecentComic>> {
    let recent = state.pipeline.ledger().list_recent(RECENT_LIMIT).await;
    Json(recent.into_iter().map(RecentComic::from).collect())
}

/// GET /health -- liveness.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
