//! HTTP surface.
//!
//! | Method | Path                               | Handler                         |
//! |--------|------------------------------------|---------------------------------|
//! | POST   | `/api/generate-comic`              | [`handlers::generate_comic`]    |
//! | GET    | `/api/comic-status/{requestId}`    | [`handlers::comic_status`]      |
//! | GET    | `/api/recent-comics`               | [`handlers::recent_comics`]     |
//! | GET    | `/health`                          | [`handlers::health`]            |

pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::pipeline::ComicPipeline;

pub use error::{AppError, AppResult};

/// Shared state available to all handlers via `State<AppState>`.
///
/// Cheap to clone: the pipeline shares its ledger and context through `Arc`.
#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: ComicPipeline,
}

impl AppState {
    pub fn new(pipeline: ComicPipeline) -> Self {
        Self { pipeline }
    }
}

/// Build the application [`Router`] with its middleware stack.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/generate-comic", post(handlers::generate_comic))
        .route("/comic-status/{request_id}", get(handlers::comic_status))
        .route("/recent-comics", get(handlers::recent_comics));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
