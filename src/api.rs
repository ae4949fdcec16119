//! Read API over the cache plus the manual refresh trigger.

use crate::cache::CacheStore;
use crate::models::Listing;
use crate::refresh::{RefreshOutcome, SchedulerHandle};
use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub scheduler: SchedulerHandle,
    pub started_at: Instant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: &'static str,
    cached_objects_count: usize,
    last_fetch_time: Option<DateTime<Utc>>,
    /// Seconds since the process started
    uptime: f64,
    refreshing: bool,
    last_attempt_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchBody {
    success: bool,
    message: String,
    last_fetch_time: Option<DateTime<Utc>>,
    cached_objects_count: usize,
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/objects", get(list_objects))
        .route("/api/objects", get(list_objects))
        .route("/data", get(list_objects))
        .route("/status", get(status))
        .route("/fetch", post(fetch))
        .layer(build_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_objects(State(state): State<AppState>) -> Json<Vec<Listing>> {
    tracing::debug!("GET /objects");
    Json(state.cache.read().listings.clone())
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let snapshot = state.cache.read();
    let refresh = state.scheduler.state();

    Json(StatusBody {
        status: "OK",
        cached_objects_count: snapshot.listings.len(),
        last_fetch_time: snapshot.fetched_at,
        uptime: state.started_at.elapsed().as_secs_f64(),
        refreshing: refresh.is_running(),
        last_attempt_time: refresh.last_attempt(),
        last_error: refresh.last_error(),
    })
}

async fn fetch(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Manual refresh requested");
    let result = state.scheduler.trigger().await;
    let snapshot = state.cache.read();

    let (status, success, message) = match result {
        Ok(RefreshOutcome::Committed { count, .. }) => (
            StatusCode::OK,
            true,
            format!("refresh completed with {count} listings"),
        ),
        Ok(RefreshOutcome::AlreadyRunning) => (
            StatusCode::CONFLICT,
            false,
            "refresh already running".to_string(),
        ),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, false, e.to_string()),
    };

    (
        status,
        Json(FetchBody {
            success,
            message,
            last_fetch_time: snapshot.fetched_at,
            cached_objects_count: snapshot.listings.len(),
        }),
    )
}
