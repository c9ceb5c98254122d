//! Speed test endpoints.
//!
//! GET      /test/ping                  - liveness, used as the latency timing target
//! POST/GET /test/download/{size_mb}    - stream `size_mb` MiB of random data
//! POST     /test/upload/{size_mb}      - drain the request body and report throughput
//! GET      /test/rating                - classify a measured value
//!
//! Download and upload accept `?websocket_id=<client id>`; when present,
//! progress is pushed to that client's session channel.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use speedtest_common::models::{TestType, UploadReport};
use speedtest_common::rating::Rating;
use speedtest_common::stats::format_bytes;

use crate::api::ApiError;
use crate::consumer::ThroughputConsumer;
use crate::generator::ThroughputGenerator;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/download/{size_mb}", post(download).get(download))
        .route(
            "/upload/{size_mb}",
            post(upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/rating", get(rating))
}

#[derive(Debug, Default, Deserialize)]
pub struct TestQuery {
    pub websocket_id: Option<String>,
}

impl TestQuery {
    /// Client id to report progress to; blank ids are treated as absent.
    fn client_id(self) -> Option<String> {
        self.websocket_id.filter(|id| !id.trim().is_empty())
    }
}

fn test_bytes(state: &AppState, size_mb: u64) -> Result<u64, ApiError> {
    let limits = &state.config().throughput;
    limits.test_bytes(size_mb).ok_or_else(|| {
        ApiError::bad_request(format!(
            "size_mb must be at most {} (got {size_mb})",
            limits.max_size_mb
        ))
    })
}

// ── Ping ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PingResponse {
    /// Unix time in nanoseconds.
    pub timestamp: u64,
    pub status: &'static str,
}

async fn ping() -> Json<PingResponse> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    Json(PingResponse {
        timestamp: u64::try_from(nanos).unwrap_or(u64::MAX),
        status: "pong",
    })
}

// ── Download ────────────────────────────────────────────────────────

async fn download(
    State(state): State<AppState>,
    Path(size_mb): Path<u64>,
    Query(query): Query<TestQuery>,
) -> Result<Response, ApiError> {
    let total_bytes = test_bytes(&state, size_mb)?;
    let client_id = query.client_id();
    tracing::info!(
        size_mb,
        size = %format_bytes(total_bytes),
        client_id = client_id.as_deref().unwrap_or("-"),
        "download test started"
    );

    let generator = ThroughputGenerator::new(
        total_bytes,
        state.config().throughput.chunk_size,
        client_id,
        state.progress().clone(),
    );
    let content_length = generator.total_bytes();
    let body = Body::from_stream(generator.into_stream());

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

// ── Upload ──────────────────────────────────────────────────────────

async fn upload(
    State(state): State<AppState>,
    Path(size_mb): Path<u64>,
    Query(query): Query<TestQuery>,
    body: Body,
) -> Result<Json<UploadReport>, ApiError> {
    let declared_bytes = test_bytes(&state, size_mb)?;
    let client_id = query.client_id();
    tracing::info!(
        size_mb,
        client_id = client_id.as_deref().unwrap_or("-"),
        "upload test started"
    );

    let consumer = ThroughputConsumer::new(declared_bytes, client_id, state.progress().clone());
    let report = consumer
        .consume(body.into_data_stream())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "upload body failed");
            ApiError::bad_request(format!("upload interrupted: {e}"))
        })?;
    Ok(Json(report))
}

// ── Rating ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RatingQuery {
    pub value: f64,
    pub test_type: TestType,
}

async fn rating(query: Result<Query<RatingQuery>, QueryRejection>) -> Result<Json<Rating>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if !query.value.is_finite() {
        return Err(ApiError::bad_request("value must be a finite number"));
    }
    Ok(Json(Rating::classify(query.value, query.test_type)))
}
