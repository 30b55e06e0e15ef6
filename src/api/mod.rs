//! HTTP API
//!
//! - `GET /` - health check
//! - `POST /data/fetch-and-save` - run one ingestion on demand
//! - `GET /data/all` - most recent stored records

use crate::pipeline::db::{RecordGateway, RECENT_LIMIT};
use crate::pipeline::error::PipelineError;
use crate::pipeline::ingestion::PipelineFactory;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

const INTERNAL_ERROR_DETAIL: &str = "internal server error while processing the request";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Clone)]
pub struct AppState {
    factory: Arc<PipelineFactory>,
}

impl AppState {
    pub fn new(factory: Arc<PipelineFactory>) -> Self {
        Self { factory }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/data/fetch-and-save", post(fetch_and_save_handler))
        .route("/data/all", get(all_records_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "message": "API is up. POST /data/fetch-and-save to ingest, GET /data/all to read." }))
}

async fn fetch_and_save_handler(State(state): State<AppState>) -> Response {
    let result = match state.factory.build().await {
        Ok(orchestrator) => orchestrator.run().await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) if outcome.is_success() => Json(outcome).into_response(),
        Ok(outcome) => error_response(StatusCode::BAD_REQUEST, outcome.message),
        Err(e) => internal_error("/data/fetch-and-save", e),
    }
}

async fn all_records_handler(State(state): State<AppState>) -> Response {
    let records = match state.factory.gateway().await {
        Ok(gateway) => gateway.find_recent(RECENT_LIMIT).await,
        Err(e) => Err(e),
    };

    match records {
        Ok(records) if records.is_empty() => {
            error_response(StatusCode::NOT_FOUND, "no records found in the store")
        }
        Ok(records) => Json(records).into_response(),
        Err(e) => internal_error("/data/all", e),
    }
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { detail: detail.into() })).into_response()
}

/// Log the cause, answer with a generic 500
fn internal_error(route: &str, error: PipelineError) -> Response {
    if error.is_config() {
        log::error!("❌ Environment error on {}: {}", route, error);
    } else {
        log::error!("❌ Fatal error on {}: {}", route, error);
    }
    error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL)
}
