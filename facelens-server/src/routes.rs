//! HTTP routes over the analysis store.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use log::error;
use serde::{Deserialize, Serialize};

use facelens_core::RefinedFace;
use facelens_store::{AnalysisStore, NewAnalysis, StoreError};

/// Shared router state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AnalysisStore>,
    pub default_recent_limit: usize,
}

/// Wire shape of image dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Request body for creating an analysis.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub image_file_name: String,
    pub image_dimensions: Dimensions,
    pub detected_faces: Vec<RefinedFace>,
    #[serde(default)]
    pub processing_time: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyses", get(list_analyses).post(create_analysis))
        .route("/api/analyses/:id", get(analysis_by_id))
        .with_state(state)
}

async fn create_analysis(
    State(state): State<AppState>,
    Json(body): Json<CreateAnalysisRequest>,
) -> Response {
    let new = NewAnalysis {
        image_file_name: body.image_file_name,
        width: body.image_dimensions.width,
        height: body.image_dimensions.height,
        faces: body.detected_faces,
        processing_time: body.processing_time,
    };

    match state.store.create_analysis(new) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn list_analyses(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(state.default_recent_limit);
    match state.store.recent_analyses(limit) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn analysis_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.analysis_by_id(&id) {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "Analysis not found".to_string(),
            }),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::Invalid(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message })).into_response()
        }
        other => {
            error!("store operation failed: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "internal error".to_string(),
                }),
            )
                .into_response()
        }
    }
}
