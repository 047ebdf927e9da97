use super::types::{BatchParams, HealthResponse};
use crate::{
    Error, Result,
    artifacts::ArtifactStore,
    model::ModelHolder,
    predict::{self, BatchSummary, PredictionRequest, PredictionResult},
};
use axum::{
    extract::{
        Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelHolder>,
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    pub fn new(model: ModelHolder, store: ArtifactStore) -> Self {
        Self {
            model: Arc::new(model),
            store: Arc::new(store),
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: state.model.is_loaded(),
    })
}

// Extractors are taken as `Result`s so their rejections go out as `Error`
// bodies rather than axum's plain-text ones.

pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>> {
    let Json(request) = payload?;
    let result = predict::predict_one(&state.model, &request).inspect_err(|e| {
        warn!("Single prediction failed: {}", e);
    })?;
    Ok(Json(result))
}

pub async fn predict_batch(
    State(state): State<AppState>,
    params: std::result::Result<Query<BatchParams>, QueryRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchSummary>> {
    let Query(params) = params?;
    let mut multipart = multipart?;
    if !state.model.is_loaded() {
        return Err(Error::ServiceUnavailable);
    }

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        predict::ensure_csv_filename(&filename)?;

        let contents = field.bytes().await.map_err(multipart_error)?;
        info!(
            "Received batch upload {} ({} bytes, threshold {})",
            filename,
            contents.len(),
            params.threshold
        );

        let summary =
            predict::predict_batch(&state.model, &state.store, contents.to_vec(), params.threshold)
                .await
                .inspect_err(|e| warn!("Batch prediction for {} failed: {}", filename, e))?;
        return Ok(Json(summary));
    }

    Err(Error::MissingField("file".to_string()))
}

pub async fn get_predictions_file(
    State(state): State<AppState>,
    filename: std::result::Result<Path<String>, PathRejection>,
) -> Result<Response> {
    let Path(filename) = filename?;
    let contents = state.store.read(&filename).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        contents,
    )
        .into_response())
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(e.body_text())
    } else {
        Error::bad_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}
