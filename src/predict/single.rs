use super::{DEFAULT_THRESHOLD, PredictionRequest, PredictionResult};
use crate::{Error, Result, model::ModelHolder};
use tracing::debug;

/// Scores one validated record against the 0.5 cutoff.
pub fn predict_one(model: &ModelHolder, request: &PredictionRequest) -> Result<PredictionResult> {
    if !model.is_loaded() {
        return Err(Error::ServiceUnavailable);
    }

    let table = request.to_table()?;
    let probabilities = model.score_proba(&table).map_err(|e| match e {
        Error::Scoring(msg) => Error::BadRequest(msg),
        other => other,
    })?;
    let y_proba = probabilities
        .first()
        .copied()
        .ok_or_else(|| Error::internal("model returned no probability"))?;

    debug!("Single prediction scored: {:.4}", y_proba);
    Ok(PredictionResult::new(y_proba, DEFAULT_THRESHOLD))
}
