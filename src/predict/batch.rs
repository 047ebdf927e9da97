use super::{BatchSummary, label};
use crate::{
    Error, Result,
    artifacts::ArtifactStore,
    model::ModelHolder,
    table::{Table, Value, codec},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Uploads are accepted on their declared name alone, before any content
/// is read. The suffix check is case-sensitive.
pub fn ensure_csv_filename(filename: &str) -> Result<()> {
    if filename.ends_with(".csv") {
        Ok(())
    } else {
        Err(Error::unsupported_media_type("Only CSV uploads are supported"))
    }
}

/// Out-of-range thresholds are used as given; NaN cannot be compared.
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_nan() {
        return Err(Error::bad_request("threshold must be a number"));
    }
    Ok(threshold)
}

/// Appends `y_proba` and `y_pred` to the table. All rows are scored in
/// one call; any scoring failure rejects the whole table.
pub fn annotate(model: &ModelHolder, mut table: Table, threshold: f64) -> Result<Table> {
    let probabilities = model.score_proba(&table).map_err(|e| match e {
        Error::Scoring(msg) => Error::bad_request(format!("Prediction error: {msg}")),
        other => other,
    })?;

    let labels = probabilities
        .iter()
        .map(|&p| Value::Int(i64::from(label(p, threshold))))
        .collect();
    table.set_column(
        "y_proba",
        probabilities.into_iter().map(Value::Float).collect(),
    )?;
    table.set_column("y_pred", labels)?;
    Ok(table)
}

/// Parses, scores and persists one uploaded CSV.
pub async fn predict_batch(
    model: &Arc<ModelHolder>,
    store: &ArtifactStore,
    contents: Vec<u8>,
    threshold: f64,
) -> Result<BatchSummary> {
    if !model.is_loaded() {
        return Err(Error::ServiceUnavailable);
    }
    let threshold = validate_threshold(threshold)?;

    let model = Arc::clone(model);
    let (output, rows) = tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, usize)> {
        let table = codec::read_table(&contents)?;
        debug!(
            "Parsed upload: {} rows, {} columns",
            table.len(),
            table.columns().len()
        );
        let rows = table.len();
        let annotated = annotate(&model, table, threshold)?;
        Ok((codec::write_table(&annotated)?, rows))
    })
    .await
    .map_err(|e| Error::internal(format!("batch scoring task failed: {e}")))??;

    let predictions_file = store.create(&output).await?;
    info!(
        "Batch prediction written to {} ({} rows, threshold {})",
        predictions_file, rows, threshold
    );

    Ok(BatchSummary {
        predictions_file,
        rows,
    })
}
