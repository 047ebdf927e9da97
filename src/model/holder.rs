use super::{Pipeline, Scorer};
use crate::{Error, Result, table::Table};
use std::path::Path;
use tracing::{info, warn};

/// Process-wide handle on the loaded model.
///
/// Built once at startup and shared read-only by every request. An empty
/// holder keeps the service up: health checks still answer, scoring fails
/// with [`Error::ServiceUnavailable`].
pub struct ModelHolder {
    scorer: Option<Box<dyn Scorer>>,
}

impl ModelHolder {
    /// Loads the pipeline at `path`. Load failures are logged, not returned.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Pipeline::from_file(path).await {
            Ok(pipeline) => {
                info!(
                    "Model loaded from {} ({} features)",
                    path.display(),
                    pipeline.features.len()
                );
                Self::from_scorer(pipeline)
            }
            Err(e) => {
                warn!(
                    "Model load error, scoring disabled: {}: {}",
                    path.display(),
                    e
                );
                Self::empty()
            }
        }
    }

    pub fn from_scorer(scorer: impl Scorer + 'static) -> Self {
        Self {
            scorer: Some(Box::new(scorer)),
        }
    }

    pub fn empty() -> Self {
        Self { scorer: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.scorer.is_some()
    }

    pub fn score_proba(&self, table: &Table) -> Result<Vec<f64>> {
        let scorer = self.scorer.as_ref().ok_or(Error::ServiceUnavailable)?;
        let probabilities = scorer.predict_proba(table)?;

        if probabilities.len() != table.len() {
            return Err(Error::scoring(format!(
                "model returned {} probabilities for {} rows",
                probabilities.len(),
                table.len()
            )));
        }
        Ok(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::MockScorer, table::Value};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn one_row() -> Table {
        Table::single_row([("age", Value::Int(40))]).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_leaves_holder_empty() {
        let temp_dir = TempDir::new().unwrap();
        let holder = ModelHolder::load(temp_dir.path().join("absent.json")).await;

        assert!(!holder.is_loaded());
        assert!(matches!(
            holder.score_proba(&one_row()),
            Err(Error::ServiceUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file_leaves_holder_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        tokio::fs::write(&path, b"\x80\x04\x95 not a pipeline").await.unwrap();

        assert!(!ModelHolder::load(&path).await.is_loaded());
    }

    #[tokio::test]
    async fn test_valid_file_loads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");
        tokio::fs::write(
            &path,
            r#"{"intercept": 0.0, "features": [
                {"kind": "numeric", "name": "age", "mean": 40.0, "scale": 10.0, "coef": 1.0, "impute": 40.0}
            ]}"#,
        )
        .await
        .unwrap();

        let holder = ModelHolder::load(&path).await;
        assert!(holder.is_loaded());
        let probabilities = holder.score_proba(&one_row()).unwrap();
        assert_eq!(probabilities, vec![0.5]);
    }

    #[test]
    fn test_scorer_error_passes_through() {
        let mut scorer = MockScorer::new();
        scorer
            .expect_predict_proba()
            .times(1)
            .returning(|_| Err(Error::scoring("columns are missing: {balance}")));

        let holder = ModelHolder::from_scorer(scorer);
        let err = holder.score_proba(&one_row()).unwrap_err();
        assert_eq!(err.to_string(), "columns are missing: {balance}");
    }

    #[test]
    fn test_row_count_mismatch_is_a_scoring_error() {
        let mut scorer = MockScorer::new();
        scorer
            .expect_predict_proba()
            .returning(|_| Ok(vec![0.1, 0.2]));

        let holder = ModelHolder::from_scorer(scorer);
        assert!(matches!(
            holder.score_proba(&one_row()),
            Err(Error::Scoring(_))
        ));
    }
}
