use super::Scorer;
use crate::{
    Error, Result,
    table::{Table, Value},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

/// Serialized scoring pipeline: per-column preprocessing feeding a
/// logistic regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub intercept: f64,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    /// Standardized numeric column; missing values take `impute`.
    Numeric {
        name: String,
        mean: f64,
        scale: f64,
        coef: f64,
        impute: f64,
    },
    /// One-hot encoded column. Unknown categories contribute nothing.
    Categorical {
        name: String,
        weights: HashMap<String, f64>,
        #[serde(default)]
        impute: Option<String>,
    },
}

impl Feature {
    pub fn name(&self) -> &str {
        match self {
            Self::Numeric { name, .. } | Self::Categorical { name, .. } => name,
        }
    }

    fn contribution(&self, value: &Value) -> Result<f64> {
        match self {
            Self::Numeric {
                mean,
                scale,
                coef,
                impute,
                ..
            } => {
                let x = value.as_number()?.unwrap_or(*impute);
                Ok(coef * (x - mean) / scale)
            }
            Self::Categorical {
                weights, impute, ..
            } => {
                let category = value
                    .as_category()
                    .map(|c| c.into_owned())
                    .or_else(|| impute.clone());
                Ok(category
                    .and_then(|c| weights.get(&c).copied())
                    .unwrap_or(0.0))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let name = self.name();
        match self {
            Self::Numeric {
                mean,
                scale,
                coef,
                impute,
                ..
            } => {
                if ![mean, scale, coef, impute].iter().all(|v| v.is_finite()) {
                    return Err(Error::invalid_model(format!(
                        "feature {name} has non-finite parameters"
                    )));
                }
                if *scale == 0.0 {
                    return Err(Error::invalid_model(format!(
                        "feature {name} has a zero scale"
                    )));
                }
            }
            Self::Categorical { weights, .. } => {
                if !weights.values().all(|w| w.is_finite()) {
                    return Err(Error::invalid_model(format!(
                        "feature {name} has non-finite weights"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Pipeline {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let pipeline: Self = serde_json::from_slice(bytes)?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(Error::invalid_model("pipeline declares no features"));
        }
        if !self.intercept.is_finite() {
            return Err(Error::invalid_model("intercept is not finite"));
        }
        for (i, feature) in self.features.iter().enumerate() {
            if self.features[..i].iter().any(|f| f.name() == feature.name()) {
                return Err(Error::invalid_model(format!(
                    "feature {} is declared twice",
                    feature.name()
                )));
            }
            feature.validate()?;
        }
        Ok(())
    }

    /// Input columns the pipeline was fit on, in declaration order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(Feature::name)
    }

    fn logit(&self, row: &[Value], indices: &[usize]) -> Result<f64> {
        let mut z = self.intercept;
        for (feature, &idx) in self.features.iter().zip(indices) {
            z += feature.contribution(&row[idx])?;
        }
        Ok(z)
    }
}

impl Scorer for Pipeline {
    fn predict_proba(&self, table: &Table) -> Result<Vec<f64>> {
        let mut indices = Vec::with_capacity(self.features.len());
        let mut missing = Vec::new();
        for name in self.feature_names() {
            match table.column_index(name) {
                Some(idx) => indices.push(idx),
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Err(Error::scoring(format!(
                "columns are missing: {{{}}}",
                missing.join(", ")
            )));
        }

        table
            .rows()
            .iter()
            .map(|row| self.logit(row, &indices).map(logistic))
            .collect()
    }
}

fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const PIPELINE_JSON: &str = r#"{
        "intercept": -1.0,
        "features": [
            {"kind": "numeric", "name": "age", "mean": 40.0, "scale": 10.0, "coef": 0.5, "impute": 40.0},
            {"kind": "categorical", "name": "housing", "weights": {"yes": -0.5, "no": 0.5}, "impute": "yes"},
            {"kind": "categorical", "name": "poutcome", "weights": {"success": 2.0}}
        ]
    }"#;

    fn pipeline() -> Pipeline {
        Pipeline::from_slice(PIPELINE_JSON.as_bytes()).unwrap()
    }

    fn table(rows: Vec<Vec<Value>>) -> Table {
        let mut table = Table::new(
            ["age", "housing", "poutcome", "extra"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        for row in rows {
            table.push_row(row).unwrap();
        }
        table
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_scores_rows_in_order() {
        let rows = vec![
            vec![Value::Int(40), "no".into(), "success".into(), Value::Null],
            vec![Value::Float(60.0), "yes".into(), Value::Null, "x".into()],
        ];
        let probabilities = pipeline().predict_proba(&table(rows)).unwrap();

        // -1 + 0 + 0.5 + 2 = 1.5
        assert_close(probabilities[0], logistic(1.5));
        // -1 + 1 - 0.5 + 0 = -0.5
        assert_close(probabilities[1], logistic(-0.5));
    }

    #[test]
    fn test_missing_values_are_imputed() {
        let rows = vec![vec![Value::Null, Value::Null, Value::Null, Value::Null]];
        let probabilities = pipeline().predict_proba(&table(rows)).unwrap();

        // -1 + 0 - 0.5 + 0
        assert_close(probabilities[0], logistic(-1.5));
    }

    #[test]
    fn test_numeric_text_is_parsed() {
        let rows = vec![vec!["50".into(), "maybe".into(), "other".into(), Value::Null]];
        let probabilities = pipeline().predict_proba(&table(rows)).unwrap();

        // unknown categories contribute nothing: -1 + 0.5
        assert_close(probabilities[0], logistic(-0.5));
    }

    #[test]
    fn test_missing_columns_reported() {
        let input = Table::single_row([("age", Value::Int(30))]).unwrap();
        let err = pipeline().predict_proba(&input).unwrap_err();

        assert!(matches!(err, Error::Scoring(_)));
        assert_eq!(err.to_string(), "columns are missing: {housing, poutcome}");
    }

    #[test]
    fn test_non_numeric_text_rejected() {
        let rows = vec![vec!["forty".into(), "yes".into(), Value::Null, Value::Null]];
        let err = pipeline().predict_proba(&table(rows)).unwrap_err();

        assert_eq!(
            err.to_string(),
            "could not convert string to float: 'forty'"
        );
    }

    #[test]
    fn test_infinite_input_rejected() {
        let rows = vec![
            vec![Value::Int(30), "yes".into(), Value::Null, Value::Null],
            vec!["inf".into(), "yes".into(), Value::Null, Value::Null],
        ];
        let err = pipeline().predict_proba(&table(rows)).unwrap_err();

        assert!(matches!(err, Error::Scoring(_)));
        assert_eq!(err.to_string(), "input contains infinity");
    }

    #[test]
    fn test_probabilities_stay_in_unit_interval() {
        let rows = vec![
            vec![Value::Float(1e12), "no".into(), "success".into(), Value::Null],
            vec![Value::Float(-1e12), "yes".into(), Value::Null, Value::Null],
        ];
        for p in pipeline().predict_proba(&table(rows)).unwrap() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_empty_table_scores_nothing() {
        let probabilities = pipeline().predict_proba(&table(vec![])).unwrap();
        assert!(probabilities.is_empty());
    }

    #[rstest]
    #[case(r#"{"intercept": 0.0, "features": []}"#)]
    #[case(r#"{"intercept": 0.0, "features": [
        {"kind": "numeric", "name": "age", "mean": 0.0, "scale": 0.0, "coef": 1.0, "impute": 0.0}
    ]}"#)]
    #[case(r#"{"intercept": 0.0, "features": [
        {"kind": "categorical", "name": "job", "weights": {}},
        {"kind": "categorical", "name": "job", "weights": {}}
    ]}"#)]
    #[case(r#"{"intercept": 0.0, "features": [{"kind": "tree", "name": "age"}]}"#)]
    #[case("not json")]
    fn test_invalid_pipelines_rejected(#[case] json: &str) {
        assert!(Pipeline::from_slice(json.as_bytes()).is_err());
    }
}
