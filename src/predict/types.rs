use crate::{
    Result,
    table::{Table, Value},
};
use serde::{Deserialize, Serialize};

/// Cutoff used for single predictions and as the batch default.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// One customer record, as the model was trained on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub age: i64,
    #[serde(default)]
    pub job: Option<String>,
    #[serde(default)]
    pub marital: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub housing: Option<String>,
    #[serde(default)]
    pub loan: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub day: Option<i64>,
    #[serde(default)]
    pub month: Option<String>,
    #[serde(default)]
    pub campaign: Option<i64>,
    #[serde(default)]
    pub pdays: Option<i64>,
    #[serde(default)]
    pub previous: Option<i64>,
    #[serde(default)]
    pub poutcome: Option<String>,
}

impl PredictionRequest {
    /// Request with only the required fields set.
    pub fn new(age: i64, balance: f64) -> Self {
        Self {
            age,
            job: None,
            marital: None,
            education: None,
            default: None,
            balance,
            housing: None,
            loan: None,
            contact: None,
            day: None,
            month: None,
            campaign: None,
            pdays: None,
            previous: None,
            poutcome: None,
        }
    }

    /// One-row table with a column per field, in declaration order.
    /// Absent fields become `Null` cells.
    pub fn to_table(&self) -> Result<Table> {
        Table::single_row([
            ("age", Value::from(self.age)),
            ("job", self.job.clone().into()),
            ("marital", self.marital.clone().into()),
            ("education", self.education.clone().into()),
            ("default", self.default.clone().into()),
            ("balance", Value::from(self.balance)),
            ("housing", self.housing.clone().into()),
            ("loan", self.loan.clone().into()),
            ("contact", self.contact.clone().into()),
            ("day", self.day.into()),
            ("month", self.month.clone().into()),
            ("campaign", self.campaign.into()),
            ("pdays", self.pdays.into()),
            ("previous", self.previous.into()),
            ("poutcome", self.poutcome.clone().into()),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub y_proba: f64,
    pub y_pred: u8,
}

impl PredictionResult {
    pub fn new(y_proba: f64, threshold: f64) -> Self {
        Self {
            y_proba,
            y_pred: label(y_proba, threshold),
        }
    }
}

/// 1 iff `probability >= threshold`.
pub fn label(probability: f64, threshold: f64) -> u8 {
    u8::from(probability >= threshold)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub predictions_file: String,
    pub rows: usize,
}
