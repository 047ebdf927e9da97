//! The propensity model as seen by the service: something that turns a
//! table into positive-class probabilities.

mod holder;
mod pipeline;

pub use holder::ModelHolder;
pub use pipeline::{Feature, Pipeline};

use crate::{Result, table::Table};

#[cfg_attr(test, mockall::automock)]
pub trait Scorer: Send + Sync {
    /// Positive-class probability for every row, in row order.
    fn predict_proba(&self, table: &Table) -> Result<Vec<f64>>;
}
