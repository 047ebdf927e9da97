mod batch;
mod single;
mod types;

pub use batch::{ensure_csv_filename, predict_batch, validate_threshold};
pub use single::predict_one;
pub use types::*;
