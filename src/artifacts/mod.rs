mod store;

pub use store::{ArtifactStore, generate_filename, is_artifact_name};
