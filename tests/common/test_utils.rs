use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use propensity_api::{
    artifacts::ArtifactStore,
    model::ModelHolder,
    server::{self, handlers::AppState},
};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

const BOUNDARY: &str = "propensity-test-boundary";

/// Three customers: a likely subscriber, a borderline one, an unlikely one.
pub const SAMPLE_CSV: &str = "\
age,job,marital,education,default,balance,housing,loan,contact,day,month,campaign,pdays,previous,poutcome
25,student,single,tertiary,no,3000,no,no,cellular,5,mar,1,90,2,success
61,retired,married,tertiary,no,1200,no,no,cellular,12,mar,1,-1,0,unknown
38,blue-collar,married,primary,no,150,yes,yes,unknown,20,may,6,-1,0,unknown
";

/// The pipeline shipped with the service.
pub fn champion_pipeline_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("model")
        .join("champion_pipeline.json")
}

/// App backed by the shipped pipeline and a temporary artifact directory.
pub async fn create_test_app() -> (Router, TempDir) {
    let model = ModelHolder::load(champion_pipeline_path()).await;
    assert!(model.is_loaded(), "shipped pipeline failed to load");
    create_app_with_model(model).await
}

/// App whose model could not be loaded.
pub async fn create_unloaded_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let model = ModelHolder::load(temp_dir.path().join("missing.json")).await;
    let (app, artifacts_dir) = create_app_with_model(model).await;
    drop(temp_dir);
    (app, artifacts_dir)
}

pub async fn create_app_with_model(model: ModelHolder) -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = ArtifactStore::open(temp_dir.path().join("predictions"))
        .await
        .unwrap();
    let app = server::router(AppState::new(model, store), MAX_UPLOAD_BYTES);
    (app, temp_dir)
}

/// Files currently in the artifact directory of an app built here.
pub fn artifact_count(temp_dir: &TempDir) -> usize {
    std::fs::read_dir(temp_dir.path().join("predictions"))
        .unwrap()
        .count()
}

/// `multipart/form-data` upload with a single `file` part.
pub fn upload_request(uri: &str, filename: &str, contents: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: text/csv\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Multipart body carrying only a non-file text field.
pub fn upload_request_without_file(uri: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"note\"\r\n\r\n\
         hello\r\n--{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Parses an artifact back into (header, rows).
pub fn parse_csv(bytes: &[u8]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_reader(bytes);
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}
