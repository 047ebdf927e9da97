use crate::{Error, Result};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

const FILENAME_PREFIX: &str = "predictions_";
const FILENAME_SUFFIX: &str = ".csv";
const ID_LEN: usize = 8;

/// Attempts at finding an unused name before giving up.
const MAX_NAME_ATTEMPTS: usize = 5;

/// `predictions_<8 hex chars>.csv`, drawn from a v4 UUID.
pub fn generate_filename() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{FILENAME_PREFIX}{}{FILENAME_SUFFIX}", &id[..ID_LEN])
}

/// True only for names [`generate_filename`] could have produced.
pub fn is_artifact_name(name: &str) -> bool {
    name.strip_prefix(FILENAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(FILENAME_SUFFIX))
        .is_some_and(|id| {
            id.len() == ID_LEN
                && id
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
}

/// Write-once directory of generated prediction files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens the store, creating its directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("Artifact store ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `contents` under a fresh name and returns that name.
    /// Existing files are never overwritten.
    pub async fn create(&self, contents: &[u8]) -> Result<String> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = generate_filename();
            match self.write_new(&name, contents).await {
                Ok(()) => {
                    debug!("Artifact written: {} ({} bytes)", name, contents.len());
                    return Ok(name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!("Artifact name collision on {}, retrying", name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::internal("could not allocate a unique artifact name"))
    }

    async fn write_new(&self, name: &str, contents: &[u8]) -> std::io::Result<()> {
        let path = self.root.join(name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let written = match file.write_all(contents).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            // Don't leave a truncated artifact behind.
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }
        Ok(())
    }

    /// Reads a stored artifact. Names that are not generated artifact names
    /// are treated as unknown and never touch the filesystem.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        if !is_artifact_name(name) {
            debug!("Rejected artifact lookup for {:?}", name);
            return Err(Error::not_found("File not found"));
        }

        match fs::read(self.root.join(name)).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::not_found("File not found")),
            Err(e) => Err(e.into()),
        }
    }
}
