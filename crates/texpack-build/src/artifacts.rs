use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// A file copied into an archive.
#[derive(Debug, Clone)]
pub struct FileArtifact {
    pub path: PathBuf,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// SHA-256 of the content, hex encoded. `None` when the file cannot be read.
    pub fn fingerprint(&self) -> Option<String> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                Some(hex::encode(hasher.finalize()))
            }
            Err(e) => {
                log::warn!("Cannot fingerprint {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
