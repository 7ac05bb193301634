use crate::error::ResolveError;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Source of file contents for the graph builder.
pub trait TextReader: fmt::Debug {
    fn read(&self, path: &Path) -> Result<String, ResolveError>;
}

/// Reads from the local file system; non-UTF-8 content is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl TextReader for FsReader {
    fn read(&self, path: &Path) -> Result<String, ResolveError> {
        let bytes = std::fs::read(path).map_err(|e| ResolveError::FileUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|e| ResolveError::FileUnavailable {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8 (at byte {})", e.utf8_error().valid_up_to()),
        })
    }
}

/// In-memory overlay over another reader, for unsaved buffers and tests.
#[derive(Debug)]
pub struct OverlayReader<R> {
    inner: R,
    files: HashMap<PathBuf, String>,
}

impl<R: TextReader> OverlayReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            files: HashMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl<R: TextReader> TextReader for OverlayReader<R> {
    fn read(&self, path: &Path) -> Result<String, ResolveError> {
        match self.files.get(path) {
            Some(text) => Ok(text.clone()),
            None => self.inner.read(path),
        }
    }
}
