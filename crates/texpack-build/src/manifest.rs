use crate::artifacts::FileArtifact;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use texpack_resolve::{DependencyGraph, DirectiveKind, Warning};

pub const MANIFEST_VERSION: &str = "1";
pub const LOCKFILE_NAME: &str = "texpack.lock.json";

/// One file selected for the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source: PathBuf,
    /// Path inside the archive; relative to the project root.
    pub destination: PathBuf,
    /// Kind of the directive that pulled the file in; `None` for the entry
    /// document and extra files.
    pub kind: Option<DirectiveKind>,
    pub sha256: Option<String>,
}

/// A dependency expected from the target TeX installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemDependency {
    pub kind: DirectiveKind,
    pub name: String,
}

/// The files an archive contains, in discovery order, and the problems seen
/// while finding them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub version: String,
    pub root: PathBuf,
    /// Entry document, relative to `root`.
    pub entry: PathBuf,
    pub entries: Vec<ManifestEntry>,
    pub system: Vec<SystemDependency>,
    pub warnings: Vec<Warning>,
}

impl ArchiveManifest {
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let entries = graph
            .project_files()
            .map(|node| ManifestEntry {
                source: node.path.clone(),
                destination: graph.relative(&node.path).to_path_buf(),
                kind: node.via.as_ref().map(|d| d.kind),
                sha256: FileArtifact::new(&node.path).fingerprint(),
            })
            .collect();
        let system = graph
            .system_dependencies()
            .into_iter()
            .map(|(kind, name)| SystemDependency { kind, name })
            .collect();

        Self {
            version: MANIFEST_VERSION.to_string(),
            root: graph.root().to_path_buf(),
            entry: graph.relative(&graph.entry().path).to_path_buf(),
            entries,
            system,
            warnings: graph.warnings(),
        }
    }

    pub fn contains(&self, destination: &Path) -> bool {
        self.entries.iter().any(|e| e.destination == destination)
    }

    /// Adds `<entry>.bbl` from the project root when present, so the archive
    /// can be rebuilt without running BibTeX. Returns whether it was added.
    pub fn include_bbl(&mut self) -> bool {
        let destination = self.entry.with_extension("bbl");
        if self.contains(&destination) {
            return false;
        }
        let source = self.root.join(&destination);
        if !source.is_file() {
            log::debug!("No {} to include", destination.display());
            return false;
        }
        self.add_bbl(source);
        true
    }

    /// Adds `source` as the archive's `<entry>.bbl`, replacing any earlier one.
    pub fn add_bbl(&mut self, source: PathBuf) {
        let destination = self.entry.with_extension("bbl");
        self.entries.retain(|e| e.destination != destination);
        self.entries.push(ManifestEntry {
            sha256: FileArtifact::new(&source).fingerprint(),
            source,
            destination,
            kind: None,
        });
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write lockfile {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lockfile {}", path.display()))?;
        let manifest: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid lockfile {}", path.display()))?;
        Ok(manifest)
    }

    /// Destinations whose fingerprint differs from `previous`, or that are
    /// new or gone.
    pub fn changed_since(&self, previous: &ArchiveManifest) -> Vec<PathBuf> {
        let mut changed = Vec::new();
        for entry in &self.entries {
            let before = previous
                .entries
                .iter()
                .find(|p| p.destination == entry.destination);
            if before.map(|p| &p.sha256) != Some(&entry.sha256) {
                changed.push(entry.destination.clone());
            }
        }
        for entry in &previous.entries {
            if !self.contains(&entry.destination) {
                changed.push(entry.destination.clone());
            }
        }
        changed
    }
}
