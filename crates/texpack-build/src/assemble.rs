use crate::manifest::{ArchiveManifest, LOCKFILE_NAME};
use anyhow::{Context, Result, bail};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use zip::ZipWriter;
use zip::write::FileOptions;

/// Where an archive is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Directory(PathBuf),
    Zip(PathBuf),
}

impl OutputTarget {
    /// A `.zip` path is a zip file, anything else a directory.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let is_zip = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if is_zip {
            OutputTarget::Zip(path)
        } else {
            OutputTarget::Directory(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::Directory(p) | OutputTarget::Zip(p) => p,
        }
    }

    /// Directory output keeps the lockfile inside; zip output next to the
    /// zip as `<name>.lock.json`.
    pub fn lockfile_path(&self) -> PathBuf {
        match self {
            OutputTarget::Directory(dir) => dir.join(LOCKFILE_NAME),
            OutputTarget::Zip(zip) => zip.with_extension("lock.json"),
        }
    }
}

/// Files written and files skipped because they vanished or were unreadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub fn materialize(manifest: &ArchiveManifest, target: &OutputTarget) -> Result<MaterializeReport> {
    match target {
        OutputTarget::Directory(dir) => materialize_dir(manifest, dir),
        OutputTarget::Zip(path) => write_zip(manifest, path),
    }
}

/// Copies every manifest entry below `dir`, creating parents as needed.
///
/// Nothing already in `dir` is removed. Writing into the project root itself
/// is refused.
pub fn materialize_dir(manifest: &ArchiveManifest, dir: &Path) -> Result<MaterializeReport> {
    if absolute(dir)? == manifest.root {
        bail!(
            "Refusing to write the archive into the project root {}",
            manifest.root.display()
        );
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut report = MaterializeReport::default();
    for entry in &manifest.entries {
        let destination = dir.join(checked_destination(&entry.destination)?);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        match fs::copy(&entry.source, &destination) {
            Ok(_) => report.written.push(entry.destination.clone()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "{} not found and will not be archived: {}",
                    entry.source.display(),
                    e
                );
                report.skipped.push(entry.destination.clone());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to copy {} to {}",
                        entry.source.display(),
                        destination.display()
                    )
                });
            }
        }
    }
    log::info!(
        "Wrote {} files to {}",
        report.written.len(),
        dir.display()
    );
    Ok(report)
}

/// Writes every manifest entry into a new zip file at `path`.
pub fn write_zip(manifest: &ArchiveManifest, path: &Path) -> Result<MaterializeReport> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut report = MaterializeReport::default();
    for entry in &manifest.entries {
        let name = zip_name(checked_destination(&entry.destination)?);
        let bytes = match fs::read(&entry.source) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "{} not found and will not be added to the zip: {}",
                    entry.source.display(),
                    e
                );
                report.skipped.push(entry.destination.clone());
                continue;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", entry.source.display()));
            }
        };
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
        report.written.push(entry.destination.clone());
    }
    zip.finish()
        .with_context(|| format!("Failed to finish {}", path.display()))?;
    log::info!("Wrote {} files to {}", report.written.len(), path.display());
    Ok(report)
}

/// Destinations come from lockfiles too; keep them inside the output.
fn checked_destination(destination: &Path) -> Result<&Path> {
    let escapes = destination
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || destination.as_os_str().is_empty() {
        bail!("Invalid archive destination {}", destination.display());
    }
    Ok(destination)
}

fn zip_name(destination: &Path) -> String {
    destination
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(path)
}
