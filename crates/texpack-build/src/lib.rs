//! Archive Assembler: turns a resolved dependency graph into a minimal,
//! self-contained copy of a LaTeX project.

pub mod artifacts;
pub mod assemble;
pub mod config;
pub mod manifest;
pub mod validate;

pub use artifacts::FileArtifact;
pub use assemble::{materialize, MaterializeReport, OutputTarget};
pub use config::ArchiveConfig;
pub use manifest::{ArchiveManifest, ManifestEntry, SystemDependency};
pub use validate::{CommandBuilder, ExternalBuilder, ValidationReport};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use texpack_resolve::GraphBuilder;

/// Resolves `entry` inside `root` and returns the manifest, writing nothing.
pub fn plan(root: &Path, entry: &Path, config: &ArchiveConfig) -> Result<ArchiveManifest> {
    let graph = GraphBuilder::new(root, &config.resolve)?.build(entry)?;
    let mut manifest = ArchiveManifest::from_graph(&graph);
    if config.include_bbl && manifest.include_bbl() {
        log::info!("Including {}", manifest.entry.with_extension("bbl").display());
    }
    log::info!(
        "{} files to archive, {} warnings",
        manifest.entries.len(),
        manifest.warnings.len()
    );
    Ok(manifest)
}

/// Everything an archive run produced.
#[derive(Debug)]
pub struct ArchiveOutcome {
    pub manifest: ArchiveManifest,
    pub target: OutputTarget,
    pub report: MaterializeReport,
    pub lockfile: Option<PathBuf>,
    pub validation: Option<ValidationReport>,
}

impl ArchiveOutcome {
    /// A failed validation is a failed run; warnings alone are not.
    pub fn is_success(&self) -> bool {
        self.validation.as_ref().is_none_or(|v| v.success)
    }
}

/// Default output for an entry document: `<root>/<entry stem>.zip`.
pub fn default_output(manifest: &ArchiveManifest) -> PathBuf {
    manifest.root.join(manifest.entry.with_extension("zip"))
}

/// Plans, materializes and optionally validates an archive.
///
/// `builder` overrides the engine from `config` for `.bbl` generation and the
/// validation build.
pub fn archive(
    root: &Path,
    entry: &Path,
    target: Option<OutputTarget>,
    config: &ArchiveConfig,
    builder: Option<&dyn ExternalBuilder>,
) -> Result<ArchiveOutcome> {
    let mut manifest = plan(root, entry, config)?;
    let target = target.unwrap_or_else(|| OutputTarget::Zip(default_output(&manifest)));
    let lockfile = config.lockfile.then(|| target.lockfile_path());
    if let Some(path) = &lockfile {
        check_lockfile(path)?;
    }

    let configured = config.builder();
    let builder = builder.unwrap_or(&configured);

    // Holds a generated .bbl until it has been copied out.
    let bbl = manifest.entry.with_extension("bbl");
    let _bbl_scratch = if config.include_bbl && !manifest.contains(&bbl) {
        validate::generate_bbl(&mut manifest, builder)
    } else {
        None
    };

    let report = materialize(&manifest, &target)?;

    if let Some(path) = &lockfile {
        manifest
            .save(path)
            .with_context(|| format!("Failed to write lockfile for {}", target.path().display()))?;
    }

    let validation = config
        .validate
        .then(|| validate::validate(&manifest, builder));

    Ok(ArchiveOutcome {
        manifest,
        target,
        report,
        lockfile,
        validation,
    })
}

/// A lockfile is only replaced when the existing file is one of ours.
fn check_lockfile(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if ArchiveManifest::load(path).is_err() {
        bail!(
            "Refusing to overwrite {}: it is not a texpack lockfile",
            path.display()
        );
    }
    log::warn!("Replacing lockfile {}", path.display());
    Ok(())
}
