use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use texpack_build::{
    archive, plan, ArchiveConfig, ArchiveManifest, ExternalBuilder, OutputTarget,
    ValidationReport,
};
use texpack_resolve::{SystemLookup, WarningReason};

fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (name, text) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }
    (dir, root)
}

fn hermetic() -> ArchiveConfig {
    let mut config = ArchiveConfig::default();
    config.resolve.system_lookup = SystemLookup::None;
    config
}

fn report_project() -> (tempfile::TempDir, PathBuf) {
    project(&[
        (
            "main.tex",
            "\\documentclass{report}\n\\input{intro}\n\\bibliographystyle{plain}\n\\bibliography{refs}\n",
        ),
        ("intro.tex", "Intro with figure \\includegraphics{figs/plot}"),
        ("figs/plot.png", "png"),
        ("plain.bst", "% bst"),
        ("refs.bib", "@misc{a}"),
        ("unused.tex", "not referenced"),
    ])
}

fn destinations(manifest: &ArchiveManifest) -> Vec<String> {
    manifest
        .entries
        .iter()
        .map(|e| e.destination.to_string_lossy().replace('\\', "/"))
        .collect()
}

#[test]
fn test_plan_end_to_end() {
    let (_dir, root) = report_project();
    let manifest = plan(&root, Path::new("main.tex"), &hermetic()).unwrap();
    assert_eq!(
        destinations(&manifest),
        vec!["main.tex", "intro.tex", "figs/plot.png", "plain.bst", "refs.bib"]
    );
    assert!(manifest.warnings.is_empty());
    assert!(manifest.entries.iter().all(|e| e.sha256.is_some()));
    assert_eq!(manifest.system.len(), 1);
    assert_eq!(manifest.system[0].name, "report");

    let again = plan(&root, Path::new("main.tex"), &hermetic()).unwrap();
    assert_eq!(manifest, again);
}

#[test]
fn test_zip_output_contains_exactly_the_manifest() {
    let (_dir, root) = report_project();
    let out = tempfile::tempdir().unwrap();
    let zip_path = out.path().join("bundle.zip");
    let outcome = archive(
        &root,
        Path::new("main"),
        Some(OutputTarget::from_path(&zip_path)),
        &hermetic(),
        None,
    )
    .unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.report.written.len(), 5);

    let mut zip = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["figs/plot.png", "intro.tex", "main.tex", "plain.bst", "refs.bib"]
    );
    let mut intro = String::new();
    std::io::Read::read_to_string(&mut zip.by_name("intro.tex").unwrap(), &mut intro).unwrap();
    assert!(intro.starts_with("Intro"));
}

#[test]
fn test_directory_output_is_additive() {
    let (_dir, root) = report_project();
    let out = tempfile::tempdir().unwrap();
    fs::write(out.path().join("keep.txt"), "mine").unwrap();

    let mut config = hermetic();
    config.lockfile = true;
    let outcome = archive(
        &root,
        Path::new("main.tex"),
        Some(OutputTarget::Directory(out.path().to_path_buf())),
        &config,
        None,
    )
    .unwrap();

    assert_eq!(fs::read_to_string(out.path().join("keep.txt")).unwrap(), "mine");
    assert!(out.path().join("figs/plot.png").is_file());
    assert!(!out.path().join("unused.tex").exists());

    let lockfile = outcome.lockfile.unwrap();
    let saved = ArchiveManifest::load(&lockfile).unwrap();
    assert_eq!(saved, outcome.manifest);
}

#[test]
fn test_refuses_project_root_as_output() {
    let (_dir, root) = report_project();
    let result = archive(
        &root,
        Path::new("main.tex"),
        Some(OutputTarget::Directory(root.clone())),
        &hermetic(),
        None,
    );
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("project root"), "{}", message);
}

#[test]
fn test_warnings_do_not_block_archiving() {
    let (_dir, root) = project(&[("main.tex", "\\input{missing}\\input{main}")]);
    let out = tempfile::tempdir().unwrap();
    let outcome = archive(
        &root,
        Path::new("main.tex"),
        Some(OutputTarget::Directory(out.path().join("a"))),
        &hermetic(),
        None,
    )
    .unwrap();
    assert!(outcome.is_success());
    let reasons: Vec<_> = outcome.manifest.warnings.iter().map(|w| w.reason).collect();
    assert_eq!(reasons, vec![WarningReason::NotFound, WarningReason::Cycle]);
    assert!(out.path().join("a/main.tex").is_file());
}

#[test]
fn test_missing_entry_is_fatal() {
    let (_dir, root) = project(&[]);
    assert!(plan(&root, Path::new("main.tex"), &hermetic()).is_err());
}

#[test]
fn test_include_bbl() {
    let (_dir, root) = project(&[("main.tex", "\\bibliography{refs}"), ("main.bbl", "bbl")]);
    let mut config = hermetic();
    config.include_bbl = true;
    let manifest = plan(&root, Path::new("main.tex"), &config).unwrap();
    assert_eq!(destinations(&manifest), vec!["main.tex", "main.bbl"]);
    assert_eq!(manifest.warnings.len(), 1);
}

/// Records what the validation build saw.
#[derive(Default)]
struct RecordingBuilder {
    seen: RefCell<Vec<String>>,
    succeed: bool,
}

impl ExternalBuilder for RecordingBuilder {
    fn name(&self) -> &str {
        "recording"
    }

    fn build(&self, dir: &Path, main: &Path) -> anyhow::Result<ValidationReport> {
        let mut seen: Vec<String> = walk(dir);
        seen.sort();
        *self.seen.borrow_mut() = seen;
        Ok(ValidationReport {
            engine: self.name().to_string(),
            success: self.succeed && dir.join(main).is_file(),
            timed_out: false,
            exit_code: Some(if self.succeed { 0 } else { 1 }),
            stdout: String::new(),
            stderr: String::new(),
            logs: Vec::new(),
        })
    }
}

fn walk(dir: &Path) -> Vec<String> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            let prefix = path.file_name().unwrap().to_string_lossy().to_string();
            out.extend(walk(&path).into_iter().map(|p| format!("{}/{}", prefix, p)));
        } else {
            out.push(path.file_name().unwrap().to_string_lossy().to_string());
        }
    }
    out
}

#[test]
fn test_validation_builds_a_scratch_copy() {
    let (_dir, root) = report_project();
    let out = tempfile::tempdir().unwrap();
    let mut config = hermetic();
    config.validate = true;

    let passing = RecordingBuilder {
        succeed: true,
        ..Default::default()
    };
    let outcome = archive(
        &root,
        Path::new("main.tex"),
        Some(OutputTarget::from_path(out.path().join("ok.zip"))),
        &config,
        Some(&passing),
    )
    .unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        *passing.seen.borrow(),
        vec!["figs/plot.png", "intro.tex", "main.tex", "plain.bst", "refs.bib"]
    );

    let failing = RecordingBuilder::default();
    let outcome = archive(
        &root,
        Path::new("main.tex"),
        Some(OutputTarget::from_path(out.path().join("bad.zip"))),
        &config,
        Some(&failing),
    )
    .unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.manifest.entries.len(), 5);
    assert!(out.path().join("bad.zip").is_file());
}

#[test]
fn test_unstartable_engine_keeps_the_archive() {
    let (_dir, root) = report_project();
    let out = tempfile::tempdir().unwrap();
    let zip_path = out.path().join("a.zip");
    let mut config = hermetic();
    config.validate = true;
    config.engine = "texpack-no-such-engine".to_string();
    let outcome = archive(
        &root,
        Path::new("main.tex"),
        Some(OutputTarget::from_path(&zip_path)),
        &config,
        None,
    )
    .unwrap();
    assert!(!outcome.is_success());
    assert!(zip_path.is_file());
    assert_eq!(outcome.manifest.entries.len(), 5);
    let validation = outcome.validation.unwrap();
    assert_eq!(validation.exit_code, None);
    assert!(validation.stderr.contains("not found in PATH"));
}

/// Leaves a `.bbl` next to the entry document, like a BibTeX run would.
struct BibtexBuilder;

impl ExternalBuilder for BibtexBuilder {
    fn name(&self) -> &str {
        "bibtex"
    }

    fn build(&self, dir: &Path, main: &Path) -> anyhow::Result<ValidationReport> {
        fs::write(dir.join(main.with_extension("bbl")), "\\begin{thebibliography}{1}").unwrap();
        Ok(ValidationReport {
            engine: self.name().to_string(),
            success: true,
            timed_out: false,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            logs: Vec::new(),
        })
    }
}

#[test]
fn test_missing_bbl_is_generated() {
    let (_dir, root) = report_project();
    let out = tempfile::tempdir().unwrap();
    let zip_path = out.path().join("with-bbl.zip");
    let mut config = hermetic();
    config.include_bbl = true;
    let outcome = archive(
        &root,
        Path::new("main.tex"),
        Some(OutputTarget::from_path(&zip_path)),
        &config,
        Some(&BibtexBuilder),
    )
    .unwrap();
    assert!(outcome.manifest.contains(Path::new("main.bbl")));
    assert_eq!(outcome.report.written.len(), 6);
    assert!(!root.join("main.bbl").exists());

    let mut zip = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
    let mut bbl = String::new();
    std::io::Read::read_to_string(&mut zip.by_name("main.bbl").unwrap(), &mut bbl).unwrap();
    assert!(bbl.starts_with("\\begin{thebibliography}"));
}

#[test]
fn test_foreign_lockfile_is_not_overwritten() {
    let (_dir, root) = report_project();
    let out = tempfile::tempdir().unwrap();
    let lockfile = out.path().join("texpack.lock.json");
    fs::write(&lockfile, "my notes").unwrap();

    let mut config = hermetic();
    config.lockfile = true;
    let target = || Some(OutputTarget::Directory(out.path().to_path_buf()));
    let result = archive(&root, Path::new("main.tex"), target(), &config, None);
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("not a texpack lockfile"), "{}", message);
    assert_eq!(fs::read_to_string(&lockfile).unwrap(), "my notes");

    fs::remove_file(&lockfile).unwrap();
    archive(&root, Path::new("main.tex"), target(), &config, None).unwrap();
    let again = archive(&root, Path::new("main.tex"), target(), &config, None).unwrap();
    assert_eq!(again.lockfile, Some(lockfile));
}
