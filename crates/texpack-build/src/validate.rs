//! Validation builds: compile a scratch copy of the archive with an external
//! TeX engine to prove the file set is sufficient.

use crate::assemble::materialize_dir;
use crate::manifest::ArchiveManifest;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const DEFAULT_ENGINE: &str = "tectonic";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAIN_PLACEHOLDER: &str = "{main}";

/// Outcome of one validation build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub engine: String,
    pub success: bool,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Contents of `*.log` files left by a failed build.
    pub logs: Vec<(String, String)>,
}

/// Runs a TeX build of `main` inside `dir`.
pub trait ExternalBuilder {
    fn name(&self) -> &str;

    fn build(&self, dir: &Path, main: &Path) -> Result<ValidationReport>;
}

/// Runs an engine as a child process with a deadline.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    /// `{main}` is replaced by the entry document path.
    args: Vec<String>,
    timeout: Duration,
}

impl CommandBuilder {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn tectonic() -> Self {
        Self::new("tectonic", strings(&["--keep-logs", "--keep-intermediates", MAIN_PLACEHOLDER]))
    }

    pub fn latexmk() -> Self {
        Self::new(
            "latexmk",
            strings(&[
                "-pdf",
                "-interaction=nonstopmode",
                "-halt-on-error",
                "-file-line-error",
                MAIN_PLACEHOLDER,
            ]),
        )
    }

    pub fn pdflatex() -> Self {
        Self::new(
            "pdflatex",
            strings(&["-interaction=nonstopmode", "-halt-on-error", MAIN_PLACEHOLDER]),
        )
    }

    /// A known preset, or the named program invoked with the entry document.
    pub fn for_engine(engine: &str) -> Self {
        match engine {
            "tectonic" => Self::tectonic(),
            "latexmk" => Self::latexmk(),
            "pdflatex" => Self::pdflatex(),
            other => Self::new(other, strings(&[MAIN_PLACEHOLDER])),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args_for(&self, main: &Path) -> Vec<String> {
        let main = main.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace(MAIN_PLACEHOLDER, &main))
            .collect()
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

impl ExternalBuilder for CommandBuilder {
    fn name(&self) -> &str {
        &self.program
    }

    fn build(&self, dir: &Path, main: &Path) -> Result<ValidationReport> {
        let program = which::which(&self.program)
            .with_context(|| format!("Validation engine '{}' not found in PATH", self.program))?;
        log::info!("Validating with {} in {}", self.program, dir.display());

        let mut child = Command::new(&program)
            .args(self.args_for(main))
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let (exit_code, timed_out) = wait_with_deadline(&mut child, self.timeout)?;

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        let success = !timed_out && exit_code == Some(0);
        let logs = if success { Vec::new() } else { collect_logs(dir) };

        Ok(ValidationReport {
            engine: self.program.clone(),
            success,
            timed_out,
            exit_code,
            stdout,
            stderr,
            logs,
        })
    }
}

/// Reads a pipe to the end on its own thread so the child never blocks on a
/// full pipe while we poll it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<(Option<i32>, bool)> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().context("Failed to poll validation build")? {
            return Ok((status.code(), false));
        }
        if Instant::now() >= deadline {
            log::warn!("Validation build timed out after {:?}; killing it", timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Ok((None, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn collect_logs(dir: &Path) -> Vec<(String, String)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut logs: Vec<(String, String)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|x| x == "log"))
        .filter_map(|p| {
            let text = std::fs::read(&p).ok()?;
            let name = p.file_name()?.to_string_lossy().into_owned();
            Some((name, String::from_utf8_lossy(&text).into_owned()))
        })
        .collect();
    logs.sort();
    logs
}

impl ValidationReport {
    /// A build that never ran, e.g. because the engine could not be started.
    pub fn not_run(engine: &str, error: &anyhow::Error) -> Self {
        Self {
            engine: engine.to_string(),
            success: false,
            timed_out: false,
            exit_code: None,
            stdout: String::new(),
            stderr: format!("{:#}", error),
            logs: Vec::new(),
        }
    }
}

/// Materializes `manifest` into a fresh scratch directory and runs `builder`
/// there. The directory lives as long as the returned handle.
fn scratch_build(
    manifest: &ArchiveManifest,
    builder: &dyn ExternalBuilder,
) -> Result<(TempDir, ValidationReport)> {
    let scratch = tempfile::Builder::new()
        .prefix("texpack-build")
        .tempdir()
        .context("Failed to create scratch directory")?;
    materialize_dir(manifest, scratch.path())?;
    let report = builder.build(scratch.path(), &manifest.entry)?;
    Ok((scratch, report))
}

/// Builds a scratch copy of the archive to check it is complete.
///
/// Problems starting the build are reported as a failed validation; the
/// manifest is never touched.
pub fn validate(manifest: &ArchiveManifest, builder: &dyn ExternalBuilder) -> ValidationReport {
    let report = match scratch_build(manifest, builder) {
        Ok((_scratch, report)) => report,
        Err(e) => ValidationReport::not_run(builder.name(), &e),
    };
    if report.success {
        log::info!("Validation with {} succeeded", report.engine);
    } else {
        log::error!(
            "Validation with {} failed{}",
            report.engine,
            if report.timed_out { " (timed out)" } else { "" }
        );
    }
    report
}

/// Runs `builder` on a scratch copy and adds the `.bbl` it leaves next to the
/// entry document to `manifest`.
///
/// The returned directory holds the generated file and must outlive
/// materialization. `None` when no `.bbl` was produced.
pub fn generate_bbl(
    manifest: &mut ArchiveManifest,
    builder: &dyn ExternalBuilder,
) -> Option<TempDir> {
    let destination = manifest.entry.with_extension("bbl");
    let (scratch, report) = match scratch_build(manifest, builder) {
        Ok(built) => built,
        Err(e) => {
            log::warn!("Cannot generate {}: {:#}", destination.display(), e);
            return None;
        }
    };
    let generated = scratch.path().join(&destination);
    if !generated.is_file() {
        log::warn!(
            "{} did not produce {} (exit code {:?})",
            report.engine,
            destination.display(),
            report.exit_code
        );
        return None;
    }
    log::info!("Generated {} with {}", destination.display(), report.engine);
    manifest.add_bbl(generated);
    Some(scratch)
}
