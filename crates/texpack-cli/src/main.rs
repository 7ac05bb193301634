use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use texpack_build::{ArchiveConfig, ArchiveManifest, OutputTarget, ValidationReport};
use texpack_resolve::SystemLookup;

#[derive(Parser)]
#[command(name = "texpack")]
#[command(about = "Collect the files a LaTeX document needs into a minimal archive", long_about = None)]
#[command(version)]
struct Cli {
    /// Show resolver activity (-v warnings, -vv progress, -vvv every lookup)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve dependencies and write an archive (zip or directory)
    Archive {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output path; a `.zip` path writes a zip, anything else a directory
        /// [default: <root>/<main>.zip]
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Compile a scratch copy of the archive to check it is complete
        #[arg(long, overrides_with = "no_validate")]
        validate: bool,

        /// Skip validation even if a config file enables it
        #[arg(long, overrides_with = "validate")]
        no_validate: bool,

        /// Engine for --validate: tectonic, latexmk, pdflatex or any program
        #[arg(long, value_name = "NAME")]
        engine: Option<String>,

        /// Seconds before the validation build is killed
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Also write a texpack.lock.json manifest with content hashes
        #[arg(long)]
        lockfile: bool,

        /// Include <main>.bbl so the archive builds without BibTeX; when the
        /// project has none it is generated with the validation engine
        #[arg(long)]
        bbl: bool,
    },
    /// Print the files an archive would contain, without writing anything
    Deps {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Args)]
struct ProjectArgs {
    /// Entry document
    #[arg(value_name = "MAIN")]
    main: PathBuf,

    /// Project root [default: directory of MAIN]
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Extra directory searched after the project root (repeatable)
    #[arg(long = "search-dir", value_name = "DIR")]
    search_dirs: Vec<PathBuf>,

    /// Brace nesting searched for directives wrapped in other macros
    #[arg(long, value_name = "N")]
    max_scan_depth: Option<usize>,

    /// How to find files of the TeX distribution
    #[arg(long, value_enum, value_name = "HOW")]
    system_lookup: Option<LookupArg>,

    /// Print machine-readable JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LookupArg {
    Auto,
    Kpsewhich,
    TexTree,
    None,
}

impl From<LookupArg> for SystemLookup {
    fn from(arg: LookupArg) -> Self {
        match arg {
            LookupArg::Auto => SystemLookup::Auto,
            LookupArg::Kpsewhich => SystemLookup::Kpsewhich,
            LookupArg::TexTree => SystemLookup::TexTree,
            LookupArg::None => SystemLookup::None,
        }
    }
}

impl ProjectArgs {
    fn root(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        match self.main.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Config files overlaid with the flags given on the command line.
    fn config(&self, root: &Path) -> anyhow::Result<ArchiveConfig> {
        let mut config = ArchiveConfig::load(root)?;
        config.resolve.search_dirs.extend(self.search_dirs.iter().cloned());
        if let Some(depth) = self.max_scan_depth {
            config.resolve.max_scan_depth = depth;
        }
        if let Some(lookup) = self.system_lookup {
            config.resolve.system_lookup = lookup.into();
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    match cli.command {
        Commands::Deps { project } => {
            let root = project.root();
            let config = project.config(&root)?;
            let manifest = texpack_build::plan(&root, &project.main, &config)?;
            if project.json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
            } else {
                for entry in &manifest.entries {
                    println!("{}", entry.destination.display());
                }
                print_system(&manifest);
                print_warnings(&manifest);
            }
        }
        Commands::Archive {
            project,
            output,
            validate,
            no_validate,
            engine,
            timeout,
            lockfile,
            bbl,
        } => {
            let root = project.root();
            let mut config = project.config(&root)?;
            if validate {
                config.validate = true;
            }
            if no_validate {
                config.validate = false;
            }
            if let Some(engine) = engine {
                config.engine = engine;
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }
            config.lockfile |= lockfile;
            config.include_bbl |= bbl;

            let outcome = texpack_build::archive(
                &root,
                &project.main,
                output.map(OutputTarget::from_path),
                &config,
                None,
            )
            .context("Archive failed")?;

            if project.json {
                let value = json!({
                    "output": outcome.target.path(),
                    "written": outcome.report.written,
                    "skipped": outcome.report.skipped,
                    "lockfile": outcome.lockfile,
                    "manifest": outcome.manifest,
                    "validation": outcome.validation.as_ref().map(validation_json),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!(
                    "Wrote {} files to {}",
                    outcome.report.written.len(),
                    outcome.target.path().display()
                );
                for skipped in &outcome.report.skipped {
                    eprintln!("skipped (missing): {}", skipped.display());
                }
                if let Some(lockfile) = &outcome.lockfile {
                    println!("Lockfile: {}", lockfile.display());
                }
                print_warnings(&outcome.manifest);
                let bbl_name = outcome.manifest.entry.with_extension("bbl");
                if config.include_bbl && !outcome.manifest.contains(&bbl_name) {
                    eprintln!("warning: {} could not be included", bbl_name.display());
                }
                if let Some(report) = &outcome.validation {
                    print_validation(report);
                }
            }

            if !outcome.is_success() {
                bail!("Archive validation failed");
            }
        }
    }
    Ok(())
}

fn print_system(manifest: &ArchiveManifest) {
    if manifest.system.is_empty() {
        return;
    }
    println!();
    println!("Expected from the TeX installation:");
    for dep in &manifest.system {
        println!("  {} {}", dep.kind, dep.name);
    }
}

fn print_warnings(manifest: &ArchiveManifest) {
    for warning in &manifest.warnings {
        eprintln!("warning: {}", warning);
    }
}

fn print_validation(report: &ValidationReport) {
    if report.success {
        println!("Validation with {} succeeded", report.engine);
        return;
    }
    if report.timed_out {
        eprintln!("Validation with {} timed out", report.engine);
    } else {
        eprintln!(
            "Validation with {} failed (exit code {})",
            report.engine,
            report
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
    }
    if !report.stdout.is_empty() {
        eprintln!("{}", report.stdout);
    }
    if !report.stderr.is_empty() {
        eprintln!("{}", report.stderr);
    }
    for (name, text) in &report.logs {
        eprintln!("{}:", name);
        eprintln!("{}", text);
    }
}

fn validation_json(report: &ValidationReport) -> serde_json::Value {
    json!({
        "engine": report.engine,
        "success": report.success,
        "timed_out": report.timed_out,
        "exit_code": report.exit_code,
        "stdout": report.stdout,
        "stderr": report.stderr,
    })
}
