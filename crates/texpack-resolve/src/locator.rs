//! Lookup of files installed with the TeX distribution.
//!
//! System files are never archived; the resolver only needs to know that a
//! name refers to one, and only after every project-local candidate failed.
//! All external interactions go through [`CommandExecutor`] so lookups can be
//! tested without a TeX installation.

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use walkdir::WalkDir;

/// Trait for executing system commands.
pub trait CommandExecutor: fmt::Debug {
    fn execute(&self, program: &Path, args: &[&str]) -> std::io::Result<Output>;
}

/// Default implementation of [`CommandExecutor`] using `std::process::Command`.
#[derive(Debug)]
pub struct RealCommandExecutor;

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, program: &Path, args: &[&str]) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
    }
}

/// Finds a system file by its file name (`article.cls`, `plain.bst`).
pub trait SystemLocator: fmt::Debug {
    fn name(&self) -> &str;

    fn locate(&self, file_name: &str) -> Option<PathBuf>;
}

/// Which [`SystemLocator`] a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemLookup {
    /// `kpsewhich` if installed, otherwise a walk of the detected TeX tree.
    #[default]
    Auto,
    Kpsewhich,
    TexTree,
    None,
}

impl SystemLookup {
    pub fn locator(self) -> Box<dyn SystemLocator> {
        match self {
            SystemLookup::Auto => match KpsewhichLocator::detect() {
                Some(kpse) => Box::new(kpse),
                None => match TexTreeLocator::detect() {
                    Some(tree) => Box::new(tree),
                    None => {
                        log::info!("No TeX distribution found; system files are assumed by name");
                        Box::new(NoSystemLocator)
                    }
                },
            },
            SystemLookup::Kpsewhich => match KpsewhichLocator::detect() {
                Some(kpse) => Box::new(kpse),
                None => {
                    log::warn!("kpsewhich not found in PATH");
                    Box::new(NoSystemLocator)
                }
            },
            SystemLookup::TexTree => match TexTreeLocator::detect() {
                Some(tree) => Box::new(tree),
                None => {
                    log::warn!("TeX root not found");
                    Box::new(NoSystemLocator)
                }
            },
            SystemLookup::None => Box::new(NoSystemLocator),
        }
    }
}

/// Asks `kpsewhich`, the TeX distribution's own search tool.
#[derive(Debug)]
pub struct KpsewhichLocator {
    program: PathBuf,
    executor: Box<dyn CommandExecutor>,
}

impl KpsewhichLocator {
    pub fn detect() -> Option<Self> {
        which::which("kpsewhich")
            .ok()
            .map(|program| Self::with_executor(program, Box::new(RealCommandExecutor)))
    }

    pub fn with_executor(program: PathBuf, executor: Box<dyn CommandExecutor>) -> Self {
        Self { program, executor }
    }
}

impl SystemLocator for KpsewhichLocator {
    fn name(&self) -> &str {
        "kpsewhich"
    }

    fn locate(&self, file_name: &str) -> Option<PathBuf> {
        let output = match self.executor.execute(&self.program, &[file_name]) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Failed to run kpsewhich: {}", e);
                return None;
            }
        };
        // kpsewhich exits 1 with empty output when nothing matches
        if !output.status.success() {
            return None;
        }
        let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if found.is_empty() {
            None
        } else {
            Some(PathBuf::from(found))
        }
    }
}

/// Walks the `tex/` tree of the installed distribution once and indexes it
/// by file name.
#[derive(Debug)]
pub struct TexTreeLocator {
    tex_root: PathBuf,
    index: OnceCell<HashMap<String, PathBuf>>,
}

impl TexTreeLocator {
    pub fn new(tex_root: PathBuf) -> Self {
        Self {
            tex_root,
            index: OnceCell::new(),
        }
    }

    pub fn detect() -> Option<Self> {
        find_tex_root(&RealCommandExecutor).map(Self::new)
    }

    fn index(&self) -> &HashMap<String, PathBuf> {
        self.index.get_or_init(|| {
            log::info!("Indexing TeX tree in: {:?}", self.tex_root);
            let mut index = HashMap::new();
            for entry in WalkDir::new(&self.tex_root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    // First match in sorted walk order wins, so lookups are stable.
                    index
                        .entry(name)
                        .or_insert_with(|| entry.path().to_path_buf());
                }
            }
            index
        })
    }
}

impl SystemLocator for TexTreeLocator {
    fn name(&self) -> &str {
        "tex-tree"
    }

    fn locate(&self, file_name: &str) -> Option<PathBuf> {
        self.index().get(file_name).cloned()
    }
}

/// Attempts to find the TeX distribution's `tex` directory.
pub fn find_tex_root(executor: &dyn CommandExecutor) -> Option<PathBuf> {
    let candidates = [
        "/usr/local/texlive/2025/texmf-dist/tex",
        "/usr/local/texlive/2024/texmf-dist/tex",
        "/usr/local/texlive/2023/texmf-dist/tex",
        "/usr/share/texlive/texmf-dist/tex",
        "/usr/share/texmf/tex",
    ];

    for path in candidates {
        let p = Path::new(path);
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    let program = which::which("kpsewhich").ok()?;
    let output = executor
        .execute(&program, &["-var-value", "TEXMFDIST"])
        .ok()?;
    if output.status.success() {
        let texmf = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let tex_path = PathBuf::from(&texmf).join("tex");
        if tex_path.exists() {
            return Some(tex_path);
        }
    }

    None
}

/// Never finds anything.
#[derive(Debug, Default)]
pub struct NoSystemLocator;

impl SystemLocator for NoSystemLocator {
    fn name(&self) -> &str {
        "none"
    }

    fn locate(&self, _file_name: &str) -> Option<PathBuf> {
        None
    }
}

/// A fixed file-name table, for hermetic runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MapLocator {
    files: HashMap<String, PathBuf>,
}

impl MapLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, path: impl Into<PathBuf>) -> Self {
        self.files.insert(file_name.to_string(), path.into());
        self
    }
}

impl SystemLocator for MapLocator {
    fn name(&self) -> &str {
        "map"
    }

    fn locate(&self, file_name: &str) -> Option<PathBuf> {
        self.files.get(file_name).cloned()
    }
}
