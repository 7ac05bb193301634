//! Extension Resolver: binds a directive argument to a file.
//!
//! Search order for a relative argument, first hit wins:
//!
//! 1. the owning file's directory
//! 2. `\graphicspath` directories (graphics only)
//! 3. the project root
//! 4. the configured auxiliary search directories
//! 5. the TeX distribution, through a [`SystemLocator`]
//!
//! Every directory is tried with every candidate extension before the next
//! directory is considered, so a project-local `foo.cls` always shadows a
//! system `foo.cls`.

use crate::directive::{Directive, DirectiveArgument, DirectiveKind};
use crate::error::ResolveError;
use crate::locator::SystemLocator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use glob::Pattern;

/// How one directive kind is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPolicy {
    /// Extensions tried, in priority order, including the leading dot.
    pub extensions: Vec<String>,
    /// Consult the TeX distribution when no project file matches.
    pub system_lookup: bool,
    /// A bare name that matches nothing is taken to be a system file rather
    /// than an error (class, package and style names).
    pub assume_system: bool,
    /// Resolved project files of this kind are scanned for further directives.
    pub scan: bool,
    /// An extension-less argument may bind to a file with any extension when
    /// none of `extensions` exists.
    pub any_extension: bool,
}

impl KindPolicy {
    fn new(extensions: &[&str], system_lookup: bool, assume_system: bool, scan: bool) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            system_lookup,
            assume_system,
            scan,
            any_extension: false,
        }
    }
}

/// Immutable extension and precedence table handed to the [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolutionTable {
    kinds: HashMap<DirectiveKind, KindPolicy>,
    /// Command-specific extension lists that replace the kind's list.
    commands: HashMap<String, Vec<String>>,
}

impl Default for ResolutionTable {
    fn default() -> Self {
        let mut kinds = HashMap::new();
        kinds.insert(DirectiveKind::Input, KindPolicy::new(&[".tex"], true, false, true));
        kinds.insert(DirectiveKind::Include, KindPolicy::new(&[".tex"], false, false, true));
        kinds.insert(
            DirectiveKind::DocumentClass,
            KindPolicy::new(&[".cls"], true, true, true),
        );
        kinds.insert(
            DirectiveKind::UsePackage,
            KindPolicy::new(&[".sty"], true, true, true),
        );
        kinds.insert(
            DirectiveKind::BibliographyStyle,
            KindPolicy::new(&[".bst"], true, true, false),
        );
        kinds.insert(
            DirectiveKind::Bibliography,
            KindPolicy::new(&[".bib"], true, false, false),
        );
        kinds.insert(
            DirectiveKind::Graphics,
            KindPolicy {
                any_extension: true,
                ..KindPolicy::new(&[".pdf", ".png", ".jpg", ".jpeg", ".eps"], false, false, false)
            },
        );
        kinds.insert(DirectiveKind::GraphicsPath, KindPolicy::new(&[], false, false, false));

        let mut commands = HashMap::new();
        commands.insert(
            "InputIfFileExists".to_string(),
            vec![".tex".to_string(), ".ldf".to_string(), ".sty".to_string()],
        );

        Self { kinds, commands }
    }
}

impl ResolutionTable {
    pub fn policy(&self, kind: DirectiveKind) -> &KindPolicy {
        // Every kind is registered by `default`; `with_policy` only replaces.
        &self.kinds[&kind]
    }

    pub fn with_policy(mut self, kind: DirectiveKind, policy: KindPolicy) -> Self {
        self.kinds.insert(kind, policy);
        self
    }

    pub fn extensions(&self, directive: &Directive) -> &[String] {
        self.commands
            .get(&directive.command)
            .unwrap_or(&self.policy(directive.kind).extensions)
    }
}

/// Where a resolved file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Under the project root; part of the archive.
    Project,
    /// Found through an auxiliary search directory or an absolute path outside
    /// the project root.
    External,
    /// Provided by the TeX distribution.
    System,
}

/// A directive argument bound to a concrete file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFile {
    /// Canonical path; `None` for a system file known only by name.
    pub path: Option<PathBuf>,
    /// Extension that matched, with the leading dot (may be empty).
    pub extension: String,
    pub origin: Origin,
}

impl ResolvedFile {
    pub fn is_project(&self) -> bool {
        self.origin == Origin::Project
    }
}

/// Resolves directive arguments for one run.
///
/// Results are memoized per (argument, kind, command, owning directory), so
/// the same inputs always produce the same answer within a run.
#[derive(Debug)]
pub struct Resolver {
    root: PathBuf,
    search_dirs: Vec<PathBuf>,
    table: ResolutionTable,
    locator: Box<dyn SystemLocator>,
    cache: HashMap<(String, DirectiveKind, String, PathBuf), Result<ResolvedFile, ResolveError>>,
    system_cache: HashMap<String, Option<PathBuf>>,
}

impl Resolver {
    /// `root` must already be canonical.
    pub fn new(
        root: PathBuf,
        search_dirs: Vec<PathBuf>,
        table: ResolutionTable,
        locator: Box<dyn SystemLocator>,
    ) -> Self {
        let search_dirs = search_dirs
            .into_iter()
            .map(|d| if d.is_absolute() { d } else { root.join(d) })
            .collect();
        Self {
            root,
            search_dirs,
            table,
            locator,
            cache: HashMap::new(),
            system_cache: HashMap::new(),
        }
    }

    pub fn table(&self) -> &ResolutionTable {
        &self.table
    }

    /// Resolves `directive`, whose file lives in `owning_dir`.
    ///
    /// `graphics_dirs` are the `\graphicspath` entries seen so far, relative
    /// to the project root.
    pub fn resolve(
        &mut self,
        directive: &Directive,
        owning_dir: &Path,
        graphics_dirs: &[PathBuf],
    ) -> Result<ResolvedFile, ResolveError> {
        let argument = match &directive.argument {
            DirectiveArgument::Literal(arg) => arg.clone(),
            DirectiveArgument::Unresolved(arg) => {
                return Err(ResolveError::UnparseableDirective {
                    argument: arg.clone(),
                });
            }
        };

        let key = (
            argument.clone(),
            directive.kind,
            directive.command.clone(),
            owning_dir.to_path_buf(),
        );
        // Graphics depend on \graphicspath state, which changes during a run.
        let cacheable = directive.kind != DirectiveKind::Graphics;
        if cacheable {
            if let Some(hit) = self.cache.get(&key) {
                return hit.clone();
            }
        }

        let result = self.resolve_uncached(directive, &argument, owning_dir, graphics_dirs);
        match &result {
            Ok(file) => log::debug!(
                "{} -> {:?} ({:?})",
                directive,
                file.path,
                file.origin
            ),
            Err(e) => log::debug!("{} -> {}", directive, e),
        }
        if cacheable {
            self.cache.insert(key, result.clone());
        }
        result
    }

    fn resolve_uncached(
        &mut self,
        directive: &Directive,
        argument: &str,
        owning_dir: &Path,
        graphics_dirs: &[PathBuf],
    ) -> Result<ResolvedFile, ResolveError> {
        let policy = self.table.policy(directive.kind).clone();
        let names = candidate_names(argument, self.table.extensions(directive));

        let arg_path = Path::new(argument);
        let dirs: Vec<PathBuf> = if arg_path.is_absolute() {
            vec![PathBuf::new()]
        } else {
            let mut dirs = vec![owning_dir.to_path_buf()];
            if directive.kind == DirectiveKind::Graphics {
                dirs.extend(graphics_dirs.iter().map(|g| self.root.join(g)));
            }
            dirs.push(self.root.clone());
            dirs.extend(self.search_dirs.iter().cloned());
            dedup_in_order(dirs)
        };

        let mut candidates = Vec::new();
        for dir in &dirs {
            for name in &names {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(self.bind(&candidate, name));
                }
                candidates.push(candidate);
            }
        }

        if arg_path.extension().is_none() {
            let extensions = self.table.extensions(directive);
            for dir in &dirs {
                if let Some(file) =
                    self.match_any_extension(dir, argument, extensions, policy.any_extension)
                {
                    return Ok(file);
                }
            }
        }

        let bare = !has_separator(argument) && !arg_path.is_absolute();
        if policy.system_lookup && bare {
            for name in &names {
                if let Some(path) = self.locate_system(name) {
                    return Ok(ResolvedFile {
                        path: Some(path),
                        extension: extension_of(name),
                        origin: Origin::System,
                    });
                }
            }
        }
        if policy.assume_system && bare {
            return Ok(ResolvedFile {
                path: None,
                extension: names.first().map(|n| extension_of(n)).unwrap_or_default(),
                origin: Origin::System,
            });
        }

        Err(ResolveError::AmbiguousOrNotFound {
            argument: argument.to_string(),
            candidates,
        })
    }

    fn bind(&self, candidate: &Path, name: &str) -> ResolvedFile {
        let path = canonical(candidate);
        let origin = if path.starts_with(&self.root) {
            Origin::Project
        } else {
            Origin::External
        };
        ResolvedFile {
            path: Some(path),
            extension: extension_of(name),
            origin,
        }
    }

    fn locate_system(&mut self, file_name: &str) -> Option<PathBuf> {
        if let Some(hit) = self.system_cache.get(file_name) {
            return hit.clone();
        }
        let found = self.locator.locate(file_name);
        log::debug!(
            "{} lookup for {}: {:?}",
            self.locator.name(),
            file_name,
            found
        );
        self.system_cache.insert(file_name.to_string(), found.clone());
        found
    }

    /// Best-effort fallback for an argument built from macros: files in the
    /// owning directory that start with the static prefix before the first
    /// control sequence (and end with its static suffix, if any).
    ///
    /// `\input{chapters/ch\n}` picks up `chapters/ch1.tex`, `chapters/ch2.tex`, ...
    pub fn expand_unresolved(&self, directive: &Directive, owning_dir: &Path) -> Vec<ResolvedFile> {
        let raw = directive.raw_argument();
        let Some((prefix, rest)) = raw.split_once('\\') else {
            return Vec::new();
        };
        let prefix_path = Path::new(prefix);
        let (parent, name_prefix) = if prefix.ends_with('/') {
            (prefix_path, "")
        } else {
            (
                prefix_path.parent().unwrap_or(Path::new("")),
                prefix_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(""),
            )
        };
        if name_prefix.is_empty() {
            return Vec::new();
        }
        let suffix = Path::new(rest)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e));
        let extensions = self.table.extensions(directive);

        let dir = owning_dir.join(parent);
        let pattern = format!(
            "{}/{}*{}",
            Pattern::escape(&dir.to_string_lossy()),
            Pattern::escape(name_prefix),
            Pattern::escape(suffix.as_deref().unwrap_or(""))
        );
        let mut matches: Vec<ResolvedFile> = glob_files(&pattern)
            .into_iter()
            .filter_map(|path| {
                let file_name = path.file_name()?.to_str()?.to_string();
                let accepted = suffix.is_some()
                    || extensions
                        .iter()
                        .any(|x| x.eq_ignore_ascii_case(&extension_of(&file_name)));
                accepted.then(|| self.bind(&path, &file_name))
            })
            .collect();
        matches.dedup();
        matches
    }

    /// Last local step for an extension-less argument: any `name.*` file in
    /// `dir`. Kind extensions are compared case-insensitively in priority
    /// order; with `any_extension` the first remaining file is taken.
    fn match_any_extension(
        &self,
        dir: &Path,
        argument: &str,
        extensions: &[String],
        any_extension: bool,
    ) -> Option<ResolvedFile> {
        let pattern = format!("{}.*", Pattern::escape(&dir.join(argument).to_string_lossy()));
        let found: Vec<(PathBuf, String)> = glob_files(&pattern)
            .into_iter()
            .filter_map(|p| {
                let name = p.file_name()?.to_str()?.to_string();
                Some((p, name))
            })
            .collect();
        let preferred = extensions.iter().find_map(|ext| {
            found
                .iter()
                .find(|(_, name)| extension_of(name).eq_ignore_ascii_case(ext))
        });
        let (path, name) = match preferred {
            Some(hit) => hit,
            None if any_extension => found.first()?,
            None => return None,
        };
        Some(self.bind(path, name))
    }
}

/// Files matching `pattern`, sorted. An invalid pattern matches nothing.
fn glob_files(pattern: &str) -> Vec<PathBuf> {
    let paths = match glob::glob(pattern) {
        Ok(paths) => paths,
        Err(e) => {
            log::debug!("Invalid pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    files.sort();
    files
}

/// File names to try for `argument`: verbatim first when it already has an
/// extension, then with each kind extension appended.
fn candidate_names(argument: &str, extensions: &[String]) -> Vec<String> {
    let mut names = Vec::new();
    if Path::new(argument).extension().is_some() {
        names.push(argument.to_string());
    }
    for ext in extensions {
        let name = format!("{}{}", argument, ext);
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        names.push(argument.to_string());
    }
    names
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

fn has_separator(argument: &str) -> bool {
    argument.contains('/') || argument.contains('\\')
}

fn dedup_in_order(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let normalized = normalize(&dir);
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

/// Lexical normalization (`a/./b/../c` -> `a/c`), used before a file exists.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonical form used as the graph key; falls back to lexical normalization
/// when the file system refuses.
pub fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
}
