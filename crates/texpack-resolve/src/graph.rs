//! Dependency Graph Builder.
//!
//! The graph is an arena: nodes live in a `Vec` in discovery order and are
//! addressed by [`NodeId`]; a map from canonical path to id guarantees each
//! file is represented (and scanned) once. Traversal is depth-first over an
//! explicit stack of lazily scanned files, so directives are followed in
//! textual order and the node order is the manifest order.

use crate::config::ResolveConfig;
use crate::directive::{Directive, DirectiveArgument, DirectiveKind};
use crate::error::{FatalError, ResolveError, WarningReason};
use crate::locator::SystemLocator;
use crate::reader::{FsReader, TextReader};
use crate::resolver::{canonical, normalize, Origin, ResolutionTable, ResolvedFile, Resolver};
use crate::scanner::{DirectiveScanner, Directives};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub type NodeId = usize;

/// One file in the graph.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub id: NodeId,
    /// Canonical path; the dedup key.
    pub path: PathBuf,
    pub file: ResolvedFile,
    /// Outgoing directives in textual order.
    pub edges: Vec<Edge>,
    /// The directive that first reached this file; `None` for the entry.
    pub via: Option<Directive>,
    /// Set when the file was meant to be scanned but could not be read.
    pub read_error: Option<ResolveError>,
    pub scanned: bool,
}

impl DependencyNode {
    pub fn is_project(&self) -> bool {
        self.file.origin == Origin::Project
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub directive: Directive,
    pub outcome: EdgeOutcome,
}

#[derive(Debug, Clone)]
pub enum EdgeOutcome {
    /// `target` is `None` for system files and `\graphicspath` declarations.
    Resolved {
        file: Option<ResolvedFile>,
        target: Option<NodeId>,
    },
    /// `fallback` lists files pulled in by best-effort expansion of an
    /// unresolved argument.
    Failed {
        error: ResolveError,
        fallback: Vec<NodeId>,
    },
}

/// A recovered problem, attributed to the directive that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// File containing the directive, relative to the project root when inside it.
    pub file: PathBuf,
    pub line: u32,
    pub kind: DirectiveKind,
    pub raw_argument: String,
    pub reason: WarningReason,
    pub detail: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {:?}: {}",
            self.file.display(),
            self.line,
            self.reason,
            self.detail
        )
    }
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: PathBuf,
    nodes: Vec<DependencyNode>,
    index: HashMap<PathBuf, NodeId>,
}

impl DependencyGraph {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The entry document is always node 0.
    pub fn entry(&self) -> &DependencyNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&DependencyNode> {
        self.nodes.get(id)
    }

    pub fn get(&self, path: &Path) -> Option<&DependencyNode> {
        self.index.get(path).map(|&id| &self.nodes[id])
    }

    /// Files under the project root, in discovery order.
    pub fn project_files(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.iter().filter(|n| n.is_project())
    }

    /// `path` relative to the project root, or unchanged when outside it.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Every system dependency seen, deduplicated by (kind, name).
    pub fn system_dependencies(&self) -> Vec<(DirectiveKind, String)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for edge in self.nodes.iter().flat_map(|n| &n.edges) {
            if let EdgeOutcome::Resolved {
                file: Some(file),
                target: None,
            } = &edge.outcome
            {
                if file.origin == Origin::System {
                    let key = (edge.directive.kind, edge.directive.raw_argument().to_string());
                    if seen.insert(key.clone()) {
                        out.push(key);
                    }
                }
            }
        }
        out
    }

    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        for node in &self.nodes {
            if let (Some(error), Some(via)) = (&node.read_error, &node.via) {
                warnings.push(self.warning(via, error));
            }
            for edge in &node.edges {
                if let EdgeOutcome::Failed { error, .. } = &edge.outcome {
                    warnings.push(self.warning(&edge.directive, error));
                }
            }
        }
        warnings
    }

    fn warning(&self, directive: &Directive, error: &ResolveError) -> Warning {
        Warning {
            file: self.relative(&directive.source_file).to_path_buf(),
            line: directive.line,
            kind: directive.kind,
            raw_argument: directive.raw_argument().to_string(),
            reason: error.reason(),
            detail: error.to_string(),
        }
    }
}

/// Builds a [`DependencyGraph`] for one project root.
#[derive(Debug)]
pub struct GraphBuilder {
    root: PathBuf,
    resolver: Resolver,
    scanner: DirectiveScanner,
    reader: Box<dyn TextReader>,
    max_include_depth: usize,
}

impl GraphBuilder {
    /// Uses the file system and the locator selected by `config.system_lookup`.
    pub fn new(root: impl AsRef<Path>, config: &ResolveConfig) -> Result<Self, FatalError> {
        Self::with_parts(
            root,
            config,
            ResolutionTable::default(),
            config.system_lookup.locator(),
            Box::new(FsReader),
        )
    }

    pub fn with_parts(
        root: impl AsRef<Path>,
        config: &ResolveConfig,
        table: ResolutionTable,
        locator: Box<dyn SystemLocator>,
        reader: Box<dyn TextReader>,
    ) -> Result<Self, FatalError> {
        let root = root.as_ref();
        let root = std::fs::canonicalize(root)
            .ok()
            .filter(|r| r.is_dir())
            .ok_or_else(|| FatalError::RootNotFound(root.to_path_buf()))?;
        let resolver = Resolver::new(root.clone(), config.search_dirs.clone(), table, locator);
        Ok(Self {
            root,
            resolver,
            scanner: DirectiveScanner::new(config.max_scan_depth),
            reader,
            max_include_depth: config.max_include_depth,
        })
    }

    /// Finds the entry document. A relative path is tried against the
    /// project root first, then the working directory; `.tex` is appended
    /// when the name has no extension.
    pub fn locate_entry(&self, entry: &Path) -> Result<PathBuf, FatalError> {
        let mut candidates = Vec::new();
        if entry.is_absolute() {
            candidates.push(entry.to_path_buf());
        } else {
            candidates.push(self.root.join(entry));
            candidates.push(entry.to_path_buf());
        }
        if entry.extension().is_none() {
            let with_ext: Vec<PathBuf> = candidates
                .iter()
                .map(|c| {
                    let mut name = c.clone().into_os_string();
                    name.push(".tex");
                    PathBuf::from(name)
                })
                .collect();
            candidates.extend(with_ext);
        }

        let found = candidates
            .into_iter()
            .find(|c| c.is_file())
            .ok_or_else(|| FatalError::EntryNotFound(entry.to_path_buf()))?;
        let found = canonical(&found);
        if !found.starts_with(&self.root) {
            return Err(FatalError::EntryOutsideRoot {
                entry: found,
                root: self.root.clone(),
            });
        }
        Ok(found)
    }

    pub fn build(&mut self, entry: impl AsRef<Path>) -> Result<DependencyGraph, FatalError> {
        let entry = self.locate_entry(entry.as_ref())?;
        let text = self
            .reader
            .read(&entry)
            .map_err(FatalError::EntryUnreadable)?;
        log::info!("Resolving dependencies of {}", entry.display());

        let mut walk = Walk {
            graph: DependencyGraph {
                root: self.root.clone(),
                nodes: Vec::new(),
                index: HashMap::new(),
            },
            stack: Vec::new(),
            in_progress: HashSet::new(),
            graphics_dirs: Vec::new(),
        };

        let extension = entry
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let id = walk.add_node(
            entry.clone(),
            ResolvedFile {
                path: Some(entry.clone()),
                extension,
                origin: Origin::Project,
            },
            None,
        );
        walk.enter(id, self.scanner.scan(&entry, &text), 0);

        while let Some(frame) = walk.stack.last_mut() {
            let Some(directive) = frame.directives.next() else {
                let node = frame.node;
                walk.leave(node);
                continue;
            };
            let (node, depth) = (frame.node, frame.depth);
            self.follow(&mut walk, node, depth, directive);
        }

        let graph = walk.graph;
        log::info!(
            "{} files discovered, {} in project",
            graph.nodes.len(),
            graph.project_files().count()
        );
        Ok(graph)
    }

    fn follow(&mut self, walk: &mut Walk, node: NodeId, depth: usize, directive: Directive) {
        let owning_dir = walk.graph.nodes[node]
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        if directive.kind == DirectiveKind::GraphicsPath {
            let outcome = match &directive.argument {
                DirectiveArgument::Literal(dir) => {
                    let dir = normalize(Path::new(dir));
                    if !walk.graphics_dirs.contains(&dir) {
                        walk.graphics_dirs.push(dir);
                    }
                    EdgeOutcome::Resolved {
                        file: None,
                        target: None,
                    }
                }
                DirectiveArgument::Unresolved(arg) => EdgeOutcome::Failed {
                    error: ResolveError::UnparseableDirective {
                        argument: arg.clone(),
                    },
                    fallback: Vec::new(),
                },
            };
            walk.push_edge(node, directive, outcome);
            return;
        }

        let outcome = match self
            .resolver
            .resolve(&directive, &owning_dir, &walk.graphics_dirs)
        {
            Ok(file) => self.bind(walk, depth, &directive, file),
            Err(error @ ResolveError::UnparseableDirective { .. }) => {
                let fallback = self
                    .resolver
                    .expand_unresolved(&directive, &owning_dir)
                    .into_iter()
                    .filter(ResolvedFile::is_project)
                    .filter_map(|file| {
                        let path = file.path.clone()?;
                        Some(match walk.graph.index.get(&path) {
                            Some(&id) => id,
                            None => {
                                let id = walk.add_node(path, file, Some(directive.clone()));
                                walk.leave(id);
                                id
                            }
                        })
                    })
                    .collect::<Vec<_>>();
                log::warn!("{}: {}", directive, error);
                EdgeOutcome::Failed { error, fallback }
            }
            Err(error) => {
                log::warn!("{}: {}", directive, error);
                EdgeOutcome::Failed {
                    error,
                    fallback: Vec::new(),
                }
            }
        };
        walk.push_edge(node, directive, outcome);
    }

    fn bind(
        &mut self,
        walk: &mut Walk,
        depth: usize,
        directive: &Directive,
        file: ResolvedFile,
    ) -> EdgeOutcome {
        let path = match (&file.path, file.origin) {
            (Some(path), Origin::Project | Origin::External) => path.clone(),
            _ => {
                return EdgeOutcome::Resolved {
                    file: Some(file),
                    target: None,
                }
            }
        };
        let scan = self.resolver.table().policy(directive.kind).scan;

        if let Some(&id) = walk.graph.index.get(&path) {
            if scan && walk.in_progress.contains(&path) {
                let error = ResolveError::CycleDetected { path, limit: None };
                log::warn!("{}: {}", directive, error);
                return EdgeOutcome::Failed {
                    error,
                    fallback: Vec::new(),
                };
            }
            // A fallback leaf or a file first reached by a non-scanning kind
            // is scanned the first time a scanning directive names it.
            let node = &walk.graph.nodes[id];
            if scan && !node.scanned && node.read_error.is_none() {
                if depth + 1 > self.max_include_depth {
                    return self.depth_exceeded(directive, path);
                }
                walk.in_progress.insert(path.clone());
                self.scan_node(walk, id, directive, &path, depth + 1);
            }
            return EdgeOutcome::Resolved {
                file: Some(file),
                target: Some(id),
            };
        }

        if scan && depth + 1 > self.max_include_depth {
            return self.depth_exceeded(directive, path);
        }

        let id = walk.add_node(path.clone(), file.clone(), Some(directive.clone()));
        if scan {
            self.scan_node(walk, id, directive, &path, depth + 1);
        } else {
            walk.leave(id);
        }

        EdgeOutcome::Resolved {
            file: Some(file),
            target: Some(id),
        }
    }

    fn scan_node(
        &mut self,
        walk: &mut Walk,
        id: NodeId,
        directive: &Directive,
        path: &Path,
        depth: usize,
    ) {
        match self.reader.read(path) {
            Ok(text) => walk.enter(id, self.scanner.scan(path, &text), depth),
            Err(error) => {
                log::warn!("{}: {}", directive, error);
                walk.graph.nodes[id].read_error = Some(error);
                walk.leave(id);
            }
        }
    }

    fn depth_exceeded(&self, directive: &Directive, path: PathBuf) -> EdgeOutcome {
        let error = ResolveError::CycleDetected {
            path,
            limit: Some(self.max_include_depth),
        };
        log::warn!("{}: {}", directive, error);
        EdgeOutcome::Failed {
            error,
            fallback: Vec::new(),
        }
    }
}

struct Frame {
    node: NodeId,
    directives: Directives,
    depth: usize,
}

/// Mutable traversal state for one `build` call.
struct Walk {
    graph: DependencyGraph,
    stack: Vec<Frame>,
    in_progress: HashSet<PathBuf>,
    /// `\graphicspath` is global in LaTeX, so declarations accumulate.
    graphics_dirs: Vec<PathBuf>,
}

impl Walk {
    fn add_node(&mut self, path: PathBuf, file: ResolvedFile, via: Option<Directive>) -> NodeId {
        let id = self.graph.nodes.len();
        self.graph.index.insert(path.clone(), id);
        self.in_progress.insert(path.clone());
        self.graph.nodes.push(DependencyNode {
            id,
            path,
            file,
            edges: Vec::new(),
            via,
            read_error: None,
            scanned: false,
        });
        id
    }

    fn enter(&mut self, node: NodeId, directives: Directives, depth: usize) {
        self.graph.nodes[node].scanned = true;
        self.stack.push(Frame {
            node,
            directives,
            depth,
        });
    }

    fn leave(&mut self, node: NodeId) {
        let path = &self.graph.nodes[node].path;
        self.in_progress.remove(path);
        if self.stack.last().is_some_and(|f| f.node == node) {
            self.stack.pop();
        }
    }

    fn push_edge(&mut self, node: NodeId, directive: Directive, outcome: EdgeOutcome) {
        self.graph.nodes[node].edges.push(Edge { directive, outcome });
    }
}
