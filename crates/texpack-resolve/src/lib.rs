//! Static dependency resolution for multi-file LaTeX projects.
//!
//! Given a project root and an entry document, [`GraphBuilder`] finds every
//! file the build needs: sources pulled in with `\input`/`\include`, local
//! classes and packages, bibliography styles and databases, and graphics.
//! Nothing is expanded; directives are recognized on the syntax tree of
//! `texpack-syntax`, including when wrapped in other macros' arguments.
//!
//! ```no_run
//! use texpack_resolve::{resolve_project, ResolveConfig};
//!
//! let graph = resolve_project("thesis", "main.tex", &ResolveConfig::default())?;
//! for node in graph.project_files() {
//!     println!("{}", graph.relative(&node.path).display());
//! }
//! for warning in graph.warnings() {
//!     eprintln!("{}", warning);
//! }
//! # Ok::<(), texpack_resolve::FatalError>(())
//! ```

pub mod config;
pub mod directive;
pub mod error;
pub mod graph;
pub mod locator;
pub mod reader;
pub mod resolver;
pub mod scanner;

pub use config::ResolveConfig;
pub use directive::{Directive, DirectiveArgument, DirectiveKind};
pub use error::{FatalError, ResolveError, WarningReason};
pub use graph::{DependencyGraph, DependencyNode, Edge, EdgeOutcome, GraphBuilder, NodeId, Warning};
pub use locator::{SystemLocator, SystemLookup};
pub use reader::{FsReader, TextReader};
pub use resolver::{KindPolicy, Origin, ResolutionTable, ResolvedFile, Resolver};
pub use scanner::DirectiveScanner;

use std::path::Path;

/// Builds the dependency graph of `entry` inside `root`.
pub fn resolve_project(
    root: impl AsRef<Path>,
    entry: impl AsRef<Path>,
    config: &ResolveConfig,
) -> Result<DependencyGraph, FatalError> {
    GraphBuilder::new(root, config)?.build(entry)
}
