use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Problems recovered at the level of a single directive.
///
/// None of these abort a run: the directive is marked unresolved, the
/// owning file stays in the graph and the problem is reported as a
/// [`Warning`](crate::Warning).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The file exists (or was named) but could not be read as text.
    #[error("cannot read {}: {reason}", .path.display())]
    FileUnavailable { path: PathBuf, reason: String },

    /// No candidate location or extension matched.
    #[error("'{argument}' not found (tried {})", format_candidates(.candidates))]
    AmbiguousOrNotFound {
        argument: String,
        candidates: Vec<PathBuf>,
    },

    /// The target is already being processed further up the include chain,
    /// or the chain grew past the configured depth limit.
    #[error("{}", describe_cycle(.path, .limit))]
    CycleDetected { path: PathBuf, limit: Option<usize> },

    /// The argument is built from macros the scanner cannot follow.
    #[error("argument '{argument}' is not a static file name")]
    UnparseableDirective { argument: String },
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        return "no candidates".to_string();
    }
    candidates
        .iter()
        .map(|c| c.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_cycle(path: &std::path::Path, limit: &Option<usize>) -> String {
    match limit {
        Some(limit) => format!(
            "include depth limit of {} reached at {}",
            limit,
            path.display()
        ),
        None => format!("cycle detected: {} includes one of its ancestors", path.display()),
    }
}

/// Reason tag carried by a [`Warning`](crate::Warning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningReason {
    NotFound,
    Cycle,
    Unparseable,
}

impl ResolveError {
    pub fn reason(&self) -> WarningReason {
        match self {
            ResolveError::FileUnavailable { .. } | ResolveError::AmbiguousOrNotFound { .. } => {
                WarningReason::NotFound
            }
            ResolveError::CycleDetected { .. } => WarningReason::Cycle,
            ResolveError::UnparseableDirective { .. } => WarningReason::Unparseable,
        }
    }
}

/// Errors that stop a run before any graph is built.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("project root {} does not exist or is not a directory", .0.display())]
    RootNotFound(PathBuf),

    #[error("entry document {} not found", .0.display())]
    EntryNotFound(PathBuf),

    #[error("entry document {} lies outside the project root {}", .entry.display(), .root.display())]
    EntryOutsideRoot { entry: PathBuf, root: PathBuf },

    #[error("entry document cannot be read")]
    EntryUnreadable(#[source] ResolveError),
}
