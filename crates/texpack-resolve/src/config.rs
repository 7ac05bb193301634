use crate::locator::SystemLookup;
use crate::scanner::DEFAULT_MAX_SCAN_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Resolution settings. Missing keys take their defaults, so partial
/// config files layer cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Extra directories searched after the project root, relative to it
    /// unless absolute.
    pub search_dirs: Vec<PathBuf>,
    /// Brace-nesting depth searched for directives wrapped in other macros.
    pub max_scan_depth: usize,
    /// Longest include chain followed before giving up.
    pub max_include_depth: usize,
    pub system_lookup: SystemLookup,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            system_lookup: SystemLookup::default(),
        }
    }
}
