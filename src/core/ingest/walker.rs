//! File system walker with pattern-based filtering.
//!
//! Finds ingestible files under the watched directory. `accepts` is
//! the one input predicate: backlog walks and watcher events both go
//! through it, so a file below a hidden or excluded directory is
//! skipped by either path. Walk errors (permission denied, vanished
//! entries) are logged and skipped.

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::core::config::WatchConfig;
use crate::core::error::{PipeError, Result};

/// File system walker with pattern-based filtering
#[derive(Debug, Clone)]
pub struct FileWalker {
    /// Patterns to include (e.g., "*.csv")
    include_patterns: Vec<Pattern>,

    /// Patterns to exclude (e.g., "**/archive/**")
    exclude_patterns: Vec<Pattern>,

    /// Descend into subdirectories
    recursive: bool,
}

impl FileWalker {
    /// Create a new file walker
    ///
    /// # Arguments
    ///
    /// * `include_patterns` - Glob patterns for files to include
    /// * `exclude_patterns` - Glob patterns for files to exclude
    /// * `recursive` - Walk subdirectories instead of the root only
    ///
    /// # Returns
    ///
    /// A new `FileWalker` instance or an error if patterns are
    /// invalid
    pub fn new(
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
        recursive: bool,
    ) -> Result<Self> {
        Ok(Self {
            include_patterns: compile(include_patterns, "include")?,
            exclude_patterns: compile(exclude_patterns, "exclude")?,
            recursive,
        })
    }

    /// Build a walker from the `[watch]` section
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        Self::new(
            config.patterns.clone(),
            config.exclude_patterns.clone(),
            config.recursive,
        )
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Lazily walk `root`, yielding matching files in traversal order
    pub fn walk<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        let mut walk = WalkDir::new(root).follow_links(false).sort_by_file_name();
        if !self.recursive {
            walk = walk.max_depth(1);
        }

        walk.into_iter()
            .filter_entry(move |e| {
                // Prune whole trees early; `accepts` re-checks every file
                e.path() == root || !e.file_type().is_dir() || !self.prunes_dir(e.path())
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Walk error: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
            .filter(move |path| self.accepts(root, path))
    }

    /// Collect all matching files from a directory
    pub fn collect_files(&self, root: &Path) -> Vec<PathBuf> {
        self.walk(root).collect()
    }

    /// Check if a file path matches the include/exclude patterns
    pub fn matches(&self, path: &Path) -> bool {
        let path_str = match path.to_str() {
            Some(s) => s,
            None => return false,
        };

        // If no include patterns, include all
        let matches_include = self.include_patterns.is_empty()
            || self.include_patterns.iter().any(|p| {
                // Match against both full path and filename
                p.matches(path_str)
                    || path
                        .file_name()
                        .and_then(|f| f.to_str())
                        .map(|f| p.matches(f))
                        .unwrap_or(false)
            });

        if !matches_include {
            return false;
        }

        !self
            .exclude_patterns
            .iter()
            .any(|p| p.matches(path_str) || p.matches_path(path))
    }

    /// Whether `path` counts as input for a walk or watch of `root`
    ///
    /// Rejects paths outside `root`, paths nested below the root level
    /// for a non-recursive walker, and paths with a hidden or excluded
    /// directory between `root` and the file.
    pub fn accepts(&self, root: &Path, path: &Path) -> bool {
        let relative = match path.strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => return false,
        };

        let depth = relative.components().count();
        if depth == 0 || (!self.recursive && depth > 1) {
            return false;
        }

        if let Some(parent) = relative.parent() {
            let mut dir = root.to_path_buf();
            for part in parent.components() {
                dir.push(part);
                if self.prunes_dir(&dir) {
                    return false;
                }
            }
        }

        self.matches(path)
    }

    /// Hidden and excluded directories are never entered
    fn prunes_dir(&self, dir: &Path) -> bool {
        if let Some(name) = dir.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') {
                return true;
            }
        }

        if self.exclude_patterns.iter().any(|p| p.matches_path(dir)) {
            tracing::debug!("Skipping excluded directory: {:?}", dir);
            return true;
        }

        false
    }
}

fn compile(patterns: Vec<String>, kind: &str) -> Result<Vec<Pattern>> {
    patterns
        .into_iter()
        .map(|p| {
            Pattern::new(&p)
                .map_err(|e| PipeError::ConfigError(format!("Invalid {kind} pattern '{p}': {e}")))
        })
        .collect()
}
