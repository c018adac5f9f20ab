//! Source file discovery
//!
//! Lists the files of one directory whose names match a glob and orders them
//! newest modification time first. That order is the merge priority.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use globset::{Glob, GlobMatcher};

use crate::config::ConfigError;
use crate::error::{BibMergeError, Result};

/// File-name glob: `*`, `?`, `[...]` classes and `{a,b}` alternatives.
///
/// Like shell globs, a wildcard never matches a leading `.`, so hidden files
/// are only picked up by patterns that start with a dot.
#[derive(Debug, Clone)]
pub struct FilePattern {
    glob: String,
    matcher: GlobMatcher,
}

impl FilePattern {
    pub fn new(glob: &str) -> std::result::Result<Self, ConfigError> {
        if glob.is_empty() {
            return Err(ConfigError::InvalidPattern(
                "pattern must not be empty".to_string(),
            ));
        }
        if glob.contains(&['/', '\\'][..]) {
            return Err(ConfigError::InvalidPattern(format!(
                "`{}` must match file names, not paths",
                glob
            )));
        }

        let matcher = Glob::new(glob)
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?
            .compile_matcher();
        Ok(Self {
            glob: glob.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }

    pub fn matches(&self, file_name: &str) -> bool {
        if file_name.starts_with('.') && !self.glob.starts_with('.') {
            return false;
        }
        self.matcher.is_match(file_name)
    }
}

/// Source files ordered newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFileSet {
    files: Vec<PathBuf>,
}

impl SourceFileSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }
}

impl IntoIterator for SourceFileSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// List the regular files directly inside `dir` matching `pattern`, newest
/// modification time first. Files with equal times are ordered by name.
pub fn scan(dir: impl AsRef<Path>, pattern: &FilePattern) -> Result<SourceFileSet> {
    let dir = dir.as_ref();
    let read_dir = fs::read_dir(dir).map_err(|e| BibMergeError::fs(dir, e))?;

    let mut found: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| BibMergeError::fs(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            tracing::debug!("Skipping non UTF-8 file name {:?}", name);
            continue;
        };
        if !pattern.matches(name) {
            continue;
        }

        let path = entry.path();
        let metadata = fs::metadata(&path).map_err(|e| BibMergeError::fs(&path, e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|e| BibMergeError::fs(&path, e))?;
        found.push((path, modified));
    }

    found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    tracing::debug!(
        "Found {} files matching {:?} in {:?}",
        found.len(),
        pattern.as_str(),
        dir
    );

    Ok(SourceFileSet {
        files: found.into_iter().map(|(path, _)| path).collect(),
    })
}
