//! Error types for the merge pipeline

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::parser::ParseError;

/// Fatal errors. Any of these aborts the run before the output is written.
#[derive(Debug, thiserror::Error)]
pub enum BibMergeError {
    #[error("I/O error on {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?}: cannot generate a key for the entry at line {line}: it has neither an author nor a title")]
    KeyGeneration { path: PathBuf, line: u32 },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BibMergeError {
    pub(crate) fn in_file(path: impl Into<PathBuf>, err: ParseError) -> Self {
        match err {
            ParseError::KeyGeneration { line } => Self::KeyGeneration {
                path: path.into(),
                line,
            },
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BibMergeError>;
