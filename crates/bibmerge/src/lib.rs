//! Merge a directory of BibTeX files into one de-duplicated bibliography
//!
//! The pipeline runs in three sequential steps:
//! - [`scan`] lists the input files, newest modification time first
//! - [`parse`] turns each file into an [`EntryCollection`]
//! - [`Merger`] folds the collections into one, and [`write_collection`]
//!   writes the result with aligned fields
//!
//! When two files define the same cite key, the entry with the greater `year`
//! wins conflicting fields; without years the newer file wins. Fields present
//! in only one of the entries are always kept.

mod cite_key;
pub mod config;
mod entry;
mod error;
mod formatter;
pub mod merge;
pub mod parser;
mod scanner;

use std::path::{Path, PathBuf};

pub use cite_key::synthesize_key;
pub use config::{ConfigError, MergeConfig, CONFIG_FILE_NAME};
pub use entry::{BibEntry, BibField, EntryCollection};
pub use error::{BibMergeError, Result};
pub use formatter::{format_collection, format_entry, write_collection};
pub use merge::{
    incoming_has_priority, merge_collections, merge_entries, MergeStats, Merger, YearOrder,
};
pub use parser::{parse, DiagnosticKind, ParseDiagnostic, ParseError, ParsedFile};
pub use scanner::{scan, FilePattern, SourceFileSet};

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Input files, in merge order
    pub files: Vec<PathBuf>,
    /// Entries written to the output
    pub entries_written: usize,
    /// `@` blocks dropped because they could not be read or are not entries
    pub skipped_blocks: usize,
    /// Every diagnostic, paired with the file it came from
    pub diagnostics: Vec<(PathBuf, ParseDiagnostic)>,
    pub stats: MergeStats,
}

/// Read and parse one file
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedFile> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| BibMergeError::fs(path, e))?;
    let parsed = parse(&content).map_err(|e| BibMergeError::in_file(path, e))?;

    for diagnostic in &parsed.diagnostics {
        tracing::warn!(
            "{}:{}:{}: {}",
            path.display(),
            diagnostic.line,
            diagnostic.column,
            diagnostic.message
        );
    }
    tracing::debug!("Parsed {} entries from {:?}", parsed.entries.len(), path);

    Ok(parsed)
}

/// Scan, parse, merge and write as described by `config`.
///
/// Nothing is written unless every input file was read and parsed.
pub fn run(config: &MergeConfig) -> Result<MergeReport> {
    config.validate()?;
    let pattern = config.file_pattern()?;

    let sources = scan(&config.bib_folder, &pattern)?;
    if sources.is_empty() {
        tracing::warn!(
            "No files matching {:?} in {:?}",
            pattern.as_str(),
            config.bib_folder
        );
    }

    let mut report = MergeReport::default();
    let mut collections = Vec::with_capacity(sources.len());
    for path in sources {
        let parsed = parse_file(&path)?;
        report.skipped_blocks += parsed.skipped_blocks();
        report.diagnostics.extend(
            parsed
                .diagnostics
                .into_iter()
                .map(|diagnostic| (path.clone(), diagnostic)),
        );
        collections.push(parsed.entries);
        report.files.push(path);
    }

    let mut merger = Merger::new(config.year_order);
    let merged = merger.merge_all(collections);
    report.stats = merger.stats();
    report.entries_written = merged.len();

    write_collection(&merged, &config.output)?;

    tracing::info!(
        "Merged {} files into {} entries ({} shared keys, {} skipped blocks)",
        report.files.len(),
        report.entries_written,
        report.stats.keys_merged,
        report.skipped_blocks
    );

    Ok(report)
}
