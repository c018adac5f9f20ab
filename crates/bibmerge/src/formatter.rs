//! BibTeX formatting module
//!
//! Converts an [`EntryCollection`] back to BibTeX text. The `=` of every field
//! in the output lines up in one column, sized by the longest field name in the
//! whole collection.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::entry::{BibEntry, EntryCollection};
use crate::error::{BibMergeError, Result};

/// Format a whole collection, one entry per block, each followed by a blank line
pub fn format_collection(collection: &EntryCollection) -> String {
    let width = collection.longest_field_name();
    let mut result = String::new();
    for (key, entry) in collection.iter() {
        format_entry_into(&mut result, key, entry, width);
    }
    result
}

/// Format a single entry with its own alignment
pub fn format_entry(key: &str, entry: &BibEntry) -> String {
    let mut result = String::new();
    format_entry_into(&mut result, key, entry, entry.longest_field_name());
    result
}

fn format_entry_into(result: &mut String, key: &str, entry: &BibEntry, width: usize) {
    // Entry type and cite key
    result.push('@');
    result.push_str(&entry.entry_type);
    result.push('{');
    result.push_str(key);
    result.push_str(",\n");

    for field in &entry.fields {
        result.push_str("  ");
        result.push_str(&field.key);
        result.push(' ');
        for _ in field.key.chars().count()..width {
            result.push(' ');
        }
        result.push_str("= {");
        result.push_str(&field.value);
        result.push_str("},\n");
    }

    result.push_str("}\n\n");
}

/// Write a collection to `path`, replacing any existing file
pub fn write_collection(collection: &EntryCollection, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| BibMergeError::fs(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(format_collection(collection).as_bytes())
        .and_then(|()| writer.flush())
        .map_err(|e| BibMergeError::fs(path, e))?;

    tracing::info!("Wrote {} entries to {:?}", collection.len(), path);
    Ok(())
}
