//! BibTeX parser implementation using nom
//!
//! A single forward pass over the text. Each `@type{key, ...}` block is read
//! with an explicit brace-depth cursor, so braced values may contain nested
//! braces and `@` characters. Blocks that cannot be read are skipped and
//! reported as [`ParseDiagnostic`]s instead of being dropped silently.
//!
//! Entries whose key slot holds no word characters (`@article{, ...}`) get a
//! synthesized key, see [`crate::cite_key`]. They are stored after all keyed
//! entries of the same file, so a synthesized key overwrites a keyed entry
//! that happens to share it.
//!
//! Not handled: `@string` macros, `#` concatenation, cross-references.
//! `@comment`, `@preamble` and `@string` blocks are skipped.

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    IResult,
};

use crate::cite_key::synthesize_key;
use crate::entry::{BibEntry, EntryCollection};

/// Why part of the input was not turned into (part of) an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// `@comment`, `@preamble` or `@string`
    UnsupportedBlock,
    /// An `@` that does not start a readable entry; the block is dropped
    MalformedBlock,
    /// A field that could not be read; the rest of the entry is kept
    MalformedField,
    /// The entry's closing brace is missing; the entry is kept
    Unterminated,
}

impl DiagnosticKind {
    /// Whether the whole block was dropped
    pub fn is_skipped_block(self) -> bool {
        matches!(self, Self::UnsupportedBlock | Self::MalformedBlock)
    }
}

/// A note about input that was skipped or repaired while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub line: u32,
    pub column: u32,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Result of parsing one BibTeX file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub entries: EntryCollection,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParsedFile {
    /// Number of `@` blocks that were dropped entirely
    pub fn skipped_blocks(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind.is_skipped_block())
            .count()
    }
}

/// Error type for parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("entry at line {line} has neither an author nor a title, cannot generate a key")]
    KeyGeneration { line: u32 },
}

/// Parse the full text of a BibTeX file
pub fn parse(input: &str) -> Result<ParsedFile, ParseError> {
    let mut keyed: Vec<(String, BibEntry)> = Vec::new();
    let mut keyless: Vec<(&str, BibEntry)> = Vec::new();
    let mut issues: Vec<Issue<'_>> = Vec::new();

    let mut remaining = input;
    while let Some(pos) = remaining.find('@') {
        let block = &remaining[pos..];

        match parse_block(block, &mut issues) {
            Block::Entry { key, entry, rest } => {
                match key {
                    KeySlot::Keyed(key) => keyed.push((key, entry)),
                    KeySlot::Keyless => keyless.push((block, entry)),
                }
                remaining = rest;
            }
            Block::Unsupported { entry_type, rest } => {
                issues.push(Issue {
                    at: block,
                    kind: DiagnosticKind::UnsupportedBlock,
                    message: format!("@{} block ignored", entry_type),
                });
                remaining = rest;
            }
            Block::Malformed { message } => {
                issues.push(Issue {
                    at: block,
                    kind: DiagnosticKind::MalformedBlock,
                    message: message.to_string(),
                });
                remaining = &block[1..];
            }
        }
    }

    let mut entries = EntryCollection::new();
    for (key, entry) in keyed {
        if entries.insert(key.clone(), entry).is_some() {
            tracing::debug!("duplicate key `{}` in file, keeping the later entry", key);
        }
    }
    for (at, entry) in keyless {
        let Some(key) = synthesize_key(&entry) else {
            let (line, _) = LineIndex::new(input).position(at);
            return Err(ParseError::KeyGeneration { line });
        };
        if entries.insert(key.clone(), entry).is_some() {
            tracing::debug!("generated key `{}` replaces an earlier entry", key);
        }
    }

    let lines = LineIndex::new(input);
    let diagnostics = issues
        .into_iter()
        .map(|issue| {
            let (line, column) = lines.position(issue.at);
            ParseDiagnostic {
                line,
                column,
                kind: issue.kind,
                message: issue.message,
            }
        })
        .collect();

    Ok(ParsedFile {
        entries,
        diagnostics,
    })
}

/// A diagnostic before its position is resolved. `at` is always a suffix of
/// the parsed input.
struct Issue<'a> {
    at: &'a str,
    kind: DiagnosticKind,
    message: String,
}

enum KeySlot {
    Keyed(String),
    Keyless,
}

enum Block<'a> {
    Entry {
        key: KeySlot,
        entry: BibEntry,
        rest: &'a str,
    },
    Unsupported {
        entry_type: &'a str,
        rest: &'a str,
    },
    Malformed {
        message: &'static str,
    },
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parse one block starting at `@`
fn parse_block<'a>(block: &'a str, issues: &mut Vec<Issue<'a>>) -> Block<'a> {
    let Ok((body, entry_type)) = entry_header(block) else {
        return Block::Malformed {
            message: "expected `@type{` after `@`",
        };
    };

    if matches!(
        entry_type.to_ascii_lowercase().as_str(),
        "comment" | "preamble" | "string"
    ) {
        return match find_closing_brace(body) {
            Some(end) => Block::Unsupported {
                entry_type,
                rest: &body[end + 1..],
            },
            None => Block::Malformed {
                message: "unbalanced braces",
            },
        };
    }

    let (fields, key) = match key_slot(body) {
        Ok(slot) => slot,
        Err(message) => return Block::Malformed { message },
    };

    let mut entry = BibEntry::new(entry_type);
    let (rest, terminated) = parse_fields(fields, &mut entry, issues);
    if !terminated {
        issues.push(Issue {
            at: block,
            kind: DiagnosticKind::Unterminated,
            message: format!("@{} entry is missing its closing brace", entry_type),
        });
    }

    Block::Entry { key, entry, rest }
}

/// `@type{`, returning the type and the text after the opening brace
fn entry_header(input: &str) -> IResult<&str, &str> {
    let (rest, _) = char('@')(input)?;
    let (rest, entry_type) = take_while1(is_word_char)(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('{')(rest)?;
    Ok((rest, entry_type))
}

/// Read the key slot up to the first comma.
///
/// A slot of word characters is a key; a slot with no word characters at all
/// marks a key-less entry. `@type{key}` is a keyed entry without fields.
fn key_slot(input: &str) -> Result<(&str, KeySlot), &'static str> {
    for (i, c) in input.char_indices() {
        match c {
            ',' => {
                let slot = input[..i].trim();
                let key = if slot.chars().all(is_word_char) && !slot.is_empty() {
                    KeySlot::Keyed(slot.to_string())
                } else if !slot.chars().any(is_word_char) {
                    KeySlot::Keyless
                } else {
                    return Err("cite key must consist of letters, digits and underscores");
                };
                return Ok((&input[i + 1..], key));
            }
            '}' => {
                let slot = input[..i].trim();
                if !slot.is_empty() && slot.chars().all(is_word_char) {
                    return Ok((&input[i..], KeySlot::Keyed(slot.to_string())));
                }
                return Err("entry has neither a key nor fields");
            }
            '{' | '=' | '@' => return Err("expected a cite key followed by `,`"),
            _ => {}
        }
    }
    Err("entry ends before its cite key")
}

/// Parse `name = value` pairs until the entry's closing brace.
///
/// Returns the text after the entry and whether the closing brace was found.
/// A top-level `@` or the end of input also ends the entry.
fn parse_fields<'a>(
    mut input: &'a str,
    entry: &mut BibEntry,
    issues: &mut Vec<Issue<'a>>,
) -> (&'a str, bool) {
    loop {
        let rest = input.trim_start_matches(|c: char| c.is_whitespace() || c == ',');

        if let Some(after) = rest.strip_prefix('}') {
            return (after, true);
        }
        if rest.is_empty() || rest.starts_with('@') {
            return (rest, false);
        }

        match field(rest) {
            Ok((after, (name, value))) => {
                entry.set_field(name, value.trim());
                let after = after.trim_start();
                if after.is_empty() || after.starts_with(&[',', '}', '@'][..]) {
                    input = after;
                } else {
                    issues.push(Issue {
                        at: after,
                        kind: DiagnosticKind::MalformedField,
                        message: format!("unexpected text after the value of `{}`", name),
                    });
                    input = recover(after);
                }
            }
            Err(_) => {
                issues.push(Issue {
                    at: rest,
                    kind: DiagnosticKind::MalformedField,
                    message: "expected `name = {value}`".to_string(),
                });
                input = recover(rest);
            }
        }
    }
}

/// Parse a single field (name = value)
fn field(input: &str) -> IResult<&str, (&str, &str)> {
    let (rest, name) = take_while1(is_word_char)(input)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, _) = multispace0(rest)?;
    let (rest, value) = alt((
        braced_value,
        quoted_value,
        take_while1(|c: char| c.is_alphanumeric() || "_-.:/".contains(c)),
    ))(rest)?;

    Ok((rest, (name.trim(), value)))
}

/// Parse a braced value {content}, returning the content
fn braced_value(input: &str) -> IResult<&str, &str> {
    let Some(body) = input.strip_prefix('{') else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        )));
    };

    match find_closing_brace(body) {
        Some(end) => Ok((&body[end + 1..], &body[..end])),
        None => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))),
    }
}

/// Parse a quoted value "content", returning the content.
///
/// Braces inside the quotes must balance, since the writer re-emits the value
/// in braces.
fn quoted_value(input: &str) -> IResult<&str, &str> {
    let fail = || {
        nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Char,
        ))
    };
    let body = input.strip_prefix('"').ok_or_else(fail)?;

    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'"' if depth == 0 => return Ok((&body[pos + 1..], &body[..pos])),
            b'{' => depth += 1,
            b'}' if depth == 0 => return Err(fail()),
            b'}' => depth -= 1,
            b'\\' => {
                // Skip escaped character
                pos += 1;
            }
            _ => {}
        }
        pos += 1;
    }

    Err(fail())
}

/// Byte offset of the brace closing an already-opened group, tracking nesting
fn find_closing_brace(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut depth = 1usize;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            b'\\' => {
                // Skip escaped character
                pos += 1;
            }
            _ => {}
        }
        pos += 1;
    }

    None
}

/// Skip a malformed field: stop at the next top-level `,`, `}` or `@` outside
/// quotes.
///
/// If braces never balance, fall back to the next `@` anywhere.
fn recover(input: &str) -> &str {
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, c) in input.char_indices() {
        match c {
            '"' if depth == 0 => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            ',' | '}' | '@' if depth == 0 => return &input[i..],
            _ => {}
        }
    }

    match input.find('@') {
        Some(i) => &input[i..],
        None => &input[input.len()..],
    }
}

/// Line start offsets of a text, built in one pass
struct LineIndex<'a> {
    input: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(input: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(input.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { input, line_starts }
    }

    /// 1-based line and column of `at`, which must be a suffix of the input
    fn position(&self, at: &str) -> (u32, u32) {
        let offset = self.input.len() - at.len();
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self.input[line_start..offset].chars().count() + 1;
        (line as u32, column as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_entry() {
        let input = r#"
@article{Smith2024,
    author = {John Smith},
    title = {A Great Paper},
    year = {2024},
    journal = {Nature},
}
"#;
        let result = parse(input).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert!(result.diagnostics.is_empty());

        let entry = result.entries.get("Smith2024").unwrap();
        assert_eq!(entry.entry_type, "article");
        assert_eq!(entry.author(), Some("John Smith"));
        assert_eq!(entry.title(), Some("A Great Paper"));
        assert_eq!(entry.year(), Some("2024"));
        let names: Vec<_> = entry.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(names, vec!["author", "title", "year", "journal"]);
    }

    #[test]
    fn test_values_are_trimmed() {
        let input = "@misc{k, note = {   spaced out \n },}";
        let result = parse(input).unwrap();
        assert_eq!(
            result.entries.get("k").unwrap().get_field("note"),
            Some("spaced out")
        );
    }

    #[test]
    fn test_parse_nested_braces() {
        let input = "@article{Test2024, title = {A {B}ook about {LaTeX}}}";
        let result = parse(input).unwrap();
        assert_eq!(
            result.entries.get("Test2024").unwrap().title(),
            Some("A {B}ook about {LaTeX}")
        );
    }

    #[test]
    fn test_at_sign_inside_braced_value() {
        let input = "@misc{m, howpublished = {mail me@example.org}, year = {2001}}";
        let result = parse(input).unwrap();
        let entry = result.entries.get("m").unwrap();
        assert_eq!(entry.get_field("howpublished"), Some("mail me@example.org"));
        assert_eq!(entry.year(), Some("2001"));
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_quoted_and_bare_values() {
        let input = r#"@article{q, title = "Quoted {Title}", year = 1999, month = jan}"#;
        let result = parse(input).unwrap();
        let entry = result.entries.get("q").unwrap();
        assert_eq!(entry.title(), Some("Quoted {Title}"));
        assert_eq!(entry.year(), Some("1999"));
        assert_eq!(entry.get_field("month"), Some("jan"));
    }

    #[test]
    fn test_keyless_entry_gets_synthesized_key() {
        let input =
            "@article{, author = {Smith, John}, year = {2021}, title = {Deep Learning}}";
        let result = parse(input).unwrap();
        assert_eq!(result.entries.keys().collect::<Vec<_>>(), vec!["smith2021deep"]);
    }

    #[test]
    fn test_keyless_entry_with_punctuation_slot() {
        let input = "@book{ -- , title = {Rust Book}}";
        let result = parse(input).unwrap();
        assert!(result.entries.contains_key("rust"));
    }

    #[test]
    fn test_keyless_entry_without_author_or_title_fails() {
        let input = "@misc{k, title = {fine}}\n\n@misc{, year = {2020}}";
        assert_eq!(parse(input), Err(ParseError::KeyGeneration { line: 3 }));
    }

    #[test]
    fn test_keyless_entries_are_stored_after_keyed_ones() {
        let input = r#"
@misc{, title = {Alpha}}
@misc{beta, title = {Beta}}
@misc{alpha, note = {keyed}}
"#;
        let result = parse(input).unwrap();
        // The synthesized key `alpha` replaces the keyed entry in place
        assert_eq!(result.entries.keys().collect::<Vec<_>>(), vec!["beta", "alpha"]);
        let alpha = result.entries.get("alpha").unwrap();
        assert_eq!(alpha.title(), Some("Alpha"));
        assert_eq!(alpha.get_field("note"), None);
    }

    #[test]
    fn test_duplicate_key_later_entry_wins() {
        let input = "@misc{d, note = {first}}\n@misc{x, note = {x}}\n@book{d, note = {second}}";
        let result = parse(input).unwrap();
        assert_eq!(result.entries.keys().collect::<Vec<_>>(), vec!["d", "x"]);
        let d = result.entries.get("d").unwrap();
        assert_eq!(d.entry_type, "book");
        assert_eq!(d.get_field("note"), Some("second"));
    }

    #[test]
    fn test_duplicate_field_replaces_value() {
        let input = "@misc{d, note = {one}, year = {1}, note = {two}}";
        let result = parse(input).unwrap();
        let d = result.entries.get("d").unwrap();
        assert_eq!(d.fields.len(), 2);
        assert_eq!(d.fields[0].value, "two");
    }

    #[test]
    fn test_malformed_key_is_reported() {
        let input = "@article{smith-2020, title = {Dashed}}\n@article{ok, title = {Fine}}";
        let result = parse(input).unwrap();
        assert_eq!(result.entries.keys().collect::<Vec<_>>(), vec!["ok"]);
        assert_eq!(result.skipped_blocks(), 1);
        let diagnostic = &result.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::MalformedBlock);
        assert_eq!((diagnostic.line, diagnostic.column), (1, 1));
    }

    #[test]
    fn test_unsupported_blocks_are_skipped() {
        let input = r#"
@comment{ a {nested} comment }
@string{jphys = "Journal of Physics"}
@article{k, journal = {J}}
"#;
        let result = parse(input).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.skipped_blocks(), 2);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::UnsupportedBlock));
    }

    #[test]
    fn test_stray_at_sign_outside_entries() {
        let input = "Contact: someone@example.org\n@misc{k, title = {T}}";
        let result = parse(input).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].line, 1);
        assert_eq!(result.diagnostics[0].column, 17);
    }

    #[test]
    fn test_malformed_field_keeps_rest_of_entry() {
        let input = "@misc{k, title = {T}, = {orphan}, year = {2000}}";
        let result = parse(input).unwrap();
        let entry = result.entries.get("k").unwrap();
        assert_eq!(entry.title(), Some("T"));
        assert_eq!(entry.year(), Some("2000"));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MalformedField);
        assert_eq!(result.skipped_blocks(), 0);
    }

    #[test]
    fn test_quoted_value_with_unbalanced_braces_is_reported() {
        let input = r#"@misc{k, title = "a } b", note = "ok {x}", year = {2000}}"#;
        let result = parse(input).unwrap();
        let entry = result.entries.get("k").unwrap();
        assert_eq!(entry.title(), None);
        assert_eq!(entry.get_field("note"), Some("ok {x}"));
        assert_eq!(entry.year(), Some("2000"));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MalformedField);
        assert_eq!(result.diagnostics[0].column, 10);

        let written = crate::formatter::format_collection(&result.entries);
        let reparsed = parse(&written).unwrap();
        assert!(reparsed.diagnostics.is_empty());
        assert_eq!(reparsed.entries, result.entries);

        let result = parse(r#"@misc{k, title = "{a", year = {2000}}"#).unwrap();
        assert_eq!(result.entries.get("k").unwrap().title(), None);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::MalformedField);
    }

    #[test]
    fn test_unterminated_entry_ends_at_next_entry() {
        let input = "@misc{a, title = {A},\n@misc{b, title = {B}}";
        let result = parse(input).unwrap();
        assert_eq!(result.entries.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::Unterminated);
    }

    #[test]
    fn test_entry_without_fields() {
        let result = parse("@misc{lonely}").unwrap();
        assert!(result.entries.get("lonely").unwrap().fields.is_empty());
    }

    #[test]
    fn test_line_index_positions() {
        let input = "ab\n\nc\u{e9}d\n@";
        let lines = LineIndex::new(input);
        assert_eq!(lines.position(input), (1, 1));
        assert_eq!(lines.position(&input[1..]), (1, 2));
        assert_eq!(lines.position(&input[3..]), (2, 1));
        assert_eq!(lines.position(&input[7..]), (3, 3));
        assert_eq!(lines.position(&input[input.len() - 1..]), (4, 1));
        assert_eq!(lines.position(""), (4, 2));
    }

    #[test]
    fn test_diagnostic_positions_across_many_entries() {
        let mut input = String::new();
        for i in 0..200 {
            input.push_str(&format!("@misc{{, title = {{T{}}}}}\n", i));
        }
        input.push_str("@comment{done}\n  @bad\n");

        let result = parse(&input).unwrap();
        assert_eq!(result.entries.len(), 200);
        let positions: Vec<_> = result
            .diagnostics
            .iter()
            .map(|d| (d.line, d.column, d.kind))
            .collect();
        assert_eq!(
            positions,
            vec![
                (201, 1, DiagnosticKind::UnsupportedBlock),
                (202, 3, DiagnosticKind::MalformedBlock),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let result = parse("").unwrap();
        assert!(result.entries.is_empty());
        assert!(result.diagnostics.is_empty());

        let result = parse("just some text, no entries").unwrap();
        assert!(result.entries.is_empty());
    }
}
