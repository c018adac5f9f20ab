//! Cite key synthesis for entries written without a key
//!
//! The generated key is `<author><year><title>`: the first token of the first
//! author's last name, the year, and the first title word. Author and title
//! parts are lower-cased. Only letters, digits and `_` are kept, so the key is
//! always one the parser reads back as a cite key.

use crate::entry::BibEntry;

/// Synthesize a key from the entry's `author`, `year` and `title` fields.
///
/// Returns `None` when the entry has neither an author nor a title.
///
/// ```
/// use bibmerge::{synthesize_key, BibEntry};
///
/// let entry = BibEntry::new("article")
///     .with_field("author", "Smith, John")
///     .with_field("year", "2021")
///     .with_field("title", "Deep Learning");
/// assert_eq!(synthesize_key(&entry).as_deref(), Some("smith2021deep"));
/// ```
pub fn synthesize_key(entry: &BibEntry) -> Option<String> {
    let author = entry.author();
    let title = entry.title();
    if author.is_none() && title.is_none() {
        return None;
    }

    let mut key = String::new();
    if let Some(author) = author {
        // "Last, First and ..." -> "Last"; "First Last" -> "First"
        let last_name = author.split(',').next().unwrap_or_default();
        push_word_chars(&mut key, &first_token(last_name).to_lowercase());
    }
    if let Some(year) = entry.year() {
        push_word_chars(&mut key, year);
    }
    if let Some(title) = title {
        push_word_chars(&mut key, &first_token(title).to_lowercase());
    }
    Some(key)
}

fn first_token(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or_default()
}

fn push_word_chars(key: &mut String, part: &str) {
    key.extend(part.chars().filter(|c| c.is_alphanumeric() || *c == '_'));
}
