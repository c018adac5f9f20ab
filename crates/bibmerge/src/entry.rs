//! BibTeX entry data structures

use indexmap::IndexMap;

/// A single BibTeX field (key-value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibField {
    pub key: String,
    pub value: String,
}

/// A parsed BibTeX entry.
///
/// The entry type is kept exactly as written in the source (`article`,
/// `InProceedings`, ...). Fields keep their first-insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub fields: Vec<BibField>,
}

impl BibEntry {
    /// Create a new entry with no fields
    pub fn new(entry_type: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            fields: Vec::new(),
        }
    }

    /// Set a field, replacing the value in place if the name already exists
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.key == key) {
            Some(field) => field.value = value,
            None => self.fields.push(BibField { key, value }),
        }
    }

    /// Builder-style variant of [`BibEntry::set_field`]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Get a field value by its exact name
    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }

    /// Get the author field
    pub fn author(&self) -> Option<&str> {
        self.get_field("author")
    }

    /// Get the year field
    pub fn year(&self) -> Option<&str> {
        self.get_field("year")
    }

    /// Get the title field
    pub fn title(&self) -> Option<&str> {
        self.get_field("title")
    }

    /// Length of the longest field name in this entry
    pub fn longest_field_name(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.key.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Entries of one file (or of a merge result), keyed by cite key.
///
/// Iteration follows insertion order. Re-inserting an existing key replaces
/// the entry but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryCollection {
    entries: IndexMap<String, BibEntry>,
}

impl EntryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, entry: BibEntry) -> Option<BibEntry> {
        self.entries.insert(key.into(), entry)
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut BibEntry> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BibEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Length of the longest field name across every entry
    pub fn longest_field_name(&self) -> usize {
        self.entries
            .values()
            .map(BibEntry::longest_field_name)
            .max()
            .unwrap_or(0)
    }
}

impl IntoIterator for EntryCollection {
    type Item = (String, BibEntry);
    type IntoIter = indexmap::map::IntoIter<String, BibEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, BibEntry)> for EntryCollection {
    fn from_iter<T: IntoIterator<Item = (String, BibEntry)>>(iter: T) -> Self {
        let mut collection = Self::new();
        for (key, entry) in iter {
            collection.insert(key, entry);
        }
        collection
    }
}
