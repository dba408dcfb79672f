//! Index descriptors as callers declare them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction of one index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending (+1).
    #[default]
    Ascending,
    /// Descending (-1).
    Descending,
}

impl Direction {
    /// Returns +1 or -1.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// A token extractor applied to text columns before indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tokenizer {
    /// Every substring of the given width.
    Ngrams(u32),
    /// Whitespace-separated words.
    Words,
}

impl Tokenizer {
    /// Returns the extractor name the engine registers this tokenizer as.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ngrams(_) => "ngrams",
            Self::Words => "words",
        }
    }
}

impl fmt::Display for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ngrams(width) => write!(f, "ngrams({width})"),
            Self::Words => f.write_str("words"),
        }
    }
}

/// One column of an index.
///
/// A simple column references a table column by name and lets the engine
/// extract it natively. An extended column can combine several source
/// columns into one key segment, run a tokenizer over them, or sort
/// descending; any extended column switches the whole index to the
/// generic extractor and compound collator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexColumn {
    /// A bare column reference.
    Simple(String),
    /// A derived key segment.
    Extended {
        /// Source columns feeding the segment.
        columns: Vec<String>,
        /// Sort direction of the segment.
        direction: Direction,
        /// Optional tokenizer.
        extractor: Option<Tokenizer>,
    },
}

impl IndexColumn {
    /// A bare column reference.
    pub fn simple(name: impl Into<String>) -> Self {
        Self::Simple(name.into())
    }

    /// A single column sorted descending.
    pub fn descending(name: impl Into<String>) -> Self {
        Self::Extended {
            columns: vec![name.into()],
            direction: Direction::Descending,
            extractor: None,
        }
    }

    /// N-grams of a text column.
    pub fn ngrams(name: impl Into<String>, width: u32) -> Self {
        Self::Extended {
            columns: vec![name.into()],
            direction: Direction::Ascending,
            extractor: Some(Tokenizer::Ngrams(width)),
        }
    }

    /// Words of a text column.
    pub fn words(name: impl Into<String>) -> Self {
        Self::Extended {
            columns: vec![name.into()],
            direction: Direction::Ascending,
            extractor: Some(Tokenizer::Words),
        }
    }

    /// Returns true for extended columns.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        matches!(self, Self::Extended { .. })
    }

    /// Returns the referenced source column names.
    #[must_use]
    pub fn source_columns(&self) -> Vec<&str> {
        match self {
            Self::Simple(name) => vec![name.as_str()],
            Self::Extended { columns, .. } => columns.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for IndexColumn {
    fn from(name: &str) -> Self {
        Self::simple(name)
    }
}

/// Pass-through index options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Native extractor name (simple indexes only).
    #[serde(default)]
    pub extractor: Option<String>,
    /// Native collator name (simple indexes only).
    #[serde(default)]
    pub collator: Option<String>,
    /// Index entries never change after insert.
    #[serde(default)]
    pub immutable: bool,
    /// Reject duplicate keys.
    #[serde(default)]
    pub unique: bool,
    /// Extra `key=value` pairs (simple indexes only).
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

/// A named index over a table.
///
/// # Example
///
/// ```rust
/// use docmap_schema::index::{IndexColumn, IndexDescriptor};
///
/// let index = IndexDescriptor::new("by_name")
///     .column("name")
///     .column(IndexColumn::descending("age"));
/// assert!(index.is_extended());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Columns in key order.
    pub columns: Vec<IndexColumn>,
    /// Pass-through options.
    #[serde(default)]
    pub options: IndexOptions,
}

impl IndexDescriptor {
    /// Creates an index with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            options: IndexOptions::default(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: impl Into<IndexColumn>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Sets the options.
    #[must_use]
    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Marks the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.options.unique = true;
        self
    }

    /// Returns true if any column is extended.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.columns.iter().any(IndexColumn::is_extended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_helpers() {
        assert!(!IndexColumn::simple("a").is_extended());
        assert!(IndexColumn::words("a").is_extended());
        assert_eq!(IndexColumn::descending("a").source_columns(), vec!["a"]);

        let composite = IndexColumn::Extended {
            columns: vec!["a".into(), "b".into()],
            direction: Direction::Ascending,
            extractor: Some(Tokenizer::Ngrams(3)),
        };
        assert_eq!(composite.source_columns(), vec!["a", "b"]);
    }

    #[test]
    fn test_direction_and_tokenizer() {
        assert_eq!(Direction::Ascending.as_i32(), 1);
        assert_eq!(Direction::Descending.as_i32(), -1);
        assert_eq!(Tokenizer::Ngrams(3).name(), "ngrams");
        assert_eq!(Tokenizer::Ngrams(3).to_string(), "ngrams(3)");
    }
}
