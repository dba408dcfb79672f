//! Documents: named field values.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use super::value::Value;

/// A document: a mapping from field names to values.
///
/// Documents carry no identity of their own in the mapping layer. Callers
/// build them, the projector turns them into positional tuples on write,
/// and the result mapper rebuilds them from tuples on read. Field order is
/// not significant; equality compares names and values.
///
/// # Example
///
/// ```rust
/// use docmap_common::types::{Document, Value};
///
/// let doc: Document = [("_id", Value::from("a")), ("n", Value::from(1i64))]
///     .into_iter()
///     .collect();
/// assert_eq!(doc.get("n"), Some(&Value::Int(1)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Removes a field.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Iterates field names in name order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Moves every field of `other` into this document, overwriting on
    /// collision.
    pub fn merge(&mut self, other: Document) {
        self.fields.extend(other.fields);
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut doc = Document::new();
        assert!(doc.is_empty());
        doc.insert("a", "x");
        doc.insert("b", 2i64);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("a"), Some(&Value::from("x")));
        assert_eq!(doc.remove("b"), Some(Value::Int(2)));
        assert!(!doc.contains_key("b"));
    }

    #[test]
    fn test_merge_and_equality_ignore_insertion_order() {
        let mut left = Document::new().with("a", 1i64);
        left.merge(Document::new().with("b", 2i64));
        let right = Document::new().with("b", 2i64).with("a", 1i64);
        assert_eq!(left, right);
        assert_eq!(left.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_display() {
        let doc = Document::new().with("a", "x").with("b", true);
        assert_eq!(doc.to_string(), "{a: \"x\", b: true}");
    }
}
