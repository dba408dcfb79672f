//! The engine configuration grammar.
//!
//! Table, column group and index creation all take a comma-separated list
//! of `key=value` pairs. Values nest: `key=[a,b]` is a list, `key={...}` is
//! an object holding more pairs, and a bare `key` is a true flag. Column
//! lists use a parenthesized group, `columns=(a,b)`, which the grammar
//! treats as opaque scalar text.

use std::fmt;

use crate::error::{MapError, MapResult};

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// A boolean. `true` serializes as the bare key.
    Flag(bool),
    /// Scalar text (numbers are carried as their decimal text).
    Scalar(String),
    /// A bracketed list of scalars or objects.
    List(Vec<ConfigValue>),
    /// A braced, ordered set of pairs.
    Object(ConfigObject),
}

impl ConfigValue {
    /// Creates a scalar from anything displayable.
    pub fn scalar(value: impl fmt::Display) -> Self {
        Self::Scalar(value.to_string())
    }

    /// Creates a parenthesized group scalar: `(a,b,c)`.
    pub fn group<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::Scalar(format!("({})", joined.join(",")))
    }

    /// Creates a list. Items are scalars, flags or objects; a nested list
    /// is rejected.
    pub fn list(items: Vec<ConfigValue>) -> MapResult<Self> {
        if items.iter().any(|item| matches!(item, Self::List(_))) {
            return Err(MapError::invalid_config("list items cannot be lists"));
        }
        Ok(Self::List(items))
    }

    /// Returns the scalar text.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the flag value.
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the list items.
    #[must_use]
    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the nested object.
    #[must_use]
    pub fn as_object(&self) -> Option<&ConfigObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Splits a parenthesized group scalar back into its items.
    ///
    /// Returns `None` when the value is not a group.
    #[must_use]
    pub fn group_items(&self) -> Option<Vec<&str>> {
        let text = self.as_scalar()?;
        let inner = text.strip_prefix('(')?.strip_suffix(')')?;
        if inner.is_empty() {
            return Some(Vec::new());
        }
        Some(inner.split(',').collect())
    }

    /// Writes list items without brackets. A list built directly as a
    /// variant may still nest; its items are spliced into the outer list.
    fn write_list_items(items: &[ConfigValue], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match item {
                Self::List(inner) => Self::write_list_items(inner, f)?,
                other => other.write_item(f)?,
            }
        }
        Ok(())
    }

    fn write_item(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{b}"),
            Self::Scalar(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                Self::write_list_items(items, f)?;
                f.write_str("]")
            }
            Self::Object(object) => write!(f, "{{{object}}}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        Self::scalar(n)
    }
}

impl From<usize> for ConfigValue {
    fn from(n: usize) -> Self {
        Self::scalar(n)
    }
}

impl From<ConfigObject> for ConfigValue {
    fn from(o: ConfigObject) -> Self {
        Self::Object(o)
    }
}

/// An ordered set of configuration pairs.
///
/// Insertion order is preserved in the serialized text; the engine reads
/// keys by name, but tests and humans read the text in order.
///
/// # Example
///
/// ```rust
/// use docmap_common::config::{ConfigObject, ConfigValue};
///
/// let inner = ConfigObject::new()
///     .with("direction", 1i64)
///     .with("columns", ConfigValue::List(vec![ConfigValue::scalar(2)]));
/// let config = ConfigObject::new()
///     .with("columns", ConfigValue::group(["name", "age"]))
///     .with("unique", true)
///     .with("column0", inner);
/// assert_eq!(
///     config.to_string(),
///     "columns=(name,age),unique,column0={direction=1,columns=[2]}"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigObject {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigObject {
    /// Creates an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.push(key, value);
        self
    }

    /// Returns the first value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the scalar text stored under `key`.
    #[must_use]
    pub fn get_scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_scalar)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Appends every pair of `other`.
    pub fn extend(&mut self, other: ConfigObject) {
        self.entries.extend(other.entries);
    }
}

impl fmt::Display for ConfigObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match value {
                ConfigValue::Flag(true) => f.write_str(key)?,
                other => {
                    write!(f, "{key}=")?;
                    other.write_item(f)?;
                }
            }
        }
        Ok(())
    }
}

/// Parses configuration text back into an object.
///
/// Bare keys become `Flag(true)` and `key=false` becomes `Flag(false)`;
/// every other value is scalar text, a list or an object. Parenthesized
/// groups are kept whole as scalar text.
///
/// # Example
///
/// ```rust
/// use docmap_common::config::{parse_config, ConfigValue};
///
/// let config = parse_config("key_format=S,columns=(_id,a),immutable").unwrap();
/// assert_eq!(config.get_scalar("key_format"), Some("S"));
/// assert_eq!(config.get("immutable"), Some(&ConfigValue::Flag(true)));
/// ```
pub fn parse_config(text: &str) -> MapResult<ConfigObject> {
    let mut parser = Parser {
        input: text.chars().collect(),
        pos: 0,
    };
    let object = parser.object(None)?;
    if parser.pos < parser.input.len() {
        return Err(parser.error("trailing input"));
    }
    Ok(object)
}

struct Parser {
    input: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, reason: &str) -> MapError {
        let text: String = self.input.iter().collect();
        MapError::invalid_config(format!("{reason} at offset {} in '{text}'", self.pos))
    }

    fn expect(&mut self, c: char) -> MapResult<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn object(&mut self, close: Option<char>) -> MapResult<ConfigObject> {
        let mut object = ConfigObject::new();
        loop {
            match self.peek() {
                None if close.is_none() => break,
                None => return Err(self.error("unterminated object")),
                Some(c) if Some(c) == close => break,
                _ => {}
            }

            let key = self.token(&['=', ',', '}'])?;
            if key.is_empty() {
                return Err(self.error("empty key"));
            }
            if self.peek() == Some('=') {
                self.pos += 1;
                let value = self.value(&[',', '}'])?;
                object.push(key, value);
            } else {
                object.push(key, ConfigValue::Flag(true));
            }

            if self.peek() == Some(',') {
                self.pos += 1;
            }
        }
        Ok(object)
    }

    fn value(&mut self, stops: &[char]) -> MapResult<ConfigValue> {
        match self.peek() {
            Some('{') => {
                self.pos += 1;
                let object = self.object(Some('}'))?;
                self.expect('}')?;
                Ok(ConfigValue::Object(object))
            }
            Some('[') => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek() != Some(']') {
                    match self.peek() {
                        None => return Err(self.error("unterminated list")),
                        Some('[') => return Err(self.error("nested list")),
                        _ => {}
                    }
                    items.push(self.value(&[',', ']'])?);
                    if self.peek() == Some(',') {
                        self.pos += 1;
                    }
                }
                self.expect(']')?;
                Ok(ConfigValue::List(items))
            }
            _ => {
                let text = self.token(stops)?;
                if text == "false" {
                    Ok(ConfigValue::Flag(false))
                } else {
                    Ok(ConfigValue::Scalar(text))
                }
            }
        }
    }

    /// Reads text up to an unnested stop character. Parentheses nest.
    fn token(&mut self, stops: &[char]) -> MapResult<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            if depth == 0 && (stops.contains(&c) || c == ']') {
                break;
            }
            match c {
                '(' => depth += 1,
                ')' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| self.error("unbalanced ')'"))?;
                }
                _ => {}
            }
            text.push(c);
            self.pos += 1;
        }
        if depth > 0 {
            return Err(self.error("unbalanced '('"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_shapes() {
        let config = ConfigObject::new()
            .with("key_format", "S")
            .with("immutable", true)
            .with("unique", false)
            .with("list", ConfigValue::List(vec!["a".into(), "b".into()]))
            .with("obj", ConfigObject::new().with("x", 1i64));
        assert_eq!(
            config.to_string(),
            "key_format=S,immutable,unique=false,list=[a,b],obj={x=1}"
        );
    }

    #[test]
    fn test_group() {
        let group = ConfigValue::group(["_id", "name"]);
        assert_eq!(group, ConfigValue::Scalar("(_id,name)".to_string()));
        assert_eq!(group.group_items(), Some(vec!["_id", "name"]));
        assert_eq!(ConfigValue::group(Vec::<&str>::new()).group_items(), Some(vec![]));
        assert_eq!(ConfigValue::scalar("S").group_items(), None);
    }

    #[test]
    fn test_parse_round_trip_of_index_metadata() {
        let text = "key_format=SS,columns=(value1,value2),extractor=multikey,\
                    app_metadata={table_value_format=SSuu,index_id=test,columns=2,\
                    column0={direction=1,ngrams=3,extractor=ngrams,format=S,columns=[1]},\
                    column1={direction=1,format=S,columns=[2]}}";
        let config = parse_config(text).unwrap();
        assert_eq!(config.to_string(), text);

        let meta = config.get("app_metadata").unwrap().as_object().unwrap();
        assert_eq!(meta.get_scalar("columns"), Some("2"));
        let column0 = meta.get("column0").unwrap().as_object().unwrap();
        assert_eq!(column0.get_scalar("ngrams"), Some("3"));
        assert_eq!(
            column0.get("columns").unwrap().as_list().unwrap(),
            &[ConfigValue::scalar(1)]
        );
        assert_eq!(
            config.get("columns").unwrap().group_items(),
            Some(vec!["value1", "value2"])
        );
    }

    #[test]
    fn test_parse_flags() {
        let config = parse_config("immutable,unique=false").unwrap();
        assert_eq!(config.get("immutable"), Some(&ConfigValue::Flag(true)));
        assert_eq!(config.get("unique"), Some(&ConfigValue::Flag(false)));
        assert!(parse_config("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_config("a={b=1").is_err());
        assert!(parse_config("a=[1,2").is_err());
        assert!(parse_config("columns=(a,b").is_err());
        assert!(parse_config("=x").is_err());
        assert!(parse_config("a=1}").is_err());
    }

    #[test]
    fn test_lists_never_nest() {
        let err = parse_config("x=[[a]]").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidConfig);
        assert!(parse_config("x=[a,{b=[1]}]").is_ok());

        let nested = vec![ConfigValue::List(vec!["a".into()])];
        assert!(ConfigValue::list(nested.clone()).is_err());
        let flat = ConfigValue::list(vec!["a".into(), ConfigObject::new().with("b", 1i64).into()]);
        assert!(flat.is_ok());

        let config = ConfigObject::new().with("x", ConfigValue::List(nested));
        assert_eq!(config.to_string(), "x=[a]");
        assert!(parse_config(&config.to_string()).is_ok());
    }
}
