//! Schema compiler.
//!
//! Turns a declared schema (or a raw, pre-formatted column configuration)
//! into the positional column specs every other layer works from, plus the
//! key/value format strings and the table create config text.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use docmap_common::config::{ConfigObject, ConfigValue, TableOptions};
use docmap_common::constants::{
    COLGROUP_URI_PREFIX, DEFAULT_COLUMN_NAME, ID_NAME, KEY_COLUMN_INDEX, REMAINING_NAME,
    TABLE_URI_PREFIX,
};
use docmap_common::types::{join_formats, ColumnFormat, FormatCode, SemanticType};
use docmap_common::{MapError, MapResult};

use crate::entry::{SchemaEntry, SubSchema};
use crate::projection::Projection;

/// A compiled column: where it sits in the tuple and how it is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Physical format.
    pub column_format: ColumnFormat,
    /// Logical type.
    pub actual_type: SemanticType,
    /// Decode-only format, for types stored under a generic code.
    pub read_format: Option<FormatCode>,
    /// Position in the value tuple, or [`KEY_COLUMN_INDEX`] for the key.
    pub column_index: i32,
}

impl ColumnSpec {
    fn from_entry(name: &str, entry: &SchemaEntry, column_index: i32) -> Self {
        Self {
            name: name.to_string(),
            column_format: entry.column_format(),
            actual_type: entry.actual_type(),
            read_format: entry.read_format(),
            column_index,
        }
    }

    /// Returns true for the key column.
    #[must_use]
    pub fn is_key(&self) -> bool {
        self.column_index == KEY_COLUMN_INDEX
    }

    /// Returns true for the synthetic remaining-fields column.
    #[must_use]
    pub fn is_remaining(&self) -> bool {
        self.name == REMAINING_NAME
    }

    /// Returns the format a reader should request: the read format when the
    /// type has one, the physical format otherwise.
    #[must_use]
    pub fn effective_format(&self) -> ColumnFormat {
        self.read_format
            .map_or(self.column_format, ColumnFormat::new)
    }
}

/// A declared schema.
///
/// # Example
///
/// ```rust
/// use docmap_schema::{SchemaDefinition, SchemaEntry, SubSchema};
///
/// let schema = SchemaDefinition::new()
///     .field("_id", SchemaEntry::char_array(17).unwrap())
///     .field("name", SchemaEntry::string(None).unwrap())
///     .field("age", SchemaEntry::int())
///     .remaining(SubSchema::new().field("a", SchemaEntry::string(None).unwrap()));
/// assert_eq!(schema.fields().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition {
    fields: Vec<(String, SchemaEntry)>,
    remaining: Option<SubSchema>,
    options: TableOptions,
}

impl SchemaDefinition {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field. The first field must be `_id`.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, entry: SchemaEntry) -> Self {
        self.fields.push((name.into(), entry));
        self
    }

    /// Declares the fields packed into the remaining column.
    #[must_use]
    pub fn remaining(mut self, fields: SubSchema) -> Self {
        self.remaining = Some(fields);
        self
    }

    /// Sets table options.
    #[must_use]
    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the declared fields.
    #[must_use]
    pub fn fields(&self) -> &[(String, SchemaEntry)] {
        &self.fields
    }
}

/// A pre-formatted column configuration, used as is.
///
/// Omitted parts default to a record-number key and a single raw value
/// column: `columns=(_id,value)`, `key_format=r`, `value_format=u`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCollectionConfiguration {
    /// Column names, key first.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Key format.
    #[serde(default)]
    pub key_format: Option<ColumnFormat>,
    /// One format per value column. Defaults to `u` for every value column.
    #[serde(default)]
    pub value_format: Option<Vec<ColumnFormat>>,
    /// Table options.
    #[serde(default)]
    pub options: TableOptions,
}

/// Input of the schema compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// A typed schema.
    Schema(SchemaDefinition),
    /// A raw column configuration.
    Raw(RawCollectionConfiguration),
}

impl From<SchemaDefinition> for SchemaSource {
    fn from(schema: SchemaDefinition) -> Self {
        Self::Schema(schema)
    }
}

impl From<RawCollectionConfiguration> for SchemaSource {
    fn from(raw: RawCollectionConfiguration) -> Self {
        Self::Raw(raw)
    }
}

/// A column group and its create config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGroup {
    /// Group name.
    pub name: String,
    /// `colgroup:<table>:<name>`.
    pub uri: String,
    /// Member columns.
    pub columns: Vec<String>,
    /// Create config: `columns=(...)`.
    pub config: ConfigObject,
}

/// The result of compiling a schema for one table.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    table_name: String,
    key: ColumnSpec,
    values: Vec<ColumnSpec>,
    remaining: Vec<ColumnSpec>,
    lookup: HashMap<String, usize>,
    colgroups: Vec<ColumnGroup>,
    create_config: ConfigObject,
}

impl CompiledSchema {
    /// Compiles a schema source for the named table.
    ///
    /// Makes no engine calls.
    pub fn compile(table_name: &str, source: &SchemaSource) -> MapResult<Self> {
        let compiled = match source {
            SchemaSource::Schema(schema) => Self::compile_schema(table_name, schema)?,
            SchemaSource::Raw(raw) => Self::compile_raw(table_name, raw)?,
        };
        debug!(
            table = table_name,
            key_format = %compiled.key_format(),
            value_format = %compiled.value_format(),
            columns = compiled.values.len(),
            "compiled schema"
        );
        Ok(compiled)
    }

    fn compile_schema(table_name: &str, schema: &SchemaDefinition) -> MapResult<Self> {
        let (first_name, first_entry) = schema.fields.first().ok_or_else(|| MapError::SchemaOrder {
            message: format!("schema for '{table_name}' declares no '{ID_NAME}' column"),
        })?;
        if first_name != ID_NAME {
            return Err(MapError::SchemaOrder {
                message: format!("first column must be '{ID_NAME}', found '{first_name}'"),
            });
        }

        let mut seen = HashSet::new();
        for (name, _) in &schema.fields {
            if !seen.insert(name.as_str()) {
                return Err(MapError::DuplicateColumn { name: name.clone() });
            }
        }

        let key = ColumnSpec::from_entry(ID_NAME, first_entry, KEY_COLUMN_INDEX);
        let mut values: Vec<ColumnSpec> = schema.fields[1..]
            .iter()
            .enumerate()
            .map(|(i, (name, entry))| ColumnSpec::from_entry(name, entry, i as i32))
            .collect();

        let mut remaining = Vec::new();
        if let Some(sub) = &schema.remaining {
            if seen.contains(REMAINING_NAME) {
                return Err(MapError::DuplicateColumn {
                    name: REMAINING_NAME.to_string(),
                });
            }
            let remaining_index = values.len() as i32;
            for (name, entry) in sub.fields() {
                if !seen.insert(name.as_str()) {
                    return Err(MapError::DuplicateColumn { name: name.clone() });
                }
                remaining.push(ColumnSpec::from_entry(name, entry, remaining_index));
            }
            values.push(ColumnSpec {
                name: REMAINING_NAME.to_string(),
                column_format: ColumnFormat::new(FormatCode::Item),
                actual_type: SemanticType::Bson,
                read_format: None,
                column_index: remaining_index,
            });
        }

        Self::assemble(table_name, key, values, remaining, &schema.options)
    }

    fn compile_raw(table_name: &str, raw: &RawCollectionConfiguration) -> MapResult<Self> {
        let columns = raw
            .columns
            .clone()
            .unwrap_or_else(|| vec![ID_NAME.to_string(), DEFAULT_COLUMN_NAME.to_string()]);
        match columns.first() {
            Some(first) if first == ID_NAME => {}
            Some(first) => {
                return Err(MapError::SchemaOrder {
                    message: format!("first column must be '{ID_NAME}', found '{first}'"),
                })
            }
            None => {
                return Err(MapError::SchemaOrder {
                    message: format!("raw configuration for '{table_name}' lists no columns"),
                })
            }
        }

        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(MapError::DuplicateColumn { name: name.clone() });
            }
        }

        let value_names = &columns[1..];
        let formats = match &raw.value_format {
            Some(formats) if formats.len() != value_names.len() => {
                return Err(MapError::invalid_config(format!(
                    "{} value formats for {} value columns",
                    formats.len(),
                    value_names.len()
                )))
            }
            Some(formats) => formats.clone(),
            None => vec![ColumnFormat::new(FormatCode::Item); value_names.len()],
        };

        let key = ColumnSpec {
            name: ID_NAME.to_string(),
            column_format: raw
                .key_format
                .unwrap_or_else(|| ColumnFormat::new(FormatCode::RecordId)),
            actual_type: SemanticType::ULong,
            read_format: None,
            column_index: KEY_COLUMN_INDEX,
        };
        let values = value_names
            .iter()
            .zip(formats)
            .enumerate()
            .map(|(i, (name, column_format))| ColumnSpec {
                name: name.clone(),
                column_format,
                actual_type: SemanticType::Binary,
                read_format: None,
                column_index: i as i32,
            })
            .collect();

        Self::assemble(table_name, key, values, Vec::new(), &raw.options)
    }

    fn assemble(
        table_name: &str,
        key: ColumnSpec,
        values: Vec<ColumnSpec>,
        remaining: Vec<ColumnSpec>,
        options: &TableOptions,
    ) -> MapResult<Self> {
        options.validate()?;

        let lookup: HashMap<String, usize> = values
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name.clone(), i))
            .collect();

        let mut colgroups = Vec::with_capacity(options.colgroups.len());
        for (name, members) in &options.colgroups {
            if let Some(unknown) = members.iter().find(|m| !lookup.contains_key(m.as_str())) {
                return Err(MapError::unknown_column(unknown.clone()));
            }
            colgroups.push(ColumnGroup {
                name: name.clone(),
                uri: format!("{COLGROUP_URI_PREFIX}{table_name}:{name}"),
                columns: members.clone(),
                config: ConfigObject::new().with("columns", ConfigValue::group(members)),
            });
        }

        let mut create_config = ConfigObject::new()
            .with("key_format", key.column_format.to_string())
            .with(
                "value_format",
                join_formats(values.iter().map(|spec| &spec.column_format)),
            )
            .with(
                "columns",
                ConfigValue::group(
                    std::iter::once(key.name.as_str()).chain(values.iter().map(|s| s.name.as_str())),
                ),
            );
        if !colgroups.is_empty() {
            create_config.push(
                "colgroups",
                ConfigValue::group(colgroups.iter().map(|g| g.name.as_str())),
            );
        }
        options.apply(&mut create_config);

        Ok(Self {
            table_name: table_name.to_string(),
            key,
            values,
            remaining,
            lookup,
            colgroups,
            create_config,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns `table:<name>`.
    #[must_use]
    pub fn table_uri(&self) -> String {
        format!("{TABLE_URI_PREFIX}{}", self.table_name)
    }

    /// Returns the key column spec.
    #[must_use]
    pub fn key_spec(&self) -> &ColumnSpec {
        &self.key
    }

    /// Returns the value column specs in tuple order, the remaining column
    /// last when present.
    #[must_use]
    pub fn value_specs(&self) -> &[ColumnSpec] {
        &self.values
    }

    /// Returns the specs of the fields packed into the remaining column.
    /// Their `column_index` is the remaining column's position.
    #[must_use]
    pub fn remaining_specs(&self) -> &[ColumnSpec] {
        &self.remaining
    }

    /// Returns true if the schema has a remaining column.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.values.last().is_some_and(ColumnSpec::is_remaining)
    }

    /// Looks up a column by name, `_id` included.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&ColumnSpec> {
        if name == ID_NAME {
            return Some(&self.key);
        }
        self.lookup.get(name).and_then(|&i| self.values.get(i))
    }

    /// Looks up a packed remaining field by name.
    #[must_use]
    pub fn remaining_spec(&self, name: &str) -> Option<&ColumnSpec> {
        self.remaining.iter().find(|spec| spec.name == name)
    }

    /// Returns the key format string.
    #[must_use]
    pub fn key_format(&self) -> String {
        self.key.column_format.to_string()
    }

    /// Returns the value format string.
    #[must_use]
    pub fn value_format(&self) -> String {
        join_formats(self.values.iter().map(|spec| &spec.column_format))
    }

    /// Returns the column groups.
    #[must_use]
    pub fn colgroups(&self) -> &[ColumnGroup] {
        &self.colgroups
    }

    /// Returns the table create config.
    #[must_use]
    pub fn create_config(&self) -> &ConfigObject {
        &self.create_config
    }

    /// Builds a projection request over the named columns, or over every
    /// value column when `columns` is `None` or empty.
    pub fn projection(&self, columns: Option<&[&str]>) -> MapResult<Projection> {
        match columns {
            Some(names) if !names.is_empty() => {
                let specs = names
                    .iter()
                    .map(|name| {
                        self.spec(name)
                            .cloned()
                            .ok_or_else(|| MapError::unknown_column(*name))
                    })
                    .collect::<MapResult<Vec<_>>>()?;
                Ok(Projection::new(specs, true))
            }
            _ => Ok(Projection::new(self.values.clone(), false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_common::config::parse_config;
    use docmap_common::ErrorCode;

    fn sample() -> SchemaDefinition {
        SchemaDefinition::new()
            .field("_id", SchemaEntry::char_array(17).unwrap())
            .field("stringThing", SchemaEntry::string(None).unwrap())
            .field("intThing", SchemaEntry::int())
            .field("doubleThing", SchemaEntry::double())
            .field("booleanThing", SchemaEntry::boolean())
            .remaining(SubSchema::new().field("a", SchemaEntry::string(None).unwrap()))
    }

    #[test]
    fn test_compile_formats_and_indices() {
        let compiled = CompiledSchema::compile("t", &sample().into()).unwrap();
        assert_eq!(compiled.key_format(), "17s");
        assert_eq!(compiled.value_format(), "Siutu");
        assert!(compiled.key_spec().is_key());

        let indices: Vec<i32> = compiled.value_specs().iter().map(|s| s.column_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(compiled.has_remaining());
        assert_eq!(compiled.remaining_specs()[0].name, "a");
        assert_eq!(compiled.remaining_specs()[0].column_index, 4);
        assert!(compiled.spec("a").is_none());
        assert_eq!(compiled.spec("_id").unwrap().column_format.to_string(), "17s");
        assert_eq!(
            compiled.create_config().to_string(),
            "key_format=17s,value_format=Siutu,\
             columns=(_id,stringThing,intThing,doubleThing,booleanThing,_remaining)"
        );
    }

    #[test]
    fn test_column_order_reads_back_from_config() {
        let compiled = CompiledSchema::compile("t", &sample().into()).unwrap();
        let parsed = parse_config(&compiled.create_config().to_string()).unwrap();
        let columns = parsed.get("columns").unwrap().group_items().unwrap();
        assert_eq!(
            columns,
            vec!["_id", "stringThing", "intThing", "doubleThing", "booleanThing", "_remaining"]
        );
    }

    #[test]
    fn test_schema_order_errors() {
        let err = CompiledSchema::compile("t", &SchemaDefinition::new().into()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchemaOrder);

        let schema = SchemaDefinition::new()
            .field("name", SchemaEntry::string(None).unwrap())
            .field("_id", SchemaEntry::int());
        let err = CompiledSchema::compile("t", &schema.into()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchemaOrder);
    }

    #[test]
    fn test_duplicate_columns() {
        let schema = SchemaDefinition::new()
            .field("_id", SchemaEntry::int())
            .field("x", SchemaEntry::int())
            .field("x", SchemaEntry::long());
        let err = CompiledSchema::compile("t", &schema.into()).unwrap_err();
        assert!(matches!(err, MapError::DuplicateColumn { name } if name == "x"));

        let schema = SchemaDefinition::new()
            .field("_id", SchemaEntry::int())
            .field("a", SchemaEntry::int())
            .remaining(SubSchema::new().field("a", SchemaEntry::int()));
        let err = CompiledSchema::compile("t", &schema.into()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateColumn);

        let schema = SchemaDefinition::new()
            .field("_id", SchemaEntry::int())
            .field("_remaining", SchemaEntry::binary(None).unwrap())
            .remaining(SubSchema::new());
        let err = CompiledSchema::compile("t", &schema.into()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateColumn);
    }

    #[test]
    fn test_raw_defaults() {
        let compiled =
            CompiledSchema::compile("raw", &RawCollectionConfiguration::default().into()).unwrap();
        assert_eq!(compiled.key_format(), "r");
        assert_eq!(compiled.value_format(), "u");
        assert_eq!(compiled.value_specs()[0].name, "value");
        assert_eq!(compiled.value_specs()[0].actual_type, SemanticType::Binary);
        assert_eq!(compiled.key_spec().actual_type, SemanticType::ULong);
        assert_eq!(
            compiled.create_config().to_string(),
            "key_format=r,value_format=u,columns=(_id,value)"
        );
    }

    #[test]
    fn test_raw_format_count_mismatch() {
        let raw = RawCollectionConfiguration {
            columns: Some(vec!["_id".into(), "a".into(), "b".into()]),
            value_format: Some(vec![ColumnFormat::new(FormatCode::String)]),
            ..Default::default()
        };
        let err = CompiledSchema::compile("raw", &raw.into()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_colgroups_and_options() {
        let mut options = TableOptions {
            prefix_compression: Some(false),
            ..Default::default()
        };
        options
            .colgroups
            .insert("main".to_string(), vec!["stringThing".to_string(), "_remaining".to_string()]);
        let compiled = CompiledSchema::compile("t", &sample().options(options).into()).unwrap();

        let group = &compiled.colgroups()[0];
        assert_eq!(group.uri, "colgroup:t:main");
        assert_eq!(group.config.to_string(), "columns=(stringThing,_remaining)");
        let text = compiled.create_config().to_string();
        assert!(text.ends_with(",colgroups=(main),prefix_compression=false"));

        let mut options = TableOptions::default();
        options
            .colgroups
            .insert("bad".to_string(), vec!["missing".to_string()]);
        let err = CompiledSchema::compile("t", &sample().options(options).into()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownColumn);
    }
}
