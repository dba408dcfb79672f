//! Index metadata builder.
//!
//! Simple indexes compile to a bare `columns=(...)` clause and rely on the
//! engine's native key extraction. Any extended column switches the index
//! to the generic extractor and compound collator, driven by an
//! `app_metadata` block that tells them which table columns to decode, how
//! to tokenize them and how to order each key segment.

use std::collections::HashSet;
use std::hash::Hasher;

use siphasher::sip::SipHasher13;
use tracing::debug;

use docmap_common::config::{ConfigObject, ConfigValue, IndexIdScope, MapperConfig};
use docmap_common::constants::{INDEX_ID_HASH_KEYS, INDEX_URI_PREFIX};
use docmap_common::types::{join_formats, ColumnFormat, FormatCode};
use docmap_common::{MapError, MapResult};

use super::descriptor::{IndexColumn, IndexDescriptor, Tokenizer};
use crate::compiler::{ColumnSpec, CompiledSchema};

/// Per-segment block of the extractor metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumnMetadata {
    /// 1-based positions of the source columns in the table's value tuple.
    pub positions: Vec<u32>,
    /// +1 or -1.
    pub direction: i32,
    /// Format the segment is decoded and packed with.
    pub format: ColumnFormat,
    /// Tokenizer, if any.
    pub extractor: Option<Tokenizer>,
}

impl IndexColumnMetadata {
    fn to_config(&self) -> ConfigObject {
        let positions = self
            .positions
            .iter()
            .map(|p| ConfigValue::scalar(p))
            .collect();
        let mut config = ConfigObject::new()
            .with("columns", ConfigValue::List(positions))
            .with("direction", i64::from(self.direction))
            .with("format", self.format.to_string());
        match self.extractor {
            Some(Tokenizer::Ngrams(width)) => {
                config.push("extractor", Tokenizer::Ngrams(width).name());
                config.push("ngrams", i64::from(width));
            }
            Some(Tokenizer::Words) => config.push("extractor", Tokenizer::Words.name()),
            None => {}
        }
        config
    }
}

/// The `app_metadata` block read by the generic extractor and collator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    /// Value format of the indexed table.
    pub table_value_format: String,
    /// One code per table value column: participating columns keep their
    /// read format, the rest are `x`.
    pub key_extract_format: String,
    /// Concatenated segment formats.
    pub key_format: String,
    /// Deterministic identifier of the extraction shape.
    pub index_id: String,
    /// Common direction, or 0 when segments disagree.
    pub direction: i32,
    /// Whether the collator treats keys as unique.
    pub unique: bool,
    /// Segment blocks in key order.
    pub columns: Vec<IndexColumnMetadata>,
}

impl IndexMetadata {
    /// Serializes the block.
    #[must_use]
    pub fn to_config(&self) -> ConfigObject {
        let mut config = ConfigObject::new()
            .with("table_value_format", self.table_value_format.clone())
            .with("key_extract_format", self.key_extract_format.clone())
            .with("key_format", self.key_format.clone())
            .with("index_id", self.index_id.clone())
            .with("direction", i64::from(self.direction));
        if self.unique {
            config.push("unique", true);
        }
        config.push("columns", self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            config.push(format!("column{i}"), column.to_config());
        }
        config
    }
}

/// A compiled index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Index name.
    pub name: String,
    /// `index:<table>:<name>`.
    pub uri: String,
    /// Key format of the index.
    pub key_format: String,
    /// Number of key segments a query against this index must supply.
    pub key_arity: usize,
    /// Create config.
    pub config: ConfigObject,
    /// Extractor metadata, for extended indexes.
    pub metadata: Option<IndexMetadata>,
}

impl IndexConfig {
    /// Returns true if the index uses the generic extractor.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.metadata.is_some()
    }
}

/// Compiles index descriptors against one table's schema.
///
/// # Example
///
/// ```rust
/// use docmap_common::config::MapperConfig;
/// use docmap_schema::index::{IndexBuilder, IndexColumn, IndexDescriptor};
/// use docmap_schema::{CompiledSchema, SchemaDefinition, SchemaEntry};
///
/// let schema = SchemaDefinition::new()
///     .field("_id", SchemaEntry::string(None).unwrap())
///     .field("name", SchemaEntry::string(None).unwrap());
/// let compiled = CompiledSchema::compile("people", &schema.into()).unwrap();
/// let settings = MapperConfig::default();
/// let builder = IndexBuilder::new(&compiled, &settings);
///
/// let simple = builder.build(&IndexDescriptor::new("by_name").column("name")).unwrap();
/// assert_eq!(simple.config.to_string(), "columns=(name)");
///
/// let grams = builder
///     .build(&IndexDescriptor::new("grams").column(IndexColumn::ngrams("name", 3)))
///     .unwrap();
/// assert!(grams.config.to_string().contains("extractor=multikey"));
/// ```
pub struct IndexBuilder<'a> {
    schema: &'a CompiledSchema,
    settings: &'a MapperConfig,
}

impl<'a> IndexBuilder<'a> {
    /// Creates a builder.
    pub fn new(schema: &'a CompiledSchema, settings: &'a MapperConfig) -> Self {
        Self { schema, settings }
    }

    /// Compiles one index descriptor.
    pub fn build(&self, descriptor: &IndexDescriptor) -> MapResult<IndexConfig> {
        if descriptor.name.is_empty() {
            return Err(MapError::invalid_index("", "index name must not be empty"));
        }
        if descriptor.columns.is_empty() {
            return Err(MapError::invalid_index(
                &descriptor.name,
                "index declares no columns",
            ));
        }
        // Unknown names fail before any shape checks.
        for column in &descriptor.columns {
            for name in column.source_columns() {
                self.lookup(name)?;
            }
        }

        let index = if descriptor.is_extended() {
            self.build_extended(descriptor)?
        } else {
            self.build_simple(descriptor)?
        };
        debug!(
            table = self.schema.table_name(),
            index = %index.name,
            extended = index.is_extended(),
            config = %index.config,
            "compiled index"
        );
        Ok(index)
    }

    fn lookup(&self, name: &str) -> MapResult<&'a ColumnSpec> {
        self.schema
            .spec(name)
            .ok_or_else(|| MapError::unknown_column(name))
    }

    fn uri(&self, name: &str) -> String {
        format!("{INDEX_URI_PREFIX}{}:{name}", self.schema.table_name())
    }

    fn build_simple(&self, descriptor: &IndexDescriptor) -> MapResult<IndexConfig> {
        let names: Vec<&str> = descriptor
            .columns
            .iter()
            .flat_map(IndexColumn::source_columns)
            .collect();
        let specs = names
            .iter()
            .map(|name| self.lookup(name))
            .collect::<MapResult<Vec<_>>>()?;

        let options = &descriptor.options;
        let mut config = ConfigObject::new().with("columns", ConfigValue::group(&names));
        if let Some(extractor) = &options.extractor {
            config.push("extractor", extractor.clone());
        }
        if let Some(collator) = &options.collator {
            config.push("collator", collator.clone());
        }
        if options.immutable {
            config.push("immutable", true);
        }
        if options.unique {
            config.push("unique", true);
        }
        for (key, value) in &options.extra {
            config.push(key.clone(), value.clone());
        }

        Ok(IndexConfig {
            name: descriptor.name.clone(),
            uri: self.uri(&descriptor.name),
            key_format: join_formats(specs.iter().map(|spec| &spec.column_format)),
            key_arity: specs.len(),
            config,
            metadata: None,
        })
    }

    fn build_extended(&self, descriptor: &IndexDescriptor) -> MapResult<IndexConfig> {
        let options = &descriptor.options;
        if options.extractor.is_some() || options.collator.is_some() {
            return Err(MapError::invalid_index(
                &descriptor.name,
                "extended indexes always use the generic extractor and collator",
            ));
        }
        if !options.extra.is_empty() {
            return Err(MapError::invalid_index(
                &descriptor.name,
                "extra options are only accepted on simple indexes",
            ));
        }

        let mut source_names: Vec<&str> = Vec::new();
        let mut seen = HashSet::new();
        let mut segments = Vec::with_capacity(descriptor.columns.len());
        // Physical segment formats, for the engine-facing key_format.
        let mut physical = Vec::with_capacity(descriptor.columns.len());

        for column in &descriptor.columns {
            let (names, direction, extractor) = match column {
                IndexColumn::Simple(name) => (vec![name.as_str()], 1, None),
                IndexColumn::Extended {
                    columns,
                    direction,
                    extractor,
                } => (
                    columns.iter().map(String::as_str).collect(),
                    direction.as_i32(),
                    *extractor,
                ),
            };
            if names.is_empty() {
                return Err(MapError::invalid_index(
                    &descriptor.name,
                    "extended column has no source columns",
                ));
            }

            let specs = names
                .iter()
                .map(|name| self.lookup(name))
                .collect::<MapResult<Vec<_>>>()?;
            if let Some(key) = specs.iter().find(|spec| spec.is_key()) {
                return Err(MapError::invalid_index(
                    &descriptor.name,
                    format!("key column '{}' cannot feed an extended column", key.name),
                ));
            }

            let derived = extractor.is_some() || specs.len() > 1;
            if derived {
                if let Some(spec) = specs.iter().find(|spec| !spec.actual_type.is_text()) {
                    return Err(MapError::invalid_index(
                        &descriptor.name,
                        format!(
                            "column '{}' is {}, tokenized and composite segments need text",
                            spec.name, spec.actual_type
                        ),
                    ));
                }
            }
            if extractor == Some(Tokenizer::Ngrams(0)) {
                return Err(MapError::invalid_index(
                    &descriptor.name,
                    "ngram width must be positive",
                ));
            }

            let (format, physical_format) = if derived {
                let text = ColumnFormat::new(FormatCode::String);
                (text, text)
            } else {
                (specs[0].effective_format(), specs[0].column_format)
            };
            physical.push(physical_format);

            for name in &names {
                if seen.insert(*name) {
                    source_names.push(*name);
                }
            }
            segments.push(IndexColumnMetadata {
                positions: specs.iter().map(|spec| spec.column_index as u32 + 1).collect(),
                direction,
                format,
                extractor,
            });
        }

        let participating: HashSet<i32> = segments
            .iter()
            .flat_map(|segment| segment.positions.iter().map(|p| *p as i32 - 1))
            .collect();
        let key_extract_format: String = self
            .schema
            .value_specs()
            .iter()
            .map(|spec| {
                if participating.contains(&spec.column_index) {
                    spec.effective_format()
                } else {
                    ColumnFormat::skip()
                }
            })
            .map(|format| format.to_string())
            .collect();

        let first_direction = segments[0].direction;
        let direction = if segments.iter().all(|s| s.direction == first_direction) {
            first_direction
        } else {
            0
        };

        let table_value_format = self.schema.value_format();
        let metadata = IndexMetadata {
            index_id: self.index_id(&table_value_format, &segments),
            table_value_format,
            key_extract_format,
            key_format: join_formats(segments.iter().map(|s| &s.format)),
            direction,
            unique: options.unique,
            columns: segments,
        };

        let key_format = join_formats(&physical);
        let mut config = ConfigObject::new()
            .with("columns", ConfigValue::group(&source_names))
            .with("key_format", key_format.clone())
            .with("extractor", self.settings.extractor_name.clone())
            .with("collator", self.settings.collator_name.clone());
        if options.immutable {
            config.push("immutable", true);
        }
        config.push("app_metadata", metadata.to_config());

        Ok(IndexConfig {
            name: descriptor.name.clone(),
            uri: self.uri(&descriptor.name),
            key_format,
            key_arity: metadata.columns.len(),
            config,
            metadata: Some(metadata),
        })
    }

    /// Hashes the extraction shape. Identical shapes yield identical ids so
    /// the engine can share extractor instances between them.
    fn index_id(&self, table_value_format: &str, segments: &[IndexColumnMetadata]) -> String {
        let (k0, k1) = INDEX_ID_HASH_KEYS;
        let mut hasher = SipHasher13::new_with_keys(k0, k1);
        if self.settings.index_id_scope == IndexIdScope::Table {
            hasher.write(self.schema.table_name().as_bytes());
            hasher.write_u8(0xff);
        }
        hasher.write(table_value_format.as_bytes());
        hasher.write_u8(0xff);
        for segment in segments {
            hasher.write_usize(segment.positions.len());
            for position in &segment.positions {
                hasher.write_u32(*position);
            }
            hasher.write_i32(segment.direction);
            hasher.write(segment.format.to_string().as_bytes());
            match segment.extractor {
                Some(Tokenizer::Ngrams(width)) => {
                    hasher.write_u8(1);
                    hasher.write_u32(width);
                }
                Some(Tokenizer::Words) => hasher.write_u8(2),
                None => hasher.write_u8(0),
            }
        }
        format!("{:016x}", hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::descriptor::{Direction, IndexOptions};
    use crate::{SchemaDefinition, SchemaEntry, SubSchema};
    use docmap_common::config::parse_config;
    use docmap_common::types::parse_format_string;
    use docmap_common::ErrorCode;

    fn schema(table: &str) -> CompiledSchema {
        let definition = SchemaDefinition::new()
            .field("_id", SchemaEntry::string(None).unwrap())
            .field("value1", SchemaEntry::string(None).unwrap())
            .field("value2", SchemaEntry::string(None).unwrap())
            .field("count", SchemaEntry::int())
            .field("score", SchemaEntry::double())
            .remaining(SubSchema::new().field("extra", SchemaEntry::string(None).unwrap()));
        CompiledSchema::compile(table, &definition.into()).unwrap()
    }

    fn build(table: &str, descriptor: &IndexDescriptor) -> MapResult<IndexConfig> {
        let compiled = schema(table);
        let settings = MapperConfig::default();
        IndexBuilder::new(&compiled, &settings).build(descriptor)
    }

    #[test]
    fn test_simple_index() {
        let index = build(
            "t",
            &IndexDescriptor::new("by_count")
                .column("count")
                .column("value1")
                .options(IndexOptions {
                    collator: Some("reverse".to_string()),
                    unique: true,
                    ..Default::default()
                }),
        )
        .unwrap();
        assert_eq!(index.uri, "index:t:by_count");
        assert_eq!(index.key_format, "iS");
        assert_eq!(index.key_arity, 2);
        assert!(index.metadata.is_none());
        let text = index.config.to_string();
        assert_eq!(text, "columns=(count,value1),collator=reverse,unique");
        assert!(!text.contains("extractor"));
        assert!(!text.contains("app_metadata"));
    }

    #[test]
    fn test_extended_index_metadata() {
        let descriptor = IndexDescriptor::new("test")
            .column(IndexColumn::ngrams("value1", 3))
            .column("value2");
        let index = build("t", &descriptor).unwrap();
        let metadata = index.metadata.as_ref().unwrap();

        assert_eq!(index.key_format, "SS");
        assert_eq!(index.key_arity, 2);
        assert_eq!(metadata.table_value_format, "SSiuu");
        assert_eq!(metadata.key_extract_format, "SSxxx");
        assert_eq!(metadata.direction, 1);
        assert_eq!(metadata.columns[0].positions, vec![1]);
        assert_eq!(metadata.columns[1].positions, vec![2]);
        assert_eq!(metadata.index_id.len(), 16);

        let text = index.config.to_string();
        let expected = format!(
            "columns=(value1,value2),key_format=SS,extractor=multikey,collator=compound,\
             app_metadata={{table_value_format=SSiuu,key_extract_format=SSxxx,key_format=SS,\
             index_id={},direction=1,columns=2,\
             column0={{columns=[1],direction=1,format=S,extractor=ngrams,ngrams=3}},\
             column1={{columns=[2],direction=1,format=S}}}}",
            metadata.index_id
        );
        assert_eq!(text, expected);
        assert!(parse_config(&text).is_ok());
    }

    #[test]
    fn test_key_extract_format_marks_participants() {
        let descriptor = IndexDescriptor::new("mixed")
            .column(IndexColumn::descending("score"))
            .column("count");
        let index = build("t", &descriptor).unwrap();
        let metadata = index.metadata.unwrap();
        assert_eq!(metadata.key_extract_format, "xxidx");
        assert_eq!(
            parse_format_string(&metadata.key_extract_format).unwrap().len(),
            schema("t").value_specs().len()
        );
        assert_eq!(index.key_format, "ui");
        assert_eq!(metadata.key_format, "di");
    }

    #[test]
    fn test_key_extract_format_with_prefixed_codes() {
        let definition = SchemaDefinition::new()
            .field("_id", SchemaEntry::string(None).unwrap())
            .field("code", SchemaEntry::char_array(17).unwrap())
            .field("label", SchemaEntry::string(Some(8)).unwrap())
            .field("count", SchemaEntry::int());
        let compiled = CompiledSchema::compile("codes", &definition.into()).unwrap();
        let settings = MapperConfig::default();
        let descriptor = IndexDescriptor::new("by_code")
            .column(IndexColumn::descending("code"))
            .column("count");
        let metadata = IndexBuilder::new(&compiled, &settings)
            .build(&descriptor)
            .unwrap()
            .metadata
            .unwrap();

        assert_eq!(metadata.key_extract_format, "17sxi");
        let codes = parse_format_string(&metadata.key_extract_format).unwrap();
        assert_eq!(codes.len(), compiled.value_specs().len());
        assert_eq!(codes[0].to_string(), "17s");
        assert_eq!(codes[1], ColumnFormat::skip());
        assert_eq!(metadata.key_format, "17si");
    }

    #[test]
    fn test_mixed_directions() {
        let descriptor = IndexDescriptor::new("mixed")
            .column(IndexColumn::descending("value1"))
            .column("value2");
        let metadata = build("t", &descriptor).unwrap().metadata.unwrap();
        assert_eq!(metadata.direction, 0);
        assert_eq!(metadata.columns[0].direction, -1);
        assert_eq!(metadata.columns[1].direction, 1);

        let descriptor = IndexDescriptor::new("desc")
            .column(IndexColumn::descending("value1"))
            .column(IndexColumn::descending("value2"));
        let metadata = build("t", &descriptor).unwrap().metadata.unwrap();
        assert_eq!(metadata.direction, -1);
    }

    #[test]
    fn test_composite_segment() {
        let descriptor = IndexDescriptor::new("both").column(IndexColumn::Extended {
            columns: vec!["value1".into(), "value2".into()],
            direction: Direction::Ascending,
            extractor: Some(Tokenizer::Words),
        });
        let index = build("t", &descriptor).unwrap();
        let metadata = index.metadata.unwrap();
        assert_eq!(index.key_arity, 1);
        assert_eq!(index.key_format, "S");
        assert_eq!(metadata.columns[0].positions, vec![1, 2]);
        assert_eq!(metadata.key_extract_format, "SSxxx");
    }

    #[test]
    fn test_index_id_is_deterministic() {
        let descriptor = IndexDescriptor::new("a").column(IndexColumn::ngrams("value1", 3));
        let renamed = IndexDescriptor::new("b").column(IndexColumn::ngrams("value1", 3));
        let wider = IndexDescriptor::new("a").column(IndexColumn::ngrams("value1", 4));

        let id = |table: &str, d: &IndexDescriptor| build(table, d).unwrap().metadata.unwrap().index_id;
        assert_eq!(id("t", &descriptor), id("t", &renamed));
        assert_eq!(id("t", &descriptor), id("other", &descriptor));
        assert_ne!(id("t", &descriptor), id("t", &wider));
    }

    #[test]
    fn test_table_scoped_index_id() {
        let descriptor = IndexDescriptor::new("a").column(IndexColumn::words("value1"));
        let settings = MapperConfig::builder()
            .index_id_scope(IndexIdScope::Table)
            .build()
            .unwrap();
        let first = schema("t1");
        let second = schema("t2");
        let a = IndexBuilder::new(&first, &settings).build(&descriptor).unwrap();
        let b = IndexBuilder::new(&second, &settings).build(&descriptor).unwrap();
        assert_ne!(a.metadata.unwrap().index_id, b.metadata.unwrap().index_id);
    }

    #[test]
    fn test_unknown_column() {
        let err = build("t", &IndexDescriptor::new("x").column("missing")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownColumn);

        let err = build("t", &IndexDescriptor::new("x").column(IndexColumn::words("extra")))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownColumn);
    }

    #[test]
    fn test_invalid_extended_columns() {
        let cases = [
            IndexDescriptor::new("x").column(IndexColumn::words("count")),
            IndexDescriptor::new("x").column(IndexColumn::ngrams("value1", 0)),
            IndexDescriptor::new("x").column(IndexColumn::descending("_id")),
            IndexDescriptor::new("x"),
            IndexDescriptor::new("x")
                .column(IndexColumn::words("value1"))
                .options(IndexOptions {
                    extractor: Some("words".to_string()),
                    ..Default::default()
                }),
        ];
        for descriptor in &cases {
            let err = build("t", descriptor).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidIndex, "{descriptor:?}");
        }
    }
}
