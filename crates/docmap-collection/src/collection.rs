//! Collections: a compiled schema bound to one engine table.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use docmap_common::config::MapperConfig;
use docmap_common::{Document, MapError, MapResult};
use docmap_query::{compile_conditions, ConditionSpec, KeyResolver, QueryCondition, ResolvedKey};
use docmap_schema::index::{IndexBuilder, IndexConfig, IndexDescriptor};
use docmap_schema::{CompiledSchema, SchemaSource};

use crate::codec::{BincodeCodec, DocumentCodec};
use crate::cursor::FindCursor;
use crate::engine::{ReadRequest, Row, TableEngine};
use crate::projector::{UpdateModifier, ValueProjector};

/// Whether the collection's table exists in the engine yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableState {
    /// Schema compiled, nothing created.
    #[default]
    Unbound,
    /// Table and column groups created.
    Bound,
}

/// Options of a find call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Columns to read; `None` reads every value column.
    pub columns: Option<Vec<String>>,
    /// Page size; `None` uses the configured batch size.
    pub batch_size: Option<usize>,
}

impl FindOptions {
    /// Reads only `columns`.
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            batch_size: None,
        }
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Indexes created on a collection, by name.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: BTreeMap<String, IndexConfig>,
}

impl IndexRegistry {
    /// Returns an index by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexConfig> {
        self.indexes.get(name)
    }

    /// Returns every index in name order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexConfig> {
        self.indexes.values()
    }

    /// Returns the number of indexes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns true if no index has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    fn insert(&mut self, config: IndexConfig) -> &IndexConfig {
        let name = config.name.clone();
        self.indexes.entry(name).or_insert(config)
    }
}

impl KeyResolver for IndexRegistry {
    fn resolve(&self, index: Option<&str>) -> MapResult<ResolvedKey> {
        match index {
            None => Ok(ResolvedKey {
                uri: None,
                arity: 1,
            }),
            Some(name) => self
                .get(name)
                .map(|config| ResolvedKey {
                    uri: Some(config.uri.clone()),
                    arity: config.key_arity,
                })
                .ok_or_else(|| MapError::unknown_column(name)),
        }
    }
}

/// A typed document collection over one engine table.
///
/// The schema is compiled when the collection is built; the table itself is
/// created on first use.
///
/// # Example
///
/// ```rust
/// use docmap_collection::engine::MemoryEngine;
/// use docmap_collection::Collection;
/// use docmap_common::Document;
/// use docmap_schema::{SchemaDefinition, SchemaEntry};
///
/// let schema = SchemaDefinition::new()
///     .field("_id", SchemaEntry::string(None).unwrap())
///     .field("name", SchemaEntry::string(None).unwrap());
/// let mut people = Collection::new(MemoryEngine::shared(), "people", schema).unwrap();
///
/// people
///     .insert_one(&Document::new().with("_id", "p1").with("name", "Ada"))
///     .unwrap();
/// let found = people.find_one(&[]).unwrap().unwrap();
/// assert_eq!(found.get("name").and_then(|v| v.as_str()), Some("Ada"));
/// ```
pub struct Collection<E: TableEngine> {
    engine: Arc<E>,
    schema: CompiledSchema,
    settings: MapperConfig,
    codec: Arc<dyn DocumentCodec>,
    state: TableState,
    indexes: IndexRegistry,
}

impl<E: TableEngine> Collection<E> {
    /// Compiles `source` for table `name` with default settings.
    pub fn new(engine: Arc<E>, name: &str, source: impl Into<SchemaSource>) -> MapResult<Self> {
        Self::with_settings(engine, name, source, MapperConfig::default())
    }

    /// Compiles `source` for table `name`.
    pub fn with_settings(
        engine: Arc<E>,
        name: &str,
        source: impl Into<SchemaSource>,
        settings: MapperConfig,
    ) -> MapResult<Self> {
        settings.validate()?;
        let schema = CompiledSchema::compile(name, &source.into())?;
        Ok(Self {
            engine,
            schema,
            settings,
            codec: Arc::new(BincodeCodec),
            state: TableState::Unbound,
            indexes: IndexRegistry::default(),
        })
    }

    /// Replaces the nested document codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn DocumentCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.table_name()
    }

    /// Returns the compiled schema.
    #[must_use]
    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    /// Returns the mapper settings.
    #[must_use]
    pub fn settings(&self) -> &MapperConfig {
        &self.settings
    }

    /// Returns the table state.
    #[must_use]
    pub fn state(&self) -> TableState {
        self.state
    }

    /// Returns the indexes created so far.
    #[must_use]
    pub fn indexes(&self) -> &IndexRegistry {
        &self.indexes
    }

    /// Creates the table and its column groups. Does nothing once bound.
    pub fn bind(&mut self) -> MapResult<()> {
        if self.state == TableState::Bound {
            return Ok(());
        }
        let uri = self.schema.table_uri();
        self.engine
            .create_table(&uri, &self.schema.create_config().to_string())?;
        for group in self.schema.colgroups() {
            self.engine
                .create_colgroup(&group.uri, &group.config.to_string())?;
        }
        self.state = TableState::Bound;
        info!(
            table = %uri,
            key_format = %self.schema.key_format(),
            value_format = %self.schema.value_format(),
            colgroups = self.schema.colgroups().len(),
            "collection bound"
        );
        Ok(())
    }

    /// Compiles and creates an index.
    pub fn create_index(&mut self, descriptor: &IndexDescriptor) -> MapResult<&IndexConfig> {
        let config = IndexBuilder::new(&self.schema, &self.settings).build(descriptor)?;
        if self.indexes.get(&config.name).is_some() {
            return Err(MapError::invalid_index(
                config.name,
                "an index with this name already exists",
            ));
        }
        self.bind()?;
        self.engine
            .create_index(&config.uri, &config.config.to_string())?;
        info!(
            index = %config.uri,
            key_format = %config.key_format,
            extended = config.is_extended(),
            "index created"
        );
        Ok(self.indexes.insert(config))
    }

    /// Opens a cursor over the documents matching `conditions`.
    ///
    /// The conditions are ANDed; an empty slice reads everything.
    pub fn find(
        &mut self,
        conditions: &[QueryCondition],
        options: &FindOptions,
    ) -> MapResult<FindCursor<E::Cursor>> {
        let specs = self.compile(conditions)?;
        let names: Option<Vec<&str>> = options
            .columns
            .as_ref()
            .map(|columns| columns.iter().map(String::as_str).collect());
        let projection = self.schema.projection(names.as_deref())?;
        let request = ReadRequest {
            value_format: projection.value_format().to_string(),
            columns: projection.columns().map(str::to_string),
        };

        self.bind()?;
        let cursor = self
            .engine
            .find(&self.schema.table_uri(), &specs, &request)?;
        Ok(FindCursor::new(
            cursor,
            projection.specs().to_vec(),
            Arc::clone(&self.codec),
            options.batch_size.unwrap_or(self.settings.batch_size),
        ))
    }

    /// Returns the first matching document.
    pub fn find_one(&mut self, conditions: &[QueryCondition]) -> MapResult<Option<Document>> {
        let mut cursor = self.find(conditions, &FindOptions::default())?;
        let first = cursor.next_batch(1)?.into_iter().next();
        cursor.close()?;
        Ok(first)
    }

    /// Inserts one document.
    pub fn insert_one(&mut self, document: &Document) -> MapResult<()> {
        self.insert_many(std::slice::from_ref(document)).map(|_| ())
    }

    /// Inserts documents. Every document is projected before anything is
    /// written.
    pub fn insert_many(&mut self, documents: &[Document]) -> MapResult<usize> {
        let projector = ValueProjector::new(&self.schema, self.codec.as_ref());
        let rows = documents
            .iter()
            .map(|document| {
                Ok(Row {
                    key: projector.key(document)?,
                    values: projector.project(document)?,
                })
            })
            .collect::<MapResult<Vec<_>>>()?;
        let count = rows.len();

        self.bind()?;
        self.engine.insert_many(&self.schema.table_uri(), rows)?;
        debug!(table = %self.name(), count, "inserted documents");
        Ok(count)
    }

    /// Applies `modifier` to every matching document. Returns the number
    /// of documents updated.
    pub fn update_many(
        &mut self,
        conditions: &[QueryCondition],
        modifier: &UpdateModifier,
    ) -> MapResult<u64> {
        let specs = self.compile(conditions)?;
        let values =
            ValueProjector::new(&self.schema, self.codec.as_ref()).project_update(modifier)?;

        self.bind()?;
        let updated = self
            .engine
            .update_many(&self.schema.table_uri(), &specs, &values)?;
        debug!(table = %self.name(), updated, "updated documents");
        Ok(updated)
    }

    /// Removes every matching document. Returns the number removed.
    pub fn delete_many(&mut self, conditions: &[QueryCondition]) -> MapResult<u64> {
        let specs = self.compile(conditions)?;

        self.bind()?;
        let deleted = self.engine.delete_many(&self.schema.table_uri(), &specs)?;
        debug!(table = %self.name(), deleted, "deleted documents");
        Ok(deleted)
    }

    fn compile(&self, conditions: &[QueryCondition]) -> MapResult<Vec<ConditionSpec>> {
        compile_conditions(conditions, &self.indexes)
    }
}
