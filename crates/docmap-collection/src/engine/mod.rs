//! The storage engine seam.
//!
//! The mapping layer talks to the column engine only through these traits:
//! create calls that take config text, a find call that takes compiled
//! conditions and a read request, and positional tuple writes. Everything
//! behind them (cursors, B-trees, extractors, collators, transactions) is
//! the engine's business.
//!
//! [`MemoryEngine`] is an in-process implementation used by tests.

mod memory;

pub use memory::{MemoryCursor, MemoryEngine};

use docmap_common::{MapResult, Value};
use docmap_query::ConditionSpec;

use crate::projector::UpdateValue;

/// A stored row: key plus positional value tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Key value.
    pub key: Value,
    /// Value tuple, one entry per requested column.
    pub values: Vec<Value>,
}

impl Row {
    /// Creates a row.
    pub fn new(key: impl Into<Value>, values: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }
}

/// What a find call reads and how the engine should unpack it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadRequest {
    /// One format per returned column, read formats applied.
    pub value_format: String,
    /// `(a,b)` column clause; `None` reads every value column.
    pub columns: Option<String>,
}

/// A storage engine the collection layer drives.
pub trait TableEngine: Send + Sync {
    /// Cursor type returned by [`TableEngine::find`].
    type Cursor: EngineCursor;

    /// Creates a table. Creating an existing table with the same config
    /// succeeds.
    fn create_table(&self, uri: &str, config: &str) -> MapResult<()>;

    /// Creates a column group of an existing table.
    fn create_colgroup(&self, uri: &str, config: &str) -> MapResult<()>;

    /// Creates an index on an existing table.
    fn create_index(&self, uri: &str, config: &str) -> MapResult<()>;

    /// Opens a cursor over the rows matching `conditions`.
    ///
    /// The conditions form an implicit conjunction; an empty list scans the
    /// whole table in key order.
    fn find(
        &self,
        table_uri: &str,
        conditions: &[ConditionSpec],
        request: &ReadRequest,
    ) -> MapResult<Self::Cursor>;

    /// Inserts rows. Fails without writing anything if a key already exists.
    fn insert_many(&self, table_uri: &str, rows: Vec<Row>) -> MapResult<()>;

    /// Overwrites the non-`Keep` slots of every matching row. Returns the
    /// number of rows touched.
    fn update_many(
        &self,
        table_uri: &str,
        conditions: &[ConditionSpec],
        values: &[UpdateValue],
    ) -> MapResult<u64>;

    /// Removes every matching row. Returns the number removed.
    fn delete_many(&self, table_uri: &str, conditions: &[ConditionSpec]) -> MapResult<u64>;
}

/// A paged engine cursor.
pub trait EngineCursor {
    /// Returns up to `batch_size` rows. A short batch means the cursor is
    /// exhausted.
    fn next_batch(&mut self, batch_size: usize) -> MapResult<Vec<Row>>;

    /// Rewinds the cursor to its first row.
    fn reset(&mut self) -> MapResult<()>;

    /// Releases the cursor. Further calls fail.
    fn close(&mut self) -> MapResult<()>;
}
