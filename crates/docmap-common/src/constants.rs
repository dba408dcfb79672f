//! System-wide constants for docmap.
//!
//! Reserved column names and defaults shared by the schema, query and
//! collection layers.

// =============================================================================
// Reserved Column Names
// =============================================================================

/// Name of the key column. Every schema declares it first.
pub const ID_NAME: &str = "_id";

/// Name of the synthetic column that packs all undeclared fields.
pub const REMAINING_NAME: &str = "_remaining";

/// Value column name used by raw configurations that do not name columns.
pub const DEFAULT_COLUMN_NAME: &str = "value";

/// Field used to wrap a bare scalar so the nested codec can pack it.
///
/// The codec only serializes documents, so a `bson` column holding a
/// scalar stores `{ "_": scalar }`.
pub const WRAPPED_SCALAR_FIELD: &str = "_";

/// Column index sentinel marking the key column in a `ColumnSpec`.
pub const KEY_COLUMN_INDEX: i32 = -1;

// =============================================================================
// Engine URI Prefixes
// =============================================================================

/// URI prefix for tables.
pub const TABLE_URI_PREFIX: &str = "table:";

/// URI prefix for indexes.
pub const INDEX_URI_PREFIX: &str = "index:";

/// URI prefix for column groups.
pub const COLGROUP_URI_PREFIX: &str = "colgroup:";

// =============================================================================
// Defaults
// =============================================================================

/// Default number of rows fetched per cursor batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default name of the engine-side metadata-driven token extractor.
pub const DEFAULT_EXTRACTOR_NAME: &str = "multikey";

/// Default name of the engine-side compound directional collator.
pub const DEFAULT_COLLATOR_NAME: &str = "compound";

/// Maximum width of a bitfield column.
pub const MAX_BITFIELD_WIDTH: u32 = 8;

/// Keys for the deterministic index identifier hash.
///
/// Changing these changes every emitted `index_id`.
pub const INDEX_ID_HASH_KEYS: (u64, u64) = (0x646f_636d_6170_6964, 0x0000_0000_0000_0001);
