//! # docmap-schema
//!
//! Compiles declared document schemas into the engine's column layout.
//!
//! - **Entries**: typed field constructors (`SchemaEntry::int()`,
//!   `SchemaEntry::char_array(17)`, nested `bson` shapes)
//! - **Compiler**: key/value format strings, positional column specs, name
//!   lookup and the table create config
//! - **Projection**: column subsets for reads, with read formats applied
//! - **Index**: simple and extended index descriptors compiled into native
//!   or extractor/collator configs
//!
//! ## Example
//!
//! ```rust
//! use docmap_schema::{CompiledSchema, SchemaDefinition, SchemaEntry, SubSchema};
//!
//! let schema = SchemaDefinition::new()
//!     .field("_id", SchemaEntry::char_array(17).unwrap())
//!     .field("name", SchemaEntry::string(None).unwrap())
//!     .field("age", SchemaEntry::int())
//!     .remaining(SubSchema::new().field("a", SchemaEntry::string(None).unwrap()));
//!
//! let compiled = CompiledSchema::compile("people", &schema.into()).unwrap();
//! assert_eq!(compiled.key_format(), "17s");
//! assert_eq!(compiled.value_format(), "Siu");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod compiler;
pub mod entry;
pub mod index;
pub mod projection;

pub use compiler::{
    ColumnGroup, ColumnSpec, CompiledSchema, RawCollectionConfiguration, SchemaDefinition,
    SchemaSource,
};
pub use entry::{BsonShape, SchemaEntry, SubSchema};
pub use projection::Projection;
