//! # docmap-collection
//!
//! Typed document collections over a column-oriented storage engine.
//!
//! This crate ties the compiled schema to an engine table:
//!
//! - **Projector**: documents to positional value tuples, including the
//!   packed remaining-fields column and partial-update tuples
//! - **Mapper**: value tuples back to documents
//! - **Cursor**: paged reads with reset-on-exit iteration
//! - **Collection**: lazy table binding, index creation, find/insert/
//!   update/delete
//! - **Engine**: the `TableEngine` seam and an in-memory implementation
//!
//! ## Example
//!
//! ```rust
//! use docmap_collection::engine::MemoryEngine;
//! use docmap_collection::{Collection, FindOptions};
//! use docmap_common::{Document, Value};
//! use docmap_schema::{SchemaDefinition, SchemaEntry, SubSchema};
//!
//! let schema = SchemaDefinition::new()
//!     .field("_id", SchemaEntry::char_array(3).unwrap())
//!     .field("name", SchemaEntry::string(None).unwrap())
//!     .remaining(SubSchema::new().field("a", SchemaEntry::string(None).unwrap()));
//! let mut things = Collection::new(MemoryEngine::shared(), "things", schema).unwrap();
//!
//! things
//!     .insert_one(
//!         &Document::new()
//!             .with("_id", "t01")
//!             .with("name", "first")
//!             .with("a", "Hello World"),
//!     )
//!     .unwrap();
//!
//! let docs = things.find(&[], &FindOptions::default()).unwrap().to_vec().unwrap();
//! assert_eq!(docs[0].get("a"), Some(&Value::from("Hello World")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod collection;
pub mod cursor;
pub mod engine;
pub mod mapper;
pub mod projector;

pub use codec::{BincodeCodec, DocumentCodec};
pub use collection::{Collection, FindOptions, IndexRegistry, TableState};
pub use cursor::FindCursor;
pub use engine::{EngineCursor, ReadRequest, Row, TableEngine};
pub use mapper::ResultMapper;
pub use projector::{UpdateModifier, UpdateValue, ValueProjector};
