//! # docmap-common
//!
//! Common types, errors, and grammars shared by the docmap crates.
//!
//! docmap maps a typed document model onto a column-oriented storage engine
//! that speaks a textual `key=value` configuration grammar and a positional
//! tuple protocol. This crate holds the pieces every layer needs:
//!
//! - **Types**: column format codes, semantic types, the document/value model
//!   and sortable byte encodings
//! - **Config**: the engine configuration grammar (serializer and parser) and
//!   the mapper's own settings
//! - **Errors**: the unified `MapError` taxonomy
//! - **Constants**: reserved column names and defaults
//!
//! ## Example
//!
//! ```rust
//! use docmap_common::config::{ConfigObject, ConfigValue};
//! use docmap_common::types::ColumnFormat;
//!
//! let format: ColumnFormat = "17s".parse().unwrap();
//! let mut config = ConfigObject::new();
//! config.push("key_format", ConfigValue::scalar(format.to_string()));
//! config.push("immutable", ConfigValue::Flag(true));
//! assert_eq!(config.to_string(), "key_format=17s,immutable");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCode, MapError, MapResult};
pub use types::{ColumnFormat, Document, FormatCode, SemanticType, Value};
