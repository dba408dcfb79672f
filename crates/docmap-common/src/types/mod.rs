//! Type definitions for docmap.
//!
//! This module contains the column format grammar, the semantic type set,
//! the document/value model and the sortable byte encodings.

mod document;
mod format;
mod semantic;
pub mod sortable;
mod value;

pub use document::Document;
pub use format::{join_formats, parse_format_string, ColumnFormat, FormatCode};
pub use semantic::SemanticType;
pub use sortable::{decode_bigint, decode_double, encode_bigint, encode_double};
pub use value::Value;
