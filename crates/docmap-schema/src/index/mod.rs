//! Index descriptors and the index metadata builder.

mod builder;
mod descriptor;

pub use builder::{IndexBuilder, IndexColumnMetadata, IndexConfig, IndexMetadata};
pub use descriptor::{Direction, IndexColumn, IndexDescriptor, IndexOptions, Tokenizer};
