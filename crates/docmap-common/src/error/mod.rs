//! Error handling for docmap.
//!
//! This module provides a unified error type and result alias used
//! across all docmap components.

mod mapping;

pub use mapping::{ErrorCode, MapError};

/// Result type alias for docmap operations.
pub type MapResult<T> = std::result::Result<T, MapError>;
