//! Mapping error types.
//!
//! Every failure raised by the mapping layer is a local, synchronous
//! validation failure: it surfaces before any engine call is issued and
//! leaves no partial state behind.

use std::fmt;
use thiserror::Error;

/// Stable numeric error codes.
///
/// The high byte is the category (schema, index, query, projection,
/// engine); callers branch on the code rather than on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Operation not supported.
    NotSupported = 0x0002,
    /// Invalid configuration text or settings.
    InvalidConfig = 0x0003,
    /// I/O error while reading or writing settings.
    Io = 0x0004,

    // Schema errors (0x0100 - 0x01FF)
    /// Key column missing or not first.
    SchemaOrder = 0x0100,
    /// Field name declared twice.
    DuplicateColumn = 0x0101,
    /// Reference to an undeclared column or index.
    UnknownColumn = 0x0102,
    /// Malformed column format code.
    InvalidFormat = 0x0103,

    // Index errors (0x0200 - 0x02FF)
    /// Index descriptor cannot be compiled.
    InvalidIndex = 0x0200,

    // Query errors (0x0300 - 0x03FF)
    /// Query value tuple length differs from the target key arity.
    ArityMismatch = 0x0300,
    /// AND/OR group with no children.
    EmptyConditionGroup = 0x0301,

    // Projection errors (0x0400 - 0x04FF)
    /// Decoded tuple length differs from the requested column count.
    ColumnCountMismatch = 0x0400,
    /// Declared field missing from a document.
    MissingField = 0x0401,
    /// Value shape does not match the declared type.
    TypeMismatch = 0x0402,
    /// Update modifier touches a field that cannot be updated in place.
    UnsupportedUpdate = 0x0403,
    /// Nested document codec failure.
    Codec = 0x0404,

    // Engine errors (0x0500 - 0x05FF)
    /// Failure reported by the storage engine.
    Engine = 0x0500,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "Schema",
            0x02 => "Index",
            0x03 => "Query",
            0x04 => "Projection",
            0x05 => "Engine",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for docmap.
///
/// # Example
///
/// ```rust
/// use docmap_common::error::{ErrorCode, MapError, MapResult};
///
/// fn lookup(name: &str) -> MapResult<usize> {
///     Err(MapError::UnknownColumn { name: name.to_string() })
/// }
///
/// let err = lookup("missing").unwrap_err();
/// assert_eq!(err.code(), ErrorCode::UnknownColumn);
/// ```
#[derive(Debug, Error)]
pub enum MapError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// A broken invariant inside the mapping layer.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Operation not supported.
    #[error("operation not supported: {operation}")]
    NotSupported {
        /// The unsupported operation.
        operation: String,
    },

    /// Configuration text could not be parsed or settings are invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// Reading or writing a settings file failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    // ==========================================================================
    // Schema Errors
    // ==========================================================================
    /// The key column is missing or is not the first entry.
    #[error("schema order error: {message}")]
    SchemaOrder {
        /// Error message.
        message: String,
    },

    /// A field name appears more than once.
    #[error("duplicate column '{name}'")]
    DuplicateColumn {
        /// The repeated name.
        name: String,
    },

    /// A column or index name that the schema does not declare.
    #[error("unknown column or index '{name}'")]
    UnknownColumn {
        /// The unknown name.
        name: String,
    },

    /// A malformed column format code.
    #[error("invalid column format '{format}': {reason}")]
    InvalidFormat {
        /// The offending format text.
        format: String,
        /// Why it was rejected.
        reason: String,
    },

    // ==========================================================================
    // Index Errors
    // ==========================================================================
    /// An index descriptor that cannot be compiled.
    #[error("invalid index '{index}': {reason}")]
    InvalidIndex {
        /// The index name.
        index: String,
        /// Why it was rejected.
        reason: String,
    },

    // ==========================================================================
    // Query Errors
    // ==========================================================================
    /// Query value count differs from the number of key columns.
    #[error("arity mismatch on {target}: key has {expected} columns, got {actual} values")]
    ArityMismatch {
        /// The targeted key (table or index).
        target: String,
        /// Number of key columns.
        expected: usize,
        /// Number of supplied values.
        actual: usize,
    },

    /// AND/OR condition group without children.
    #[error("empty {operation} condition group")]
    EmptyConditionGroup {
        /// The boolean operation of the empty group.
        operation: String,
    },

    // ==========================================================================
    // Projection Errors
    // ==========================================================================
    /// Positional tuple length differs from the requested column specs.
    #[error("column count mismatch: expected {expected} values, got {actual}")]
    ColumnCountMismatch {
        /// Number of requested columns.
        expected: usize,
        /// Number of values present.
        actual: usize,
    },

    /// A declared field is absent from the document.
    #[error("document is missing declared field '{name}'")]
    MissingField {
        /// The missing field.
        name: String,
    },

    /// A value does not match the declared type of its column.
    #[error("type mismatch for '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// The column name.
        name: String,
        /// Expected type.
        expected: String,
        /// Actual value kind.
        actual: String,
    },

    /// Update modifier names a field that cannot be rewritten in place.
    #[error("field '{name}' cannot be updated: {reason}")]
    UnsupportedUpdate {
        /// The field name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Nested document codec failure.
    #[error("codec error: {message}")]
    Codec {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Engine Errors
    // ==========================================================================
    /// Failure reported by the storage engine.
    #[error("engine error: {message}")]
    Engine {
        /// Error message.
        message: String,
    },
}

impl MapError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::NotSupported { .. } => ErrorCode::NotSupported,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Io { .. } => ErrorCode::Io,
            Self::SchemaOrder { .. } => ErrorCode::SchemaOrder,
            Self::DuplicateColumn { .. } => ErrorCode::DuplicateColumn,
            Self::UnknownColumn { .. } => ErrorCode::UnknownColumn,
            Self::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            Self::InvalidIndex { .. } => ErrorCode::InvalidIndex,
            Self::ArityMismatch { .. } => ErrorCode::ArityMismatch,
            Self::EmptyConditionGroup { .. } => ErrorCode::EmptyConditionGroup,
            Self::ColumnCountMismatch { .. } => ErrorCode::ColumnCountMismatch,
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::UnsupportedUpdate { .. } => ErrorCode::UnsupportedUpdate,
            Self::Codec { .. } => ErrorCode::Codec,
            Self::Engine { .. } => ErrorCode::Engine,
        }
    }

    /// Returns true if the error was raised by local validation, before
    /// the engine was called.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(
            self,
            Self::Engine { .. } | Self::Io { .. } | Self::Internal { .. }
        )
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an unknown-column error.
    #[must_use]
    pub fn unknown_column(name: impl Into<String>) -> Self {
        Self::UnknownColumn { name: name.into() }
    }

    /// Creates an invalid-format error.
    #[must_use]
    pub fn invalid_format(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            format: format.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-index error.
    #[must_use]
    pub fn invalid_index(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIndex {
            index: index.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-config error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an engine error.
    #[must_use]
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for MapError {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_config(e.to_string())
    }
}

impl From<toml::ser::Error> for MapError {
    fn from(e: toml::ser::Error) -> Self {
        Self::invalid_config(e.to_string())
    }
}
