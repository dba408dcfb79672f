//! Semantic (logical) column types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::format::FormatCode;

/// The logical type a caller sees for a column, independent of how the
/// engine stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    /// UTF-8 text, stored as `S` or a fixed `s` array.
    String,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// Signed 64-bit integer.
    Long,
    /// Unsigned 64-bit integer.
    ULong,
    /// Signed 16-bit integer.
    Half,
    /// Unsigned 16-bit integer.
    UHalf,
    /// Signed 8-bit integer.
    Byte,
    /// Unsigned 8-bit integer.
    UByte,
    /// Bitfield of 1 to 8 bits.
    Bitfield,
    /// Arbitrary bytes.
    Binary,
    /// Boolean stored as a one-bit bitfield.
    Boolean,
    /// Nested value packed by the document codec.
    Bson,
    /// Arbitrary-precision integer stored as sortable bytes.
    BigInt,
    /// Double stored as sortable bytes.
    Double,
}

impl SemanticType {
    /// Returns the physical code the type is stored under by default.
    #[must_use]
    pub const fn default_format(self) -> FormatCode {
        match self {
            Self::String => FormatCode::String,
            Self::Int => FormatCode::Int,
            Self::UInt => FormatCode::UInt,
            Self::Long => FormatCode::Long,
            Self::ULong => FormatCode::ULong,
            Self::Half => FormatCode::Half,
            Self::UHalf => FormatCode::UHalf,
            Self::Byte => FormatCode::Byte,
            Self::UByte => FormatCode::UByte,
            Self::Bitfield | Self::Boolean => FormatCode::Bitfield,
            Self::Binary | Self::Bson | Self::BigInt | Self::Double => FormatCode::Item,
        }
    }

    /// Returns the decode-only read format, for types whose stored bytes
    /// differ from their logical shape.
    #[must_use]
    pub const fn read_format(self) -> Option<FormatCode> {
        match self {
            Self::Boolean => Some(FormatCode::Boolean),
            Self::BigInt => Some(FormatCode::SortableBigInt),
            Self::Double => Some(FormatCode::SortableDouble),
            _ => None,
        }
    }

    /// Returns true for types the index tokenizers can split.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::String)
    }

    /// Returns the lowercase type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Half => "half",
            Self::UHalf => "uhalf",
            Self::Byte => "byte",
            Self::UByte => "ubyte",
            Self::Bitfield => "bitfield",
            Self::Binary => "binary",
            Self::Boolean => "boolean",
            Self::Bson => "bson",
            Self::BigInt => "bigint",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
