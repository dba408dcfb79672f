//! Column format codes.
//!
//! The engine describes the physical byte layout of every tuple field with a
//! one-letter code, optionally prefixed by a decimal length (`17s`, `4t`).
//! A tuple format is the concatenation of its column codes (`SiuuQ`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::MAX_BITFIELD_WIDTH;
use crate::error::{MapError, MapResult};

/// A base format letter.
///
/// `Boolean`, `SortableBigInt` and `SortableDouble` never describe stored
/// bytes: they are read formats that tell the engine how to decode a column
/// stored under a generic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatCode {
    /// `x`: pad byte, used as the skip code in extraction formats.
    Padding,
    /// `b`: signed 8-bit integer.
    Byte,
    /// `B`: unsigned 8-bit integer.
    UByte,
    /// `h`: signed 16-bit integer.
    Half,
    /// `H`: unsigned 16-bit integer.
    UHalf,
    /// `i`: signed 32-bit integer.
    Int,
    /// `I`: unsigned 32-bit integer.
    UInt,
    /// `l`: signed 32-bit integer (long alias).
    Int2,
    /// `L`: unsigned 32-bit integer (long alias).
    UInt2,
    /// `q`: signed 64-bit integer.
    Long,
    /// `Q`: unsigned 64-bit integer.
    ULong,
    /// `r`: record number.
    RecordId,
    /// `s`: fixed-length character array.
    CharArray,
    /// `S`: NUL-terminated string.
    String,
    /// `t`: bitfield.
    Bitfield,
    /// `u`: raw byte item.
    Item,
    /// `U`: raw byte item with explicit length.
    UItem,
    /// `T`: boolean decoded from a bitfield.
    Boolean,
    /// `z`: arbitrary-precision integer decoded from sortable bytes.
    SortableBigInt,
    /// `d`: double decoded from sortable bytes.
    SortableDouble,
}

impl FormatCode {
    /// Every code, physical ones first.
    pub const ALL: [FormatCode; 20] = [
        Self::Padding,
        Self::Byte,
        Self::UByte,
        Self::Half,
        Self::UHalf,
        Self::Int,
        Self::UInt,
        Self::Int2,
        Self::UInt2,
        Self::Long,
        Self::ULong,
        Self::RecordId,
        Self::CharArray,
        Self::String,
        Self::Bitfield,
        Self::Item,
        Self::UItem,
        Self::Boolean,
        Self::SortableBigInt,
        Self::SortableDouble,
    ];

    /// Returns the format letter.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Padding => 'x',
            Self::Byte => 'b',
            Self::UByte => 'B',
            Self::Half => 'h',
            Self::UHalf => 'H',
            Self::Int => 'i',
            Self::UInt => 'I',
            Self::Int2 => 'l',
            Self::UInt2 => 'L',
            Self::Long => 'q',
            Self::ULong => 'Q',
            Self::RecordId => 'r',
            Self::CharArray => 's',
            Self::String => 'S',
            Self::Bitfield => 't',
            Self::Item => 'u',
            Self::UItem => 'U',
            Self::Boolean => 'T',
            Self::SortableBigInt => 'z',
            Self::SortableDouble => 'd',
        }
    }

    /// Parses a format letter.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_char() == c)
    }

    /// Returns true if the letter accepts a decimal length prefix.
    #[must_use]
    pub const fn allows_length(self) -> bool {
        matches!(
            self,
            Self::CharArray | Self::String | Self::Bitfield | Self::Item
        )
    }

    /// Returns true for decode-only codes that never describe stored bytes.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::Boolean | Self::SortableBigInt | Self::SortableDouble
        )
    }

    /// Returns true for codes whose values travel as byte items.
    #[must_use]
    pub const fn is_item(self) -> bool {
        matches!(
            self,
            Self::Item | Self::UItem | Self::SortableBigInt | Self::SortableDouble
        )
    }

    /// Returns true for signed integer codes.
    #[must_use]
    pub const fn is_signed_integer(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Half | Self::Int | Self::Int2 | Self::Long
        )
    }

    /// Returns true for unsigned integer codes.
    #[must_use]
    pub const fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            Self::UByte
                | Self::UHalf
                | Self::UInt
                | Self::UInt2
                | Self::ULong
                | Self::RecordId
                | Self::Bitfield
        )
    }
}

impl fmt::Display for FormatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A single column format: optional length prefix plus a base letter.
///
/// # Example
///
/// ```rust
/// use docmap_common::types::{ColumnFormat, FormatCode};
///
/// let format: ColumnFormat = "17s".parse().unwrap();
/// assert_eq!(format.code(), FormatCode::CharArray);
/// assert_eq!(format.length(), Some(17));
/// assert!("4i".parse::<ColumnFormat>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnFormat {
    length: Option<u32>,
    code: FormatCode,
}

impl ColumnFormat {
    /// Creates an unprefixed format.
    #[inline]
    #[must_use]
    pub const fn new(code: FormatCode) -> Self {
        Self { length: None, code }
    }

    /// Creates a length-prefixed format.
    ///
    /// Fails with `InvalidFormat` when the letter does not accept a prefix,
    /// the length is zero, or a bitfield is wider than 8 bits.
    pub fn with_length(length: u32, code: FormatCode) -> MapResult<Self> {
        let text = format!("{}{}", length, code.as_char());
        if !code.allows_length() {
            return Err(MapError::invalid_format(
                text,
                format!("'{}' does not accept a length prefix", code.as_char()),
            ));
        }
        if length == 0 {
            return Err(MapError::invalid_format(text, "length must be positive"));
        }
        if code == FormatCode::Bitfield && length > MAX_BITFIELD_WIDTH {
            return Err(MapError::invalid_format(
                text,
                format!("bitfield width must be 1..={}", MAX_BITFIELD_WIDTH),
            ));
        }
        Ok(Self {
            length: Some(length),
            code,
        })
    }

    /// Creates a format with an optional length prefix.
    pub fn maybe_prefixed(length: Option<u32>, code: FormatCode) -> MapResult<Self> {
        match length {
            Some(length) => Self::with_length(length, code),
            None => Ok(Self::new(code)),
        }
    }

    /// Returns the base letter.
    #[inline]
    #[must_use]
    pub const fn code(&self) -> FormatCode {
        self.code
    }

    /// Returns the length prefix, if any.
    #[inline]
    #[must_use]
    pub const fn length(&self) -> Option<u32> {
        self.length
    }

    /// Returns the skip format used for columns an extractor ignores.
    #[inline]
    #[must_use]
    pub const fn skip() -> Self {
        Self::new(FormatCode::Padding)
    }
}

impl fmt::Display for ColumnFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(length) = self.length {
            write!(f, "{}", length)?;
        }
        write!(f, "{}", self.code.as_char())
    }
}

impl FromStr for ColumnFormat {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut formats = parse_format_string(s)?;
        if formats.len() != 1 {
            return Err(MapError::invalid_format(
                s,
                "expected exactly one column format",
            ));
        }
        Ok(formats.remove(0))
    }
}

impl TryFrom<String> for ColumnFormat {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnFormat> for String {
    fn from(format: ColumnFormat) -> Self {
        format.to_string()
    }
}

impl From<FormatCode> for ColumnFormat {
    fn from(code: FormatCode) -> Self {
        Self::new(code)
    }
}

/// Parses a tuple format string (`"17sSiuu"`) into its column formats.
pub fn parse_format_string(s: &str) -> MapResult<Vec<ColumnFormat>> {
    let mut formats = Vec::new();
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let code = FormatCode::from_char(c)
            .ok_or_else(|| MapError::invalid_format(s, format!("unknown format letter '{}'", c)))?;
        let length = if digits.is_empty() {
            None
        } else {
            let parsed = digits
                .parse::<u32>()
                .map_err(|e| MapError::invalid_format(s, e.to_string()))?;
            digits.clear();
            Some(parsed)
        };
        formats.push(ColumnFormat::maybe_prefixed(length, code)?);
    }

    if !digits.is_empty() {
        return Err(MapError::invalid_format(
            s,
            "length prefix without a format letter",
        ));
    }
    Ok(formats)
}

/// Concatenates column formats into a tuple format string.
pub fn join_formats<'a>(formats: impl IntoIterator<Item = &'a ColumnFormat>) -> String {
    formats.into_iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_letters_are_unique() {
        for code in FormatCode::ALL {
            assert_eq!(FormatCode::from_char(code.as_char()), Some(code));
        }
        assert_eq!(FormatCode::from_char('y'), None);
    }

    #[test]
    fn test_prefix_rules() {
        assert!(ColumnFormat::with_length(17, FormatCode::CharArray).is_ok());
        assert!(ColumnFormat::with_length(4, FormatCode::Bitfield).is_ok());
        assert!(ColumnFormat::with_length(9, FormatCode::Bitfield).is_err());
        assert!(ColumnFormat::with_length(2, FormatCode::Int).is_err());
        assert!(ColumnFormat::with_length(0, FormatCode::String).is_err());
    }

    #[test]
    fn test_parse_format_string() {
        let formats = parse_format_string("17sSiu4tQ").unwrap();
        assert_eq!(formats.len(), 6);
        assert_eq!(formats[0].length(), Some(17));
        assert_eq!(formats[4].code(), FormatCode::Bitfield);
        assert_eq!(join_formats(&formats), "17sSiu4tQ");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_format_string("S?").is_err());
        assert!(parse_format_string("S12").is_err());
        assert!(parse_format_string("3q").is_err());
        assert!("".parse::<ColumnFormat>().is_err());
        assert!("SS".parse::<ColumnFormat>().is_err());
    }

    #[test]
    fn test_read_only_codes() {
        assert!(FormatCode::SortableDouble.is_read_only());
        assert!(FormatCode::Boolean.is_read_only());
        assert!(!FormatCode::Item.is_read_only());
    }
}
