//! Schema entries: the typed field constructors callers declare schemas with.

use serde::{Deserialize, Serialize};

use docmap_common::types::{ColumnFormat, FormatCode, SemanticType};
use docmap_common::MapResult;

/// What a `bson` column holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BsonShape {
    /// A single typed value.
    Scalar(Box<SchemaEntry>),
    /// A nested document with its own typed fields.
    Document(SubSchema),
}

/// An ordered list of named entries describing a nested document.
///
/// Nesting has no depth limit: a sub-schema entry may itself be a `bson`
/// column holding another sub-schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSchema {
    fields: Vec<(String, SchemaEntry)>,
}

impl SubSchema {
    /// Creates an empty sub-schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, entry: SchemaEntry) -> Self {
        self.fields.push((name.into(), entry));
        self
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[(String, SchemaEntry)] {
        &self.fields
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single declared field: physical format, logical type and, for types
/// whose stored bytes differ from their logical shape, a read format.
///
/// # Example
///
/// ```rust
/// use docmap_schema::SchemaEntry;
///
/// let id = SchemaEntry::char_array(17).unwrap();
/// assert_eq!(id.column_format().to_string(), "17s");
///
/// let score = SchemaEntry::double();
/// assert_eq!(score.column_format().to_string(), "u");
/// assert_eq!(score.read_format().unwrap().to_string(), "d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    column_format: ColumnFormat,
    actual_type: SemanticType,
    read_format: Option<FormatCode>,
    bson_shape: Option<BsonShape>,
}

impl SchemaEntry {
    fn plain(actual_type: SemanticType) -> Self {
        Self {
            column_format: ColumnFormat::new(actual_type.default_format()),
            actual_type,
            read_format: actual_type.read_format(),
            bson_shape: None,
        }
    }

    fn prefixed(length: Option<u32>, code: FormatCode, actual_type: SemanticType) -> MapResult<Self> {
        Ok(Self {
            column_format: ColumnFormat::maybe_prefixed(length, code)?,
            ..Self::plain(actual_type)
        })
    }

    /// Text: `S`, or `NS` with a maximum length.
    pub fn string(length: Option<u32>) -> MapResult<Self> {
        Self::prefixed(length, FormatCode::String, SemanticType::String)
    }

    /// Fixed-length text: `Ns`.
    pub fn char_array(length: u32) -> MapResult<Self> {
        Self::prefixed(Some(length), FormatCode::CharArray, SemanticType::String)
    }

    /// Signed 32-bit integer: `i`.
    #[must_use]
    pub fn int() -> Self {
        Self::plain(SemanticType::Int)
    }

    /// Unsigned 32-bit integer: `I`.
    #[must_use]
    pub fn uint() -> Self {
        Self::plain(SemanticType::UInt)
    }

    /// Signed 16-bit integer: `h`.
    #[must_use]
    pub fn half() -> Self {
        Self::plain(SemanticType::Half)
    }

    /// Unsigned 16-bit integer: `H`.
    #[must_use]
    pub fn uhalf() -> Self {
        Self::plain(SemanticType::UHalf)
    }

    /// Signed 8-bit integer: `b`.
    #[must_use]
    pub fn byte() -> Self {
        Self::plain(SemanticType::Byte)
    }

    /// Unsigned 8-bit integer: `B`.
    #[must_use]
    pub fn ubyte() -> Self {
        Self::plain(SemanticType::UByte)
    }

    /// Signed 64-bit integer: `q`.
    #[must_use]
    pub fn long() -> Self {
        Self::plain(SemanticType::Long)
    }

    /// Unsigned 64-bit integer: `Q`.
    #[must_use]
    pub fn ulong() -> Self {
        Self::plain(SemanticType::ULong)
    }

    /// Wide integer stored as sortable bytes: `u`, read as `z`.
    #[must_use]
    pub fn bigint() -> Self {
        Self::plain(SemanticType::BigInt)
    }

    /// Double stored as sortable bytes: `u`, read as `d`.
    #[must_use]
    pub fn double() -> Self {
        Self::plain(SemanticType::Double)
    }

    /// Raw bytes: `u`, or `Nu` with a fixed length.
    pub fn binary(length: Option<u32>) -> MapResult<Self> {
        Self::prefixed(length, FormatCode::Item, SemanticType::Binary)
    }

    /// Bitfield of 1 to 8 bits: `Nt`.
    pub fn bitfield(width: u32) -> MapResult<Self> {
        Self::prefixed(Some(width), FormatCode::Bitfield, SemanticType::Bitfield)
    }

    /// Boolean: `t`, read as `T`.
    #[must_use]
    pub fn boolean() -> Self {
        Self::plain(SemanticType::Boolean)
    }

    /// A nested value packed by the document codec: `u`.
    #[must_use]
    pub fn bson(shape: BsonShape) -> Self {
        Self {
            bson_shape: Some(shape),
            ..Self::plain(SemanticType::Bson)
        }
    }

    /// A nested document packed by the document codec.
    #[must_use]
    pub fn document(fields: SubSchema) -> Self {
        Self::bson(BsonShape::Document(fields))
    }

    /// Returns the physical column format.
    #[must_use]
    pub fn column_format(&self) -> ColumnFormat {
        self.column_format
    }

    /// Returns the logical type.
    #[must_use]
    pub fn actual_type(&self) -> SemanticType {
        self.actual_type
    }

    /// Returns the decode-only read format, if the type has one.
    #[must_use]
    pub fn read_format(&self) -> Option<FormatCode> {
        self.read_format
    }

    /// Returns the nested shape of a `bson` entry.
    #[must_use]
    pub fn bson_shape(&self) -> Option<&BsonShape> {
        self.bson_shape.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_formats() {
        let cases = [
            (SchemaEntry::string(None).unwrap(), "S", None),
            (SchemaEntry::string(Some(20)).unwrap(), "20S", None),
            (SchemaEntry::int(), "i", None),
            (SchemaEntry::uint(), "I", None),
            (SchemaEntry::half(), "h", None),
            (SchemaEntry::uhalf(), "H", None),
            (SchemaEntry::byte(), "b", None),
            (SchemaEntry::ubyte(), "B", None),
            (SchemaEntry::long(), "q", None),
            (SchemaEntry::ulong(), "Q", None),
            (SchemaEntry::bigint(), "u", Some('z')),
            (SchemaEntry::double(), "u", Some('d')),
            (SchemaEntry::binary(Some(16)).unwrap(), "16u", None),
            (SchemaEntry::bitfield(4).unwrap(), "4t", None),
            (SchemaEntry::boolean(), "t", Some('T')),
        ];
        for (entry, format, read) in cases {
            assert_eq!(entry.column_format().to_string(), format);
            assert_eq!(entry.read_format().map(FormatCode::as_char), read);
        }
    }

    #[test]
    fn test_invalid_lengths() {
        assert!(SchemaEntry::bitfield(0).is_err());
        assert!(SchemaEntry::bitfield(9).is_err());
        assert!(SchemaEntry::char_array(0).is_err());
    }

    #[test]
    fn test_bson_shapes() {
        let scalar = SchemaEntry::bson(BsonShape::Scalar(Box::new(SchemaEntry::bigint())));
        assert_eq!(scalar.actual_type(), SemanticType::Bson);
        assert_eq!(scalar.column_format().to_string(), "u");

        let nested = SchemaEntry::document(
            SubSchema::new().field("inner", SchemaEntry::document(SubSchema::new())),
        );
        match nested.bson_shape() {
            Some(BsonShape::Document(sub)) => assert_eq!(sub.fields().len(), 1),
            other => panic!("unexpected shape {other:?}"),
        }
    }
}
