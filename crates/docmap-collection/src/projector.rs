//! Value projector: documents to positional value tuples.
//!
//! Every declared value column produces exactly one tuple slot, in schema
//! order. The remaining column gathers its declared sub-fields into one
//! packed document, `bson` columns wrap their value as `{ "_": value }`
//! before packing, and everything else passes through unchanged once it
//! has been checked against the column's format.

use serde::{Deserialize, Serialize};

use docmap_common::constants::{ID_NAME, WRAPPED_SCALAR_FIELD};
use docmap_common::types::{ColumnFormat, FormatCode, SemanticType};
use docmap_common::{Document, MapError, MapResult, Value};
use docmap_schema::{ColumnSpec, CompiledSchema};

use crate::codec::DocumentCodec;

/// One slot of a partial-update tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateValue {
    /// Leave the stored value unchanged.
    Keep,
    /// Overwrite with this value. `Value::Null` writes a null.
    Set(Value),
}

impl UpdateValue {
    /// Returns true for [`UpdateValue::Keep`].
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// A `$set`-style modifier.
///
/// # Example
///
/// ```rust
/// use docmap_collection::UpdateModifier;
///
/// let modifier = UpdateModifier::new().set("name", "Ada").set("age", 36i64);
/// assert_eq!(modifier.fields().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateModifier {
    set: Document,
}

impl UpdateModifier {
    /// Creates an empty modifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(name, value);
        self
    }

    /// Returns the fields to set.
    #[must_use]
    pub fn fields(&self) -> &Document {
        &self.set
    }
}

impl From<Document> for UpdateModifier {
    fn from(set: Document) -> Self {
        Self { set }
    }
}

/// Projects documents onto a compiled schema.
pub struct ValueProjector<'a> {
    schema: &'a CompiledSchema,
    codec: &'a dyn DocumentCodec,
}

impl<'a> ValueProjector<'a> {
    /// Creates a projector.
    pub fn new(schema: &'a CompiledSchema, codec: &'a dyn DocumentCodec) -> Self {
        Self { schema, codec }
    }

    /// Extracts and checks the key of `document`.
    pub fn key(&self, document: &Document) -> MapResult<Value> {
        let spec = self.schema.key_spec();
        let value = document.get(ID_NAME).ok_or_else(|| MapError::MissingField {
            name: ID_NAME.to_string(),
        })?;
        check_value(spec, value)?;
        Ok(value.clone())
    }

    /// Projects a full document into its value tuple.
    ///
    /// The tuple length always equals the declared value column count.
    pub fn project(&self, document: &Document) -> MapResult<Vec<Value>> {
        self.schema
            .value_specs()
            .iter()
            .map(|spec| {
                if spec.is_remaining() {
                    return self.pack_remaining(document);
                }
                let value = document.get(&spec.name).ok_or_else(|| MapError::MissingField {
                    name: spec.name.clone(),
                })?;
                self.encode_column(spec, value)
            })
            .collect()
    }

    /// Projects a modifier into a partial-update tuple.
    ///
    /// Columns the modifier does not name become [`UpdateValue::Keep`].
    pub fn project_update(&self, modifier: &UpdateModifier) -> MapResult<Vec<UpdateValue>> {
        for name in modifier.fields().keys() {
            if name == ID_NAME {
                return Err(MapError::UnsupportedUpdate {
                    name: name.to_string(),
                    reason: "the key cannot be updated in place".to_string(),
                });
            }
            if self.schema.spec(name).is_some_and(ColumnSpec::is_remaining) {
                return Err(MapError::UnsupportedUpdate {
                    name: name.to_string(),
                    reason: "the remaining column is rebuilt from its fields on insert"
                        .to_string(),
                });
            }
            if self.schema.remaining_spec(name).is_some() {
                return Err(MapError::UnsupportedUpdate {
                    name: name.to_string(),
                    reason: "fields packed into the remaining column are written as a whole"
                        .to_string(),
                });
            }
            if self.schema.spec(name).is_none() {
                return Err(MapError::unknown_column(name));
            }
        }

        self.schema
            .value_specs()
            .iter()
            .map(|spec| match modifier.fields().get(&spec.name) {
                None => Ok(UpdateValue::Keep),
                // a bson null is stored as `{_: null}`, never bare
                Some(Value::Null) if spec.actual_type != SemanticType::Bson => {
                    Ok(UpdateValue::Set(Value::Null))
                }
                Some(value) => self.encode_column(spec, value).map(UpdateValue::Set),
            })
            .collect()
    }

    fn pack_remaining(&self, document: &Document) -> MapResult<Value> {
        let mut packed = Document::new();
        for spec in self.schema.remaining_specs() {
            if let Some(value) = document.get(&spec.name) {
                packed.insert(spec.name.clone(), self.check_nested(spec, value)?);
            }
        }
        Ok(Value::Binary(self.codec.encode(&packed)?))
    }

    fn encode_column(&self, spec: &ColumnSpec, value: &Value) -> MapResult<Value> {
        if spec.actual_type == SemanticType::Bson {
            let wrapped = Document::new().with(WRAPPED_SCALAR_FIELD, value.clone());
            return Ok(Value::Binary(self.codec.encode(&wrapped)?));
        }
        check_value(spec, value)?;
        Ok(value.clone())
    }

    fn check_nested(&self, spec: &ColumnSpec, value: &Value) -> MapResult<Value> {
        if spec.actual_type != SemanticType::Bson {
            check_value(spec, value)?;
        }
        Ok(value.clone())
    }
}

/// Checks a value against the format a column is read with.
///
/// Numeric values must fit the column width. Sortable columns accept
/// either the logical value or caller-encoded sortable bytes.
pub(crate) fn check_value(spec: &ColumnSpec, value: &Value) -> MapResult<()> {
    let format = spec.effective_format();
    let fits = match (format.code(), value) {
        (FormatCode::String | FormatCode::CharArray, Value::String(s)) => {
            format.length().map_or(true, |max| s.len() <= max as usize)
        }
        (FormatCode::Byte, Value::Int(i)) => i8::try_from(*i).is_ok(),
        (FormatCode::Half, Value::Int(i)) => i16::try_from(*i).is_ok(),
        (FormatCode::Int | FormatCode::Int2, Value::Int(i)) => i32::try_from(*i).is_ok(),
        (FormatCode::Long, Value::Int(_)) => true,
        (FormatCode::UByte, Value::UInt(u)) => u8::try_from(*u).is_ok(),
        (FormatCode::UHalf, Value::UInt(u)) => u16::try_from(*u).is_ok(),
        (FormatCode::UInt | FormatCode::UInt2, Value::UInt(u)) => u32::try_from(*u).is_ok(),
        (FormatCode::ULong | FormatCode::RecordId, Value::UInt(_)) => true,
        (FormatCode::Bitfield, Value::UInt(u)) => bitfield_fits(format, *u),
        (FormatCode::Boolean, Value::Bool(_)) => true,
        (FormatCode::SortableBigInt, Value::BigInt(_) | Value::Binary(_)) => true,
        (FormatCode::SortableDouble, Value::Double(_) | Value::Binary(_)) => true,
        (FormatCode::Item | FormatCode::UItem, Value::Binary(b)) => {
            format.length().map_or(true, |len| b.len() == len as usize)
        }
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(MapError::TypeMismatch {
            name: spec.name.clone(),
            expected: describe(spec, format),
            actual: value.kind().to_string(),
        })
    }
}

fn bitfield_fits(format: ColumnFormat, value: u64) -> bool {
    let width = format.length().unwrap_or(1);
    value < (1u64 << width)
}

fn describe(spec: &ColumnSpec, format: ColumnFormat) -> String {
    format!("{} ('{}')", spec.actual_type, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeCodec;
    use docmap_common::ErrorCode;
    use docmap_schema::{BsonShape, SchemaDefinition, SchemaEntry, SubSchema};

    fn compiled() -> CompiledSchema {
        let schema = SchemaDefinition::new()
            .field("_id", SchemaEntry::char_array(4).unwrap())
            .field("name", SchemaEntry::string(None).unwrap())
            .field("age", SchemaEntry::byte())
            .field("score", SchemaEntry::double())
            .field("active", SchemaEntry::boolean())
            .field(
                "meta",
                SchemaEntry::bson(BsonShape::Scalar(Box::new(SchemaEntry::long()))),
            )
            .remaining(
                SubSchema::new()
                    .field("a", SchemaEntry::string(None).unwrap())
                    .field("b", SchemaEntry::int()),
            );
        CompiledSchema::compile("people", &schema.into()).unwrap()
    }

    fn person() -> Document {
        Document::new()
            .with("_id", "p001")
            .with("name", "Ada")
            .with("age", 36i64)
            .with("score", 9.5)
            .with("active", true)
            .with("meta", 42i64)
            .with("a", "Hello World")
    }

    #[test]
    fn test_project_full_document() {
        let schema = compiled();
        let codec = BincodeCodec;
        let projector = ValueProjector::new(&schema, &codec);

        assert_eq!(projector.key(&person()).unwrap(), Value::from("p001"));
        let tuple = projector.project(&person()).unwrap();
        assert_eq!(tuple.len(), schema.value_specs().len());
        assert_eq!(tuple[0], Value::from("Ada"));
        assert_eq!(tuple[2], Value::Double(9.5));

        let meta = codec.decode(tuple[4].as_bytes().unwrap()).unwrap();
        assert_eq!(meta.get("_"), Some(&Value::Int(42)));

        let remaining = codec.decode(tuple[5].as_bytes().unwrap()).unwrap();
        assert_eq!(remaining.get("a"), Some(&Value::from("Hello World")));
        assert!(!remaining.contains_key("b"));
    }

    #[test]
    fn test_missing_and_mismatched_fields() {
        let schema = compiled();
        let projector = ValueProjector::new(&schema, &BincodeCodec);

        let mut doc = person();
        doc.remove("name");
        let err = projector.project(&doc).unwrap_err();
        assert!(matches!(err, MapError::MissingField { name } if name == "name"));

        let doc = person().with("age", 300i64);
        assert_eq!(projector.project(&doc).unwrap_err().code(), ErrorCode::TypeMismatch);

        let doc = person().with("score", "high");
        assert_eq!(projector.project(&doc).unwrap_err().code(), ErrorCode::TypeMismatch);

        let doc = person().with("_id", "too long");
        assert_eq!(projector.key(&doc).unwrap_err().code(), ErrorCode::TypeMismatch);

        let doc = person().with("b", "not an int");
        assert_eq!(projector.project(&doc).unwrap_err().code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_sortable_columns_accept_encoded_bytes() {
        let schema = compiled();
        let projector = ValueProjector::new(&schema, &BincodeCodec);
        let encoded = docmap_common::types::encode_double(9.5);
        let doc = person().with("score", Value::binary(&encoded));
        assert!(projector.project(&doc).is_ok());
    }

    #[test]
    fn test_project_update() {
        let schema = compiled();
        let projector = ValueProjector::new(&schema, &BincodeCodec);

        let modifier = UpdateModifier::new().set("age", 37i64).set("active", Value::Null);
        let update = projector.project_update(&modifier).unwrap();
        assert_eq!(update.len(), schema.value_specs().len());
        assert_eq!(update[0], UpdateValue::Keep);
        assert_eq!(update[1], UpdateValue::Set(Value::Int(37)));
        assert_eq!(update[3], UpdateValue::Set(Value::Null));
        assert!(update[5].is_keep());
    }

    #[test]
    fn test_unsupported_updates() {
        let schema = compiled();
        let projector = ValueProjector::new(&schema, &BincodeCodec);

        let err = projector
            .project_update(&UpdateModifier::new().set("_id", "p002"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedUpdate);

        let err = projector
            .project_update(&UpdateModifier::new().set("a", "x"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedUpdate);

        let err = projector
            .project_update(&UpdateModifier::new().set("nope", 1i64))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownColumn);
    }

    #[test]
    fn test_remaining_column_cannot_be_set() {
        let schema = compiled();
        let projector = ValueProjector::new(&schema, &BincodeCodec);
        let modifier = UpdateModifier::new().set("_remaining", Document::new().with("a", "y"));
        let err = projector.project_update(&modifier).unwrap_err();
        assert!(matches!(err, MapError::UnsupportedUpdate { name, .. } if name == "_remaining"));
    }

    #[test]
    fn test_bson_null_update_is_wrapped() {
        let schema = compiled();
        let codec = BincodeCodec;
        let projector = ValueProjector::new(&schema, &codec);

        let update = projector
            .project_update(&UpdateModifier::new().set("meta", Value::Null))
            .unwrap();
        let UpdateValue::Set(packed) = &update[4] else {
            panic!("meta should be set, got {:?}", update[4]);
        };
        let wrapped = codec.decode(packed.as_bytes().unwrap()).unwrap();
        assert_eq!(wrapped.get("_"), Some(&Value::Null));
    }
}
