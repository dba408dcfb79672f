//! Result mapper: positional value tuples back to documents.

use docmap_common::constants::{ID_NAME, WRAPPED_SCALAR_FIELD};
use docmap_common::types::SemanticType;
use docmap_common::{Document, MapError, MapResult, Value};
use docmap_schema::ColumnSpec;

use crate::codec::DocumentCodec;
use crate::engine::Row;

/// Rebuilds documents from rows read with a given projection.
///
/// The column specs must be the ones the read was issued with: position `i` of
/// every row is decoded as `specs[i]`.
pub struct ResultMapper<'a> {
    specs: &'a [ColumnSpec],
    codec: &'a dyn DocumentCodec,
}

impl<'a> ResultMapper<'a> {
    /// Creates a mapper over `specs`.
    pub fn new(specs: &'a [ColumnSpec], codec: &'a dyn DocumentCodec) -> Self {
        Self { specs, codec }
    }

    /// Decodes one row.
    ///
    /// Remaining-column fields are merged at the top level after every
    /// declared column has been placed. The row key is surfaced as `_id`
    /// unless a projected column already produced it.
    pub fn map_row(&self, row: Row) -> MapResult<Document> {
        let Row { key, values } = row;
        if values.len() != self.specs.len() {
            return Err(MapError::ColumnCountMismatch {
                expected: self.specs.len(),
                actual: values.len(),
            });
        }

        let mut document = Document::new();
        let mut remaining = None;
        for (spec, value) in self.specs.iter().zip(values) {
            if spec.is_remaining() {
                remaining = Some(self.unpack(spec, &value)?);
            } else if spec.actual_type == SemanticType::Bson {
                let mut wrapped = self.unpack(spec, &value)?;
                let inner = wrapped.remove(WRAPPED_SCALAR_FIELD).unwrap_or(Value::Null);
                document.insert(spec.name.clone(), inner);
            } else {
                document.insert(spec.name.clone(), value);
            }
        }
        if let Some(fields) = remaining {
            document.merge(fields);
        }
        if !document.contains_key(ID_NAME) {
            document.insert(ID_NAME, key);
        }
        Ok(document)
    }

    /// Decodes a batch of rows.
    pub fn map_rows(&self, rows: Vec<Row>) -> MapResult<Vec<Document>> {
        rows.into_iter().map(|row| self.map_row(row)).collect()
    }

    fn unpack(&self, spec: &ColumnSpec, value: &Value) -> MapResult<Document> {
        let bytes = value.as_bytes().ok_or_else(|| MapError::TypeMismatch {
            name: spec.name.clone(),
            expected: "packed document bytes".to_string(),
            actual: value.kind().to_string(),
        })?;
        self.codec.decode(bytes)
    }
}
