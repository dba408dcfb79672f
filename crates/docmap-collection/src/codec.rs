//! Nested document codec.
//!
//! Packs sub-documents and the remaining-fields column into a single
//! binary value. The codec only handles whole documents: a bare scalar is
//! wrapped as `{ "_": value }` by the projector before it gets here.

use bytes::Bytes;

use docmap_common::{Document, MapError, MapResult};

/// Packs and unpacks nested documents.
pub trait DocumentCodec: Send + Sync {
    /// Encodes a document into one binary value.
    fn encode(&self, document: &Document) -> MapResult<Bytes>;

    /// Decodes a value produced by [`DocumentCodec::encode`].
    fn decode(&self, bytes: &[u8]) -> MapResult<Document>;
}

/// `bincode`-backed codec.
///
/// # Example
///
/// ```rust
/// use docmap_collection::{BincodeCodec, DocumentCodec};
/// use docmap_common::Document;
///
/// let codec = BincodeCodec;
/// let doc = Document::new().with("a", "Hello World");
/// let bytes = codec.encode(&doc).unwrap();
/// assert_eq!(codec.decode(&bytes).unwrap(), doc);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl DocumentCodec for BincodeCodec {
    fn encode(&self, document: &Document) -> MapResult<Bytes> {
        bincode::serialize(document)
            .map(Bytes::from)
            .map_err(|e| MapError::Codec {
                message: format!("failed to encode document: {e}"),
            })
    }

    fn decode(&self, bytes: &[u8]) -> MapResult<Document> {
        bincode::deserialize(bytes).map_err(|e| MapError::Codec {
            message: format!("failed to decode document: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_common::{ErrorCode, Value};

    #[test]
    fn test_nested_values_survive() {
        let inner = Document::new().with("n", 7i64).with("big", Value::BigInt(-1 << 100));
        let doc = Document::new()
            .with("inner", inner)
            .with("list", Value::Array(vec![Value::Double(1.5), Value::Null]))
            .with("raw", Value::binary(&[0, 1, 2]));

        let codec = BincodeCodec;
        let bytes = codec.encode(&doc).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_garbage_is_codec_error() {
        let err = BincodeCodec.decode(&[0xff, 0xff, 0xff]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Codec);
    }
}
