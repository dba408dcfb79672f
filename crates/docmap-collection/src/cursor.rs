//! Paged find cursors.

use std::sync::Arc;

use tracing::warn;

use docmap_common::{Document, MapResult};
use docmap_schema::ColumnSpec;

use crate::codec::DocumentCodec;
use crate::engine::EngineCursor;
use crate::mapper::ResultMapper;

/// A cursor that decodes engine rows into documents.
///
/// The underlying engine cursor is closed when the `FindCursor` is closed
/// or dropped.
pub struct FindCursor<C: EngineCursor> {
    cursor: C,
    specs: Vec<ColumnSpec>,
    codec: Arc<dyn DocumentCodec>,
    batch_size: usize,
    closed: bool,
}

impl<C: EngineCursor> FindCursor<C> {
    pub(crate) fn new(
        cursor: C,
        specs: Vec<ColumnSpec>,
        codec: Arc<dyn DocumentCodec>,
        batch_size: usize,
    ) -> Self {
        Self {
            cursor,
            specs,
            codec,
            batch_size: batch_size.max(1),
            closed: false,
        }
    }

    /// Returns the page size used by [`FindCursor::for_each`].
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the specs rows are decoded with.
    #[must_use]
    pub fn specs(&self) -> &[ColumnSpec] {
        &self.specs
    }

    /// Fetches and decodes up to `batch_size` documents.
    ///
    /// A batch shorter than requested means the cursor is exhausted.
    pub fn next_batch(&mut self, batch_size: usize) -> MapResult<Vec<Document>> {
        let rows = self.cursor.next_batch(batch_size)?;
        ResultMapper::new(&self.specs, self.codec.as_ref()).map_rows(rows)
    }

    /// Visits every remaining document, page by page, then rewinds.
    ///
    /// The callback receives each document and its running index. The
    /// cursor is reset on every exit path, including a callback error, so
    /// it can be iterated again.
    pub fn for_each<F>(&mut self, mut callback: F) -> MapResult<()>
    where
        F: FnMut(Document, usize) -> MapResult<()>,
    {
        let drained = self.drain(&mut callback);
        match self.cursor.reset() {
            Ok(()) => drained,
            Err(e) => {
                warn!(error = %e, "failed to reset cursor after iteration");
                drained.and(Err(e))
            }
        }
    }

    fn drain<F>(&mut self, callback: &mut F) -> MapResult<()>
    where
        F: FnMut(Document, usize) -> MapResult<()>,
    {
        let mut index = 0;
        loop {
            let batch = self.next_batch(self.batch_size)?;
            let done = batch.len() < self.batch_size;
            for document in batch {
                callback(document, index)?;
                index += 1;
            }
            if done {
                return Ok(());
            }
        }
    }

    /// Collects every remaining document.
    pub fn to_vec(&mut self) -> MapResult<Vec<Document>> {
        self.map(|document, _| document)
    }

    /// Maps every remaining document.
    pub fn map<T, F>(&mut self, mut f: F) -> MapResult<Vec<T>>
    where
        F: FnMut(Document, usize) -> T,
    {
        let mut out = Vec::new();
        self.for_each(|document, index| {
            out.push(f(document, index));
            Ok(())
        })?;
        Ok(out)
    }

    /// Rewinds to the first row.
    pub fn reset(&mut self) -> MapResult<()> {
        self.cursor.reset()
    }

    /// Releases the engine cursor.
    pub fn close(mut self) -> MapResult<()> {
        self.closed = true;
        self.cursor.close()
    }
}

impl<C: EngineCursor> Drop for FindCursor<C> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.cursor.close() {
                warn!(error = %e, "failed to close cursor on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeCodec;
    use crate::engine::{MemoryCursor, MemoryEngine, ReadRequest, Row, TableEngine};
    use docmap_common::{ErrorCode, MapError, Value};
    use docmap_schema::{CompiledSchema, SchemaDefinition, SchemaEntry};

    fn setup(rows: i64) -> (MemoryEngine, CompiledSchema) {
        let schema = SchemaDefinition::new()
            .field("_id", SchemaEntry::long())
            .field("name", SchemaEntry::string(None).unwrap());
        let compiled = CompiledSchema::compile("t", &schema.into()).unwrap();
        let engine = MemoryEngine::new();
        engine
            .create_table("table:t", &compiled.create_config().to_string())
            .unwrap();
        let rows = (0..rows)
            .map(|i| Row::new(i, vec![format!("n{i}").into()]))
            .collect();
        engine.insert_many("table:t", rows).unwrap();
        (engine, compiled)
    }

    fn open(engine: &MemoryEngine, compiled: &CompiledSchema, batch: usize) -> FindCursor<MemoryCursor> {
        let projection = compiled.projection(None).unwrap();
        let request = ReadRequest {
            value_format: projection.value_format().to_string(),
            columns: None,
        };
        let cursor = engine.find("table:t", &[], &request).unwrap();
        FindCursor::new(cursor, projection.specs().to_vec(), Arc::new(BincodeCodec), batch)
    }

    #[test]
    fn test_for_each_pages_until_short_batch() {
        let (engine, compiled) = setup(7);
        let mut cursor = open(&engine, &compiled, 3);
        let mut seen = Vec::new();
        cursor
            .for_each(|doc, i| {
                seen.push((i, doc.get("_id").cloned()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 7);
        assert_eq!(seen[6], (6, Some(Value::Int(6))));

        // reset after the drain
        assert_eq!(cursor.to_vec().unwrap().len(), 7);
    }

    #[test]
    fn test_exact_multiple_of_batch_size() {
        let (engine, compiled) = setup(6);
        let mut cursor = open(&engine, &compiled, 3);
        let names = cursor.map(|doc, _| doc.get("name").cloned()).unwrap();
        assert_eq!(names.len(), 6);
        assert_eq!(names[0], Some(Value::from("n0")));
    }

    #[test]
    fn test_callback_error_still_resets() {
        let (engine, compiled) = setup(5);
        let mut cursor = open(&engine, &compiled, 2);
        let err = cursor
            .for_each(|_, i| {
                if i == 2 {
                    Err(MapError::internal("stop"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(cursor.next_batch(1).unwrap()[0].get("_id"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_close_and_drop_release_engine_cursor() {
        let (engine, compiled) = setup(2);
        let cursor = open(&engine, &compiled, 10);
        assert_eq!(engine.open_cursors(), 1);
        cursor.close().unwrap();
        assert_eq!(engine.open_cursors(), 0);

        {
            let _cursor = open(&engine, &compiled, 10);
            assert_eq!(engine.open_cursors(), 1);
        }
        assert_eq!(engine.open_cursors(), 0);
    }
}
