//! In-memory table engine.
//!
//! Reads the same create config text a real engine would, keeps rows in a
//! `BTreeMap` under an order-preserving key encoding and honours the read
//! formats of a find request. Conditions on the primary key are evaluated;
//! index-targeted conditions need extractor execution and are rejected.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use docmap_common::config::{parse_config, ConfigValue};
use docmap_common::constants::{COLGROUP_URI_PREFIX, INDEX_URI_PREFIX, TABLE_URI_PREFIX};
use docmap_common::types::{
    decode_bigint, decode_double, encode_bigint, encode_double, parse_format_string,
    ColumnFormat, FormatCode,
};
use docmap_common::{MapError, MapResult, Value};
use docmap_query::{ConditionSpec, Operation};

use super::{EngineCursor, ReadRequest, Row, TableEngine};
use crate::projector::UpdateValue;

/// Key type tags, so keys of different kinds never interleave.
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
enum KeyTag {
    Bool = 1,
    Int = 2,
    UInt = 3,
    BigInt = 4,
    Double = 5,
    String = 6,
    Binary = 7,
}

#[derive(Debug)]
struct MemoryTable {
    config: String,
    key_name: String,
    value_names: Vec<String>,
    value_formats: Vec<ColumnFormat>,
    rows: BTreeMap<Vec<u8>, Row>,
}

impl MemoryTable {
    fn from_config(config: &str) -> MapResult<Self> {
        let parsed = parse_config(config)?;
        let key_format = parsed.get_scalar("key_format").unwrap_or("u");
        parse_format_string(key_format)?;
        let value_formats = parse_format_string(parsed.get_scalar("value_format").unwrap_or("u"))?;

        let columns = parsed
            .get("columns")
            .and_then(ConfigValue::group_items)
            .ok_or_else(|| MapError::invalid_config("table config has no columns clause"))?;
        let (key_name, value_names) = columns
            .split_first()
            .ok_or_else(|| MapError::invalid_config("table config lists no columns"))?;
        if value_names.len() != value_formats.len() {
            return Err(MapError::invalid_config(format!(
                "{} value columns but {} value formats",
                value_names.len(),
                value_formats.len()
            )));
        }

        Ok(Self {
            config: config.to_string(),
            key_name: (*key_name).to_string(),
            value_names: value_names.iter().map(|s| (*s).to_string()).collect(),
            value_formats,
            rows: BTreeMap::new(),
        })
    }

    fn pack_tuple(&self, values: Vec<Value>) -> MapResult<Vec<Value>> {
        if values.len() != self.value_formats.len() {
            return Err(MapError::engine(format!(
                "tuple has {} values, table has {} value columns",
                values.len(),
                self.value_formats.len()
            )));
        }
        values
            .into_iter()
            .zip(&self.value_formats)
            .map(|(value, format)| pack(*format, value))
            .collect()
    }

    fn select(&self, request: &ReadRequest) -> MapResult<Vec<Selected>> {
        let names: Vec<String> = match &request.columns {
            Some(clause) => ConfigValue::scalar(clause)
                .group_items()
                .ok_or_else(|| MapError::engine(format!("malformed column clause '{clause}'")))?
                .into_iter()
                .map(str::to_string)
                .collect(),
            None => self.value_names.clone(),
        };

        let mut selected = Vec::with_capacity(names.len());
        for name in &names {
            if *name == self.key_name {
                selected.push(Selected::Key);
            } else {
                let position = self
                    .value_names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| MapError::engine(format!("no column '{name}'")))?;
                selected.push(Selected::Value(position));
            }
        }
        Ok(selected)
    }
}

#[derive(Debug, Clone, Copy)]
enum Selected {
    Key,
    Value(usize),
}

/// An in-memory [`TableEngine`].
///
/// # Example
///
/// ```rust
/// use docmap_collection::engine::{MemoryEngine, ReadRequest, Row, TableEngine, EngineCursor};
/// use docmap_common::Value;
///
/// let engine = MemoryEngine::new();
/// engine
///     .create_table("table:t", "key_format=S,value_format=Si,columns=(_id,name,age)")
///     .unwrap();
/// engine
///     .insert_many("table:t", vec![Row::new("k1", vec!["Ada".into(), 36i64.into()])])
///     .unwrap();
///
/// let mut cursor = engine.find("table:t", &[], &ReadRequest::default()).unwrap();
/// let rows = cursor.next_batch(10).unwrap();
/// assert_eq!(rows[0].values[1], Value::Int(36));
/// ```
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<HashMap<String, MemoryTable>>,
    objects: RwLock<BTreeMap<String, String>>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty engine wrapped in `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the create config of a table, colgroup or index.
    #[must_use]
    pub fn config_of(&self, uri: &str) -> Option<String> {
        if uri.starts_with(TABLE_URI_PREFIX) {
            return self.tables.read().get(uri).map(|t| t.config.clone());
        }
        self.objects.read().get(uri).cloned()
    }

    /// Returns the number of rows stored in a table.
    #[must_use]
    pub fn row_count(&self, table_uri: &str) -> usize {
        self.tables.read().get(table_uri).map_or(0, |t| t.rows.len())
    }

    /// Returns the number of cursors opened and not yet closed.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    fn create_object(&self, prefix: &str, uri: &str, config: &str) -> MapResult<()> {
        let table_uri = owning_table(prefix, uri)?;
        if !self.tables.read().contains_key(&table_uri) {
            return Err(MapError::engine(format!("{uri}: no such table '{table_uri}'")));
        }
        let mut objects = self.objects.write();
        match objects.get(uri) {
            Some(existing) if existing == config => Ok(()),
            Some(_) => Err(MapError::engine(format!(
                "{uri} already exists with a different config"
            ))),
            None => {
                objects.insert(uri.to_string(), config.to_string());
                Ok(())
            }
        }
    }
}

impl TableEngine for MemoryEngine {
    type Cursor = MemoryCursor;

    fn create_table(&self, uri: &str, config: &str) -> MapResult<()> {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(uri) {
            if existing.config == config {
                return Ok(());
            }
            return Err(MapError::engine(format!(
                "{uri} already exists with a different config"
            )));
        }
        tables.insert(uri.to_string(), MemoryTable::from_config(config)?);
        Ok(())
    }

    fn create_colgroup(&self, uri: &str, config: &str) -> MapResult<()> {
        self.create_object(COLGROUP_URI_PREFIX, uri, config)
    }

    fn create_index(&self, uri: &str, config: &str) -> MapResult<()> {
        parse_config(config)?;
        self.create_object(INDEX_URI_PREFIX, uri, config)
    }

    fn find(
        &self,
        table_uri: &str,
        conditions: &[ConditionSpec],
        request: &ReadRequest,
    ) -> MapResult<Self::Cursor> {
        conditions.iter().try_for_each(check_supported)?;

        let tables = self.tables.read();
        let table = table_ref(&tables, table_uri)?;
        let selected = table.select(request)?;
        let formats = if request.value_format.is_empty() {
            selected
                .iter()
                .map(|s| match s {
                    Selected::Key => ColumnFormat::new(FormatCode::Item),
                    Selected::Value(i) => table.value_formats[*i],
                })
                .collect()
        } else {
            parse_format_string(&request.value_format)?
        };
        if formats.len() != selected.len() {
            return Err(MapError::engine(format!(
                "value format '{}' has {} columns, projection has {}",
                request.value_format,
                formats.len(),
                selected.len()
            )));
        }

        let mut rows = Vec::new();
        for (key_bytes, row) in &table.rows {
            if !matches_all(conditions, key_bytes)? {
                continue;
            }
            let values = selected
                .iter()
                .zip(&formats)
                .map(|(s, format)| {
                    let stored = match s {
                        Selected::Key => row.key.clone(),
                        Selected::Value(i) => row.values[*i].clone(),
                    };
                    unpack(*format, stored)
                })
                .collect::<MapResult<Vec<_>>>()?;
            rows.push(Row {
                key: row.key.clone(),
                values,
            });
        }

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryCursor {
            rows,
            position: 0,
            closed: false,
            open_cursors: Arc::clone(&self.open_cursors),
        })
    }

    fn insert_many(&self, table_uri: &str, rows: Vec<Row>) -> MapResult<()> {
        let mut tables = self.tables.write();
        let table = table_mut(&mut tables, table_uri)?;

        let mut staged = BTreeMap::new();
        for row in rows {
            let key = encode_key(&row.key)?;
            if table.rows.contains_key(&key) || staged.contains_key(&key) {
                return Err(MapError::engine(format!(
                    "{table_uri}: duplicate key {}",
                    row.key
                )));
            }
            let values = table.pack_tuple(row.values)?;
            staged.insert(key, Row { key: row.key, values });
        }
        table.rows.append(&mut staged);
        Ok(())
    }

    fn update_many(
        &self,
        table_uri: &str,
        conditions: &[ConditionSpec],
        values: &[UpdateValue],
    ) -> MapResult<u64> {
        conditions.iter().try_for_each(check_supported)?;

        let mut tables = self.tables.write();
        let table = table_mut(&mut tables, table_uri)?;
        if values.len() != table.value_formats.len() {
            return Err(MapError::engine(format!(
                "update has {} slots, table has {} value columns",
                values.len(),
                table.value_formats.len()
            )));
        }
        let packed = values
            .iter()
            .zip(&table.value_formats)
            .map(|(slot, format)| match slot {
                UpdateValue::Keep => Ok(None),
                UpdateValue::Set(value) => pack(*format, value.clone()).map(Some),
            })
            .collect::<MapResult<Vec<_>>>()?;

        let mut updated = 0;
        for (key_bytes, row) in table.rows.iter_mut() {
            if !matches_all(conditions, key_bytes)? {
                continue;
            }
            for (stored, slot) in row.values.iter_mut().zip(&packed) {
                if let Some(value) = slot {
                    *stored = value.clone();
                }
            }
            updated += 1;
        }
        Ok(updated)
    }

    fn delete_many(&self, table_uri: &str, conditions: &[ConditionSpec]) -> MapResult<u64> {
        conditions.iter().try_for_each(check_supported)?;

        let mut tables = self.tables.write();
        let table = table_mut(&mut tables, table_uri)?;
        let mut doomed = Vec::new();
        for key_bytes in table.rows.keys() {
            if matches_all(conditions, key_bytes)? {
                doomed.push(key_bytes.clone());
            }
        }
        for key in &doomed {
            table.rows.remove(key);
        }
        Ok(doomed.len() as u64)
    }
}

/// Cursor over a snapshot of matching rows.
#[derive(Debug)]
pub struct MemoryCursor {
    rows: Vec<Row>,
    position: usize,
    closed: bool,
    open_cursors: Arc<AtomicUsize>,
}

impl EngineCursor for MemoryCursor {
    fn next_batch(&mut self, batch_size: usize) -> MapResult<Vec<Row>> {
        if self.closed {
            return Err(MapError::engine("cursor is closed"));
        }
        let end = self.rows.len().min(self.position + batch_size);
        let batch = self.rows[self.position..end].to_vec();
        self.position = end;
        Ok(batch)
    }

    fn reset(&mut self) -> MapResult<()> {
        if self.closed {
            return Err(MapError::engine("cursor is closed"));
        }
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) -> MapResult<()> {
        if !self.closed {
            self.closed = true;
            self.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn owning_table(prefix: &str, uri: &str) -> MapResult<String> {
    uri.strip_prefix(prefix)
        .and_then(|rest| rest.split_once(':'))
        .map(|(table, _)| format!("{TABLE_URI_PREFIX}{table}"))
        .ok_or_else(|| MapError::engine(format!("malformed uri '{uri}'")))
}

fn table_ref<'a>(
    tables: &'a HashMap<String, MemoryTable>,
    uri: &str,
) -> MapResult<&'a MemoryTable> {
    tables
        .get(uri)
        .ok_or_else(|| MapError::engine(format!("no such table '{uri}'")))
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    uri: &str,
) -> MapResult<&'a mut MemoryTable> {
    tables
        .get_mut(uri)
        .ok_or_else(|| MapError::engine(format!("no such table '{uri}'")))
}

/// Converts a caller value into its stored form.
fn pack(format: ColumnFormat, value: Value) -> MapResult<Value> {
    match (format.code(), value) {
        (_, Value::Null) => Ok(Value::Null),
        (FormatCode::Item | FormatCode::UItem, Value::Double(d)) => {
            Ok(Value::binary(&encode_double(d)))
        }
        (FormatCode::Item | FormatCode::UItem, Value::BigInt(i)) => {
            Ok(Value::from(encode_bigint(i)))
        }
        (FormatCode::Item | FormatCode::UItem, value @ Value::Binary(_)) => Ok(value),
        (FormatCode::Bitfield, Value::Bool(b)) => Ok(Value::UInt(u64::from(b))),
        (FormatCode::Item | FormatCode::UItem, other) => Err(MapError::engine(format!(
            "cannot pack {} into '{format}'",
            other.kind()
        ))),
        (_, value) => Ok(value),
    }
}

/// Converts a stored value into the shape its read format asks for.
fn unpack(format: ColumnFormat, stored: Value) -> MapResult<Value> {
    match (format.code(), stored) {
        (_, Value::Null) => Ok(Value::Null),
        (FormatCode::SortableDouble, Value::Binary(b)) => decode_double(&b).map(Value::Double),
        (FormatCode::SortableBigInt, Value::Binary(b)) => decode_bigint(&b).map(Value::BigInt),
        (FormatCode::Boolean, Value::UInt(u)) => Ok(Value::Bool(u != 0)),
        (_, value) => Ok(value),
    }
}

/// Order-preserving key encoding.
fn encode_key(key: &Value) -> MapResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(24);
    match key {
        Value::Bool(b) => {
            buf.push(KeyTag::Bool as u8);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => {
            buf.push(KeyTag::Int as u8);
            let v = (*i as u64) ^ 0x8000_0000_0000_0000;
            buf.extend_from_slice(&v.to_be_bytes());
        }
        Value::UInt(u) => {
            buf.push(KeyTag::UInt as u8);
            buf.extend_from_slice(&u.to_be_bytes());
        }
        Value::BigInt(i) => {
            buf.push(KeyTag::BigInt as u8);
            buf.extend_from_slice(&encode_bigint(*i));
        }
        Value::Double(d) => {
            buf.push(KeyTag::Double as u8);
            buf.extend_from_slice(&encode_double(*d));
        }
        Value::String(s) => {
            buf.push(KeyTag::String as u8);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Binary(b) => {
            buf.push(KeyTag::Binary as u8);
            buf.extend_from_slice(b);
        }
        other => {
            return Err(MapError::engine(format!(
                "{} values cannot be used as keys",
                other.kind()
            )))
        }
    }
    Ok(buf)
}

fn check_supported(spec: &ConditionSpec) -> MapResult<()> {
    if let Some(index) = &spec.index {
        return Err(MapError::NotSupported {
            operation: format!("{} on {index}", spec.operation),
        });
    }
    if spec.operation == Operation::Index {
        return Err(MapError::NotSupported {
            operation: "INDEX scan without an index".to_string(),
        });
    }
    spec.sub_conditions.iter().try_for_each(check_supported)
}

fn matches_all(conditions: &[ConditionSpec], key: &[u8]) -> MapResult<bool> {
    for condition in conditions {
        if !matches(condition, key)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches(spec: &ConditionSpec, key: &[u8]) -> MapResult<bool> {
    match spec.operation {
        Operation::And => matches_all(&spec.sub_conditions, key),
        Operation::Or => {
            for child in &spec.sub_conditions {
                if matches(child, key)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Operation::Index => Ok(true),
        op => {
            let [value] = spec.query_values.as_slice() else {
                return Err(MapError::engine(format!(
                    "primary key comparison takes one value, got {}",
                    spec.query_values.len()
                )));
            };
            let ordering = key.cmp(encode_key(value)?.as_slice());
            Ok(match op {
                Operation::Lt => ordering.is_lt(),
                Operation::Le => ordering.is_le(),
                Operation::Gt => ordering.is_gt(),
                Operation::Ge => ordering.is_ge(),
                Operation::Eq => ordering.is_eq(),
                _ => ordering.is_ne(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_common::ErrorCode;

    const CONFIG: &str = "key_format=q,value_format=Su,columns=(_id,name,score)";

    fn engine_with_rows() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.create_table("table:t", CONFIG).unwrap();
        let rows = [-5i64, 3, 10, 42]
            .into_iter()
            .map(|k| Row::new(k, vec![format!("n{k}").into(), Value::Double(k as f64 / 2.0)]))
            .collect();
        engine.insert_many("table:t", rows).unwrap();
        engine
    }

    fn leaf(operation: Operation, value: i64) -> ConditionSpec {
        ConditionSpec {
            index: None,
            operation,
            sub_conditions: vec![],
            query_values: vec![Value::Int(value)],
        }
    }

    fn keys(engine: &MemoryEngine, conditions: &[ConditionSpec]) -> Vec<Value> {
        let mut cursor = engine
            .find("table:t", conditions, &ReadRequest::default())
            .unwrap();
        cursor.next_batch(100).unwrap().into_iter().map(|r| r.key).collect()
    }

    #[test]
    fn test_create_is_idempotent_per_config() {
        let engine = MemoryEngine::new();
        engine.create_table("table:t", CONFIG).unwrap();
        engine.create_table("table:t", CONFIG).unwrap();
        let err = engine
            .create_table("table:t", "key_format=S,value_format=S,columns=(_id,x)")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Engine);

        let err = engine
            .create_table("table:bad", "key_format=S,value_format=SS,columns=(_id,x)")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_index_and_colgroup_need_table() {
        let engine = MemoryEngine::new();
        assert!(engine.create_index("index:t:i", "columns=(name)").is_err());
        engine.create_table("table:t", CONFIG).unwrap();
        engine.create_index("index:t:i", "columns=(name)").unwrap();
        engine.create_colgroup("colgroup:t:g", "columns=(name)").unwrap();
        assert_eq!(engine.config_of("index:t:i").as_deref(), Some("columns=(name)"));
        assert_eq!(engine.config_of("table:t").as_deref(), Some(CONFIG));
    }

    #[test]
    fn test_key_order_and_conditions() {
        let engine = engine_with_rows();
        let all: Vec<Value> = [-5i64, 3, 10, 42].into_iter().map(Value::Int).collect();
        assert_eq!(keys(&engine, &[]), all);

        assert_eq!(
            keys(&engine, &[leaf(Operation::Ge, 3), leaf(Operation::Lt, 42)]),
            vec![Value::Int(3), Value::Int(10)]
        );

        let or = ConditionSpec {
            index: None,
            operation: Operation::Or,
            sub_conditions: vec![leaf(Operation::Eq, -5), leaf(Operation::Gt, 10)],
            query_values: vec![],
        };
        assert_eq!(keys(&engine, &[or]), vec![Value::Int(-5), Value::Int(42)]);
        assert_eq!(keys(&engine, &[leaf(Operation::Ne, 3)]).len(), 3);
    }

    #[test]
    fn test_read_formats_and_projection() {
        let engine = engine_with_rows();
        let request = ReadRequest {
            value_format: "dS".to_string(),
            columns: Some("(score,name)".to_string()),
        };
        let mut cursor = engine.find("table:t", &[leaf(Operation::Eq, 3)], &request).unwrap();
        let rows = cursor.next_batch(10).unwrap();
        assert_eq!(rows[0].values, vec![Value::Double(1.5), Value::from("n3")]);

        let request = ReadRequest {
            value_format: "d".to_string(),
            columns: None,
        };
        let err = engine.find("table:t", &[], &request).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Engine);
    }

    #[test]
    fn test_index_conditions_not_supported() {
        let engine = engine_with_rows();
        let mut condition = leaf(Operation::Eq, 3);
        condition.index = Some("index:t:i".to_string());
        let err = engine
            .find("table:t", &[condition], &ReadRequest::default())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotSupported);
    }

    #[test]
    fn test_duplicate_insert_is_atomic() {
        let engine = engine_with_rows();
        let rows = vec![
            Row::new(100i64, vec!["new".into(), Value::Double(0.0)]),
            Row::new(3i64, vec!["dup".into(), Value::Double(0.0)]),
        ];
        assert!(engine.insert_many("table:t", rows).is_err());
        assert_eq!(engine.row_count("table:t"), 4);
    }

    #[test]
    fn test_update_and_delete() {
        let engine = engine_with_rows();
        let updated = engine
            .update_many(
                "table:t",
                &[leaf(Operation::Gt, 3)],
                &[UpdateValue::Set("big".into()), UpdateValue::Keep],
            )
            .unwrap();
        assert_eq!(updated, 2);

        let mut cursor = engine
            .find("table:t", &[leaf(Operation::Eq, 42)], &ReadRequest::default())
            .unwrap();
        let row = cursor.next_batch(1).unwrap().remove(0);
        assert_eq!(row.values[0], Value::from("big"));
        assert!(row.values[1].as_bytes().is_some());

        assert_eq!(engine.delete_many("table:t", &[leaf(Operation::Le, 3)]).unwrap(), 2);
        assert_eq!(engine.row_count("table:t"), 2);
    }

    #[test]
    fn test_cursor_paging_and_close() {
        let engine = engine_with_rows();
        let mut cursor = engine.find("table:t", &[], &ReadRequest::default()).unwrap();
        assert_eq!(engine.open_cursors(), 1);
        assert_eq!(cursor.next_batch(3).unwrap().len(), 3);
        assert_eq!(cursor.next_batch(3).unwrap().len(), 1);
        assert!(cursor.next_batch(3).unwrap().is_empty());
        cursor.reset().unwrap();
        assert_eq!(cursor.next_batch(10).unwrap().len(), 4);
        cursor.close().unwrap();
        cursor.close().unwrap();
        assert_eq!(engine.open_cursors(), 0);
        assert!(cursor.next_batch(1).is_err());
    }
}
