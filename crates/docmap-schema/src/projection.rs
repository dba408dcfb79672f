//! Projection requests.

use docmap_common::types::ColumnFormat;

use crate::compiler::ColumnSpec;

/// The column subset a read asks for.
///
/// Carries the column specs that drive decoding and the value format the
/// engine must unpack with: read formats win over physical ones, so a
/// sortable double comes back as a double.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    specs: Vec<ColumnSpec>,
    value_format: String,
    columns: Option<String>,
}

impl Projection {
    pub(crate) fn new(specs: Vec<ColumnSpec>, explicit: bool) -> Self {
        let formats: Vec<ColumnFormat> = specs.iter().map(ColumnSpec::effective_format).collect();
        let value_format = formats.iter().map(ToString::to_string).collect();
        let columns = explicit.then(|| {
            let names: Vec<&str> = specs.iter().map(|spec| spec.name.as_str()).collect();
            format!("({})", names.join(","))
        });
        Self {
            specs,
            value_format,
            columns,
        }
    }

    /// Returns the requested specs in tuple order.
    #[must_use]
    pub fn specs(&self) -> &[ColumnSpec] {
        &self.specs
    }

    /// Returns the value format to read with.
    #[must_use]
    pub fn value_format(&self) -> &str {
        &self.value_format
    }

    /// Returns the `(a,b)` column clause of an explicit projection.
    #[must_use]
    pub fn columns(&self) -> Option<&str> {
        self.columns.as_deref()
    }

    /// Returns true if the projection includes the key column.
    #[must_use]
    pub fn includes_key(&self) -> bool {
        self.specs.iter().any(ColumnSpec::is_key)
    }
}
