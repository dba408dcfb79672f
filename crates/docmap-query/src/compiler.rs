//! Query condition compiler.
//!
//! Structural translation only: validates group sizes and key arities,
//! resolves index names and inherits targets downward. Nothing is
//! evaluated here.

use tracing::debug;

use docmap_common::{MapError, MapResult};

use crate::condition::{ConditionSpec, Operation, QueryCondition};

/// A resolved query target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// Index URI, or `None` for the primary key.
    pub uri: Option<String>,
    /// Number of key columns a comparison must supply.
    pub arity: usize,
}

/// Resolves index names to their URIs and key arities.
pub trait KeyResolver {
    /// Resolves `index`, or the primary key when `None`.
    ///
    /// Unknown names fail with `UnknownColumn`.
    fn resolve(&self, index: Option<&str>) -> MapResult<ResolvedKey>;
}

/// Compiles a top-level condition list.
///
/// The list is an implicit conjunction: the engine ANDs its entries. An
/// empty list compiles to an empty list, which scans the whole table.
///
/// # Example
///
/// ```rust
/// use docmap_common::MapResult;
/// use docmap_query::{compile_conditions, KeyResolver, Operation, QueryCondition, ResolvedKey};
///
/// struct PrimaryOnly;
///
/// impl KeyResolver for PrimaryOnly {
///     fn resolve(&self, _index: Option<&str>) -> MapResult<ResolvedKey> {
///         Ok(ResolvedKey { uri: None, arity: 1 })
///     }
/// }
///
/// let specs = compile_conditions(&[QueryCondition::equals("abc")], &PrimaryOnly).unwrap();
/// assert_eq!(specs[0].operation, Operation::Eq);
/// assert!(compile_conditions(&[], &PrimaryOnly).unwrap().is_empty());
/// ```
pub fn compile_conditions<R: KeyResolver + ?Sized>(
    conditions: &[QueryCondition],
    resolver: &R,
) -> MapResult<Vec<ConditionSpec>> {
    let specs = conditions
        .iter()
        .map(|condition| compile_condition(condition, resolver))
        .collect::<MapResult<Vec<_>>>()?;
    if !specs.is_empty() {
        debug!(
            conditions = specs.len(),
            first = %specs[0],
            "compiled query conditions"
        );
    }
    Ok(specs)
}

/// Compiles one condition tree.
pub fn compile_condition<R: KeyResolver + ?Sized>(
    condition: &QueryCondition,
    resolver: &R,
) -> MapResult<ConditionSpec> {
    compile_node(condition, None, resolver)
}

fn compile_node<R: KeyResolver + ?Sized>(
    condition: &QueryCondition,
    inherited: Option<&str>,
    resolver: &R,
) -> MapResult<ConditionSpec> {
    let target = condition.index().or(inherited);
    let operation = condition.operation();

    match condition {
        QueryCondition::And { children, .. } | QueryCondition::Or { children, .. } => {
            if children.is_empty() {
                return Err(MapError::EmptyConditionGroup {
                    operation: operation.to_string(),
                });
            }
            let resolved = resolver.resolve(target)?;
            let sub_conditions = children
                .iter()
                .map(|child| compile_node(child, target, resolver))
                .collect::<MapResult<Vec<_>>>()?;
            Ok(ConditionSpec {
                index: resolved.uri,
                operation,
                sub_conditions,
                query_values: Vec::new(),
            })
        }
        QueryCondition::Compare { values, .. } => {
            let resolved = resolver.resolve(target)?;
            if values.len() != resolved.arity {
                return Err(MapError::ArityMismatch {
                    target: resolved
                        .uri
                        .unwrap_or_else(|| "primary key".to_string()),
                    expected: resolved.arity,
                    actual: values.len(),
                });
            }
            Ok(ConditionSpec {
                index: resolved.uri,
                operation,
                sub_conditions: Vec::new(),
                query_values: values.clone(),
            })
        }
        QueryCondition::IndexOnly { index } => {
            let resolved = resolver.resolve(Some(index))?;
            if resolved.uri.is_none() {
                return Err(MapError::unknown_column(index.clone()));
            }
            Ok(ConditionSpec {
                index: resolved.uri,
                operation: Operation::Index,
                sub_conditions: Vec::new(),
                query_values: Vec::new(),
            })
        }
    }
}
