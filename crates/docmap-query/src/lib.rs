//! # docmap-query
//!
//! Translates structured query conditions into the engine's flat
//! condition protocol.
//!
//! A condition tree is built from `AND`/`OR` groups, comparisons of a key
//! against a value tuple, and unfiltered index scans. Each node may target
//! a named index; children inherit their ancestor's target. Compilation
//! checks that groups are non-empty and that every value tuple matches the
//! arity of the key it targets.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod condition;

pub use compiler::{compile_condition, compile_conditions, KeyResolver, ResolvedKey};
pub use condition::{Comparison, ConditionSpec, Operation, QueryCondition};
