//! Query condition trees and the engine's flat condition protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

use docmap_common::Value;

/// Engine operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Every child must match.
    And,
    /// Any child may match.
    Or,
    /// Key less than the values.
    Lt,
    /// Key greater than the values.
    Gt,
    /// Key less than or equal.
    Le,
    /// Key greater than or equal.
    Ge,
    /// Key equal.
    Eq,
    /// Key not equal; the engine expands it into `Gt` or `Lt`.
    Ne,
    /// Unfiltered scan in an index's natural order.
    Index,
}

impl Operation {
    /// Returns the protocol name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Le => "LE",
            Self::Ge => "GE",
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Index => "INDEX",
        }
    }

    /// Returns true for `And` and `Or`.
    #[must_use]
    pub const fn is_group(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leaf comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl From<Comparison> for Operation {
    fn from(op: Comparison) -> Self {
        match op {
            Comparison::Lt => Self::Lt,
            Comparison::Gt => Self::Gt,
            Comparison::Le => Self::Le,
            Comparison::Ge => Self::Ge,
            Comparison::Eq => Self::Eq,
            Comparison::Ne => Self::Ne,
        }
    }
}

/// A query condition as callers write it.
///
/// Each node may name a target index; a node without one targets whatever
/// its nearest ancestor targets, and the primary key at the top.
///
/// # Example
///
/// ```rust
/// use docmap_query::{Comparison, QueryCondition};
///
/// let condition = QueryCondition::and(vec![
///     QueryCondition::compare(Comparison::Ge, vec!["Hek".into(), "Value2".into()]),
///     QueryCondition::compare(Comparison::Lt, vec!["Hem".into(), "".into()]),
/// ])
/// .on("test");
/// assert_eq!(condition.index(), Some("test"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryCondition {
    /// Conjunction.
    And {
        /// Target index.
        index: Option<String>,
        /// Child conditions; must not be empty.
        children: Vec<QueryCondition>,
    },
    /// Disjunction.
    Or {
        /// Target index.
        index: Option<String>,
        /// Child conditions; must not be empty.
        children: Vec<QueryCondition>,
    },
    /// Comparison of the target key against a value tuple.
    Compare {
        /// Target index.
        index: Option<String>,
        /// Operator.
        op: Comparison,
        /// One value per key column of the target.
        values: Vec<Value>,
    },
    /// Unfiltered scan over an index.
    IndexOnly {
        /// The index to scan.
        index: String,
    },
}

impl QueryCondition {
    /// Conjunction of `children`.
    #[must_use]
    pub fn and(children: Vec<QueryCondition>) -> Self {
        Self::And {
            index: None,
            children,
        }
    }

    /// Disjunction of `children`.
    #[must_use]
    pub fn or(children: Vec<QueryCondition>) -> Self {
        Self::Or {
            index: None,
            children,
        }
    }

    /// Comparison against `values`.
    #[must_use]
    pub fn compare(op: Comparison, values: Vec<Value>) -> Self {
        Self::Compare {
            index: None,
            op,
            values,
        }
    }

    /// Equality with a single-column key.
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::compare(Comparison::Eq, vec![value.into()])
    }

    /// Unfiltered scan over `index`.
    pub fn index_only(index: impl Into<String>) -> Self {
        Self::IndexOnly {
            index: index.into(),
        }
    }

    /// Targets the node at `index`.
    #[must_use]
    pub fn on(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        match &mut self {
            Self::And { index, .. } | Self::Or { index, .. } | Self::Compare { index, .. } => {
                *index = Some(target);
            }
            Self::IndexOnly { index } => *index = target,
        }
        self
    }

    /// Returns the explicitly named target index.
    #[must_use]
    pub fn index(&self) -> Option<&str> {
        match self {
            Self::And { index, .. } | Self::Or { index, .. } | Self::Compare { index, .. } => {
                index.as_deref()
            }
            Self::IndexOnly { index } => Some(index),
        }
    }

    /// Returns the operation code this node compiles to.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::And { .. } => Operation::And,
            Self::Or { .. } => Operation::Or,
            Self::Compare { op, .. } => (*op).into(),
            Self::IndexOnly { .. } => Operation::Index,
        }
    }
}

/// One node of the engine's condition protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Index URI, or `None` for the primary key.
    pub index: Option<String>,
    /// Operation code.
    pub operation: Operation,
    /// Children of `And`/`Or` nodes.
    pub sub_conditions: Vec<ConditionSpec>,
    /// Key values of comparison nodes.
    pub query_values: Vec<Value>,
}

impl ConditionSpec {
    /// Returns true for leaf nodes.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !self.operation.is_group()
    }
}

impl fmt::Display for ConditionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if let Some(index) = &self.index {
            write!(f, "@{index}")?;
        }
        if self.operation.is_group() {
            write!(f, "[")?;
            for (i, child) in self.sub_conditions.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child}")?;
            }
            write!(f, "]")
        } else if !self.query_values.is_empty() {
            write!(f, "(")?;
            for (i, value) in self.query_values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{value}")?;
            }
            write!(f, ")")
        } else {
            Ok(())
        }
    }
}
