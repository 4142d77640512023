//! Compiled path representation: steps, step arguments, and programs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operator kind of a single compiled step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOp {
    /// The document root marker (only valid inside filter sub-paths)
    Root,
    /// Direct child access by field name
    Key,
    /// Index selection: `[0]`, `[-1]`, `[0, 2]`
    Idx,
    /// Range selection: `[from:to]`, `[*]`
    Range,
    /// Predicate filter: `[?(expr)]`
    Filter,
    /// Recursive descent: `..name`, optionally windowed
    Scan,
}

/// Operator-specific arguments attached to a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepArgs {
    /// No arguments (`root`, `key`, unwindowed `scan`)
    None,
    /// Ordered signed indices; negative values count from the end
    Indices(Vec<i64>),
    /// Range bounds; `None` means unbounded on that side
    Range {
        /// Lower bound, inclusive
        from: Option<i64>,
        /// Upper bound, inclusive before normalization
        to: Option<i64>,
    },
    /// Raw filter predicate body, parsed lazily at evaluation
    Predicate(String),
}

/// A single operation in a compiled path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Operator kind
    pub op: StepOp,
    /// Field name the operator is attached to; empty when none
    pub key: String,
    /// Operator-specific arguments
    pub args: StepArgs,
}

impl Step {
    /// Create a step without a key or arguments
    pub(crate) fn bare(op: StepOp) -> Self {
        Self {
            op,
            key: String::new(),
            args: StepArgs::None,
        }
    }

    /// Create a child-access step for `key`
    pub(crate) fn key(key: impl Into<String>) -> Self {
        Self {
            op: StepOp::Key,
            key: key.into(),
            args: StepArgs::None,
        }
    }
}

/// A compiled path: the original source string plus its ordered steps.
///
/// Programs are immutable after compilation and cheap to clone; a single
/// program may be executed any number of times, against any number of
/// documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// The path string this program was compiled from
    pub path: String,
    /// Ordered steps; never contains a leading root marker
    pub steps: Vec<Step>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compiled path: {}", self.path)
    }
}
