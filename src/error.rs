//! Error types for path compilation, evaluation, filtering, and masking

use thiserror::Error;

/// Errors raised while compiling a path expression into a [`Program`].
///
/// All compile errors are fatal and non-retryable: the path string itself
/// is malformed.
///
/// [`Program`]: crate::Program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The path does not begin with a `$` or `@` marker
    #[error("path must start with $ or @")]
    BadStart,

    /// A bracket expression is too short to hold any selector
    #[error("bracket body too short: {0}")]
    BracketTooShort(String),

    /// A range selector contained more than one colon
    #[error("range must have exactly one colon: {0}")]
    BadRangeColon(String),

    /// An index selector contained a piece that is not a signed integer
    #[error("bad integer in index list: {0}")]
    BadInteger(String),

    /// A bracket body contained `?` without the `?( ... )` shape
    #[error("invalid filter expression: {0}")]
    BadFilterShape(String),

    /// `..` appeared without a field name to scan for
    #[error("recursive descent must be followed by a field name")]
    DanglingRecursion,
}

/// Errors raised while executing a compiled program against a JSON value.
///
/// Evaluation aborts on the first error; no partial result is returned and
/// no partially applied mutation is rolled back.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Attribute access on a JSON null
    #[error("get attribute from null object")]
    NullObject,

    /// The named key is absent from the current object
    #[error("key error: {0} not found in object")]
    KeyNotFound(String),

    /// An index selector resolved outside the array bounds
    #[error("index out of range: len: {len}, idx: {idx}")]
    IndexOutOfRange {
        /// Array length at the failing step
        len: usize,
        /// Offending index as written in the path
        idx: i64,
    },

    /// The lower range bound resolved outside the array bounds
    #[error("index [from] out of range: len: {len}, from: {from}")]
    RangeFromOutOfRange {
        /// Array length at the failing step
        len: usize,
        /// Offending lower bound
        from: i64,
    },

    /// The upper range bound resolved outside the array bounds
    #[error("index [to] out of range: len: {len}, to: {to}")]
    RangeToOutOfRange {
        /// Array length at the failing step
        len: usize,
        /// Offending upper bound
        to: i64,
    },

    /// An array operation was applied to a non-array value
    #[error("object is not an array")]
    NotAnArray,

    /// An object operation was applied to a non-object value
    #[error("object is not an object")]
    NotAnObject,

    /// A traversal step was applied to a scalar
    #[error("object is not an object or array")]
    NotAContainer,

    /// A step kind that cannot execute in this position (e.g. a stray root)
    #[error("step not supported in this context")]
    UnsupportedStep,

    /// A terminal index or range mutation without an owning field name
    #[error("index operation requires a field name")]
    KeyRequired,

    /// Redaction cannot target a list slice
    #[error("redaction not supported on list slicing")]
    RedactOnSlice,

    /// Redaction cannot target a filter result
    #[error("redaction not supported on filter")]
    RedactOnFilter,

    /// No masking rule is registered under the requested name
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    /// A recursive-scan window bound was negative
    #[error("scan window bound must be non-negative, got {0}")]
    ScanWindowNegative(i64),

    /// A filter predicate failed to parse or evaluate
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A masking rule rejected its target value
    #[error(transparent)]
    Mask(#[from] MaskError),
}

/// Errors raised by the filter predicate parser and evaluator.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The predicate body was empty
    #[error("empty filter predicate")]
    EmptyPredicate,

    /// The predicate body split into more than three terms
    #[error("filter predicate has too many terms: {0}")]
    TooManyTerms(String),

    /// The operator token is not part of the comparison grammar
    #[error("bad comparison op: {0}")]
    BadComparisonOp(String),

    /// A path inside a filter used a step kind the filter subset forbids
    #[error("expression not supported in filter")]
    UnsupportedInFilter,

    /// A path inside a filter used a multi-element index list
    #[error("multiple index unsupported in filter")]
    MultipleIndex,

    /// A `=~` right operand was not a `/pattern/` literal
    #[error("regex literal must be in /pattern/ form: {0}")]
    RegexShape(String),

    /// The regex pattern failed to compile
    #[error("invalid regex: {0}")]
    RegexCompile(#[from] regex::Error),

    /// A `=~` left operand resolved to a non-string
    #[error("only strings match regex")]
    RegexOnNonString,

    /// An `in`/`noin` right operand was not a `{{v1, v2, ...}}` set
    #[error("membership operand must look like {{v1, v2, ...}}: {0}")]
    BadMembershipOperand(String),

    /// A path inside a filter failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Errors raised by masking rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    /// The mask window starts beyond the end of the value
    #[error("mask out of range: start {start}, value length {len}")]
    OutOfRange {
        /// First character index to overwrite
        start: usize,
        /// Value length in characters
        len: usize,
    },

    /// The value length matches no known phone format
    #[error("bad phone: unsupported length {0}")]
    BadPhone(usize),

    /// The value matches no known plate format
    #[error("bad plate: value does not match any plate format")]
    BadPlate,

    /// The value under the target key is not a string
    #[error("cannot mask non-string value at key {0}")]
    NotAString(String),
}

/// Top-level error for the one-shot compile-and-execute entry points.
#[derive(Debug, Error)]
pub enum Error {
    /// The path failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The compiled program failed against the document
    #[error(transparent)]
    Eval(#[from] EvalError),
}
