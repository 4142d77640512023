//! # maskpath
//!
//! A JSONPath query engine that compiles a path expression into a
//! reusable program and executes it against `serde_json` values in one of
//! three modes:
//!
//! - **lookup**: gather the matching sub-values
//! - **delete**: remove the matching fields in place (column filtering)
//! - **redact**: rewrite matching string fields in place under a named
//!   masking rule (phone, name, id card, car plate)
//!
//! ## Path syntax
//!
//! | Form | Meaning |
//! |------|---------|
//! | `$` | document root (`@` is accepted as an alias) |
//! | `.name` / `['name']` | child access |
//! | `[0]`, `[-1]`, `[0, 2]` | signed index selection |
//! | `[from:to]`, `[*]` | range selection, both bounds inclusive |
//! | `..name` | recursive descent, optionally windowed: `..name[0:2]` |
//! | `[?(expr)]` | predicate filter; `@.` is the candidate, `$.` the root |
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//!
//! let doc = json!({"store": {"book": [
//!     {"title": "A", "price": 8},
//!     {"title": "B", "price": 12}
//! ]}});
//! let cheap = maskpath::lookup(&doc, "$.store.book[?(@.price < 10)].title")?;
//! assert_eq!(cheap, json!(["A"]));
//!
//! let mut user = json!({"u": {"phone": "13800001111"}});
//! maskpath::redact_matching(&mut user, "$.u.phone", "phone")?;
//! assert_eq!(user, json!({"u": {"phone": "138****1111"}}));
//! # Ok::<(), maskpath::Error>(())
//! ```

mod ast;
mod compiler;
mod error;
mod evaluator;
mod filter;
mod mask;
mod mutator;
mod tokenizer;

pub use ast::{Program, Step, StepArgs, StepOp};
pub use compiler::compile;
pub use error::{CompileError, Error, EvalError, FilterError, MaskError};
pub use mask::{registry, Redactor, RedactorRegistry};

use serde_json::Value;

impl Program {
    /// Execute this program against `doc`, returning the matched value.
    ///
    /// Lookup never mutates the document.
    pub fn lookup(&self, doc: &Value) -> Result<Value, EvalError> {
        evaluator::lookup(self, doc)
    }

    /// Delete every field this program matches, mutating `doc` in place.
    pub fn delete(&self, doc: &mut Value) -> Result<(), EvalError> {
        mutator::delete(self, doc)
    }

    /// Redact every field this program matches under the masking rule
    /// named `rule`, mutating `doc` in place.
    pub fn redact(&self, doc: &mut Value, rule: &str) -> Result<(), EvalError> {
        mutator::redact(self, doc, rule)
    }
}

/// Compile `path` and look it up against `doc` in one call.
pub fn lookup(doc: &Value, path: &str) -> Result<Value, Error> {
    Ok(compile(path)?.lookup(doc)?)
}

/// Compile `path` and delete every match from `doc` in one call.
pub fn delete_matching(doc: &mut Value, path: &str) -> Result<(), Error> {
    Ok(compile(path)?.delete(doc)?)
}

/// Compile `path` and redact every match in `doc` under `rule` in one
/// call.
pub fn redact_matching(doc: &mut Value, path: &str, rule: &str) -> Result<(), Error> {
    Ok(compile(path)?.redact(doc, rule)?)
}
