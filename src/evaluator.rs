//! Lookup evaluator — executes a compiled program against a JSON value
//!
//! Lookup is pure: the input document is never mutated, and the result is
//! an owned value assembled from clones of the matched sub-values.

use serde_json::Value;

use crate::ast::{Program, Step, StepArgs, StepOp};
use crate::error::EvalError;
use crate::filter::Predicate;

/// Execute `program` against `doc`, returning the matched value.
///
/// The program's steps run left to right, threading a current node that
/// starts at the document root. Any step failure aborts the whole lookup.
pub(crate) fn lookup(program: &Program, doc: &Value) -> Result<Value, EvalError> {
    let mut current = doc.clone();
    for step in &program.steps {
        current = apply_step(&current, doc, step)?;
    }
    Ok(current)
}

fn apply_step(current: &Value, root: &Value, step: &Step) -> Result<Value, EvalError> {
    match step.op {
        StepOp::Key => get_key(current, &step.key),
        StepOp::Idx => {
            let base = descend(current, &step.key)?;
            let StepArgs::Indices(indices) = &step.args else {
                return Err(EvalError::UnsupportedStep);
            };
            select_indices(&base, indices)
        }
        StepOp::Range => {
            let base = descend(current, &step.key)?;
            let StepArgs::Range { from, to } = step.args else {
                return Err(EvalError::UnsupportedStep);
            };
            get_range(&base, from, to)
        }
        StepOp::Filter => {
            let base = descend(current, &step.key)?;
            let StepArgs::Predicate(expr) = &step.args else {
                return Err(EvalError::UnsupportedStep);
            };
            apply_filter(&base, root, expr)
        }
        StepOp::Scan => {
            if current.is_null() {
                return Err(EvalError::NullObject);
            }
            let found = scan_collect(current, &step.key);
            match &step.args {
                StepArgs::None => Ok(Value::Array(found)),
                StepArgs::Range { from, to } => get_range(&Value::Array(found), *from, *to),
                StepArgs::Indices(indices) => {
                    let gathered = Value::Array(found);
                    indices
                        .iter()
                        .map(|&idx| get_idx(&gathered, idx))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)
                }
                StepArgs::Predicate(_) => Err(EvalError::UnsupportedStep),
            }
        }
        StepOp::Root => Err(EvalError::UnsupportedStep),
    }
}

/// Descend by `key` when the step carries one, e.g. `book` in `book[0]`.
fn descend(current: &Value, key: &str) -> Result<Value, EvalError> {
    if key.is_empty() {
        Ok(current.clone())
    } else {
        get_key(current, key)
    }
}

/// Child access.
///
/// On an object the key must exist. On an array the access maps over the
/// elements, silently skipping those where the key is missing, so that
/// `$.items.name` can gather names across a list without failing.
pub(crate) fn get_key(value: &Value, key: &str) -> Result<Value, EvalError> {
    match value {
        Value::Null => Err(EvalError::NullObject),
        Value::Object(map) => map
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::KeyNotFound(key.to_string())),
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                if let Ok(found) = get_key(item, key) {
                    out.push(found);
                }
            }
            Ok(Value::Array(out))
        }
        _ => Err(EvalError::NotAContainer),
    }
}

/// Single-element index access; negative indices count from the end.
pub(crate) fn get_idx(value: &Value, idx: i64) -> Result<Value, EvalError> {
    let Value::Array(items) = value else {
        return Err(EvalError::NotAnArray);
    };
    let position = resolve_idx(items.len(), idx)?;
    Ok(items[position].clone())
}

/// Resolve a signed index against an array length.
pub(crate) fn resolve_idx(len: usize, idx: i64) -> Result<usize, EvalError> {
    let resolved = if idx < 0 { len as i64 + idx } else { idx };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::IndexOutOfRange { len, idx });
    }
    Ok(resolved as usize)
}

fn select_indices(base: &Value, indices: &[i64]) -> Result<Value, EvalError> {
    if indices.len() == 1 {
        get_idx(base, indices[0])
    } else {
        indices
            .iter()
            .map(|&idx| get_idx(base, idx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}

/// Slice an array by a normalized range.
pub(crate) fn get_range(
    value: &Value,
    from: Option<i64>,
    to: Option<i64>,
) -> Result<Value, EvalError> {
    let Value::Array(items) = value else {
        return Err(EvalError::NotAnArray);
    };
    let (start, end) = normalize_range(items.len(), from, to)?;
    Ok(Value::Array(items[start..end].to_vec()))
}

/// Normalize range bounds against an array length.
///
/// Unbounded `from` becomes 0 and unbounded `to` becomes the last index;
/// negative bounds count from the end. The returned pair is
/// inclusive-from, exclusive-to.
pub(crate) fn normalize_range(
    len: usize,
    from: Option<i64>,
    to: Option<i64>,
) -> Result<(usize, usize), EvalError> {
    let l = len as i64;
    let start = match from {
        None => 0,
        Some(f) if f < 0 => l + f,
        Some(f) => f,
    };
    let end = match to {
        None => l,
        Some(t) if t < 0 => l + t + 1,
        Some(t) => t + 1,
    };
    if start < 0 || start >= l {
        return Err(EvalError::RangeFromOutOfRange {
            len,
            from: from.unwrap_or(0),
        });
    }
    if end < 0 || end > l || end < start {
        return Err(EvalError::RangeToOutOfRange {
            len,
            to: to.unwrap_or(l - 1),
        });
    }
    Ok((start as usize, end as usize))
}

fn apply_filter(base: &Value, root: &Value, expr: &str) -> Result<Value, EvalError> {
    let predicate = Predicate::parse(expr)?;
    match base {
        Value::Array(items) => {
            let mut out = Vec::new();
            for item in items {
                if predicate.matches(item, root)? {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(out))
        }
        Value::Object(_) => {
            if predicate.matches(base, root)? {
                Ok(Value::Array(vec![base.clone()]))
            } else {
                Ok(Value::Array(Vec::new()))
            }
        }
        Value::Null => Err(EvalError::NullObject),
        _ => Err(EvalError::NotAContainer),
    }
}

/// Gather every value bound to `key` anywhere in the subtree, preorder.
///
/// A matched value is recorded but not descended into, so `..a` on
/// `{"a": {"a": 1}}` yields the outer binding only.
pub(crate) fn scan_collect(value: &Value, key: &str) -> Vec<Value> {
    let mut found = Vec::new();
    collect_into(value, key, &mut found);
    found
}

fn collect_into(value: &Value, key: &str, found: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    found.push(v.clone());
                } else {
                    collect_into(v, key, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_into(item, key, found);
            }
        }
        _ => {}
    }
}
