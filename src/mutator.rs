//! Mutation engine — delete ("column filtering") and redact ("masking")
//!
//! Compilation is shared with lookup; only the final step changes meaning.
//! Non-terminal steps narrow the current node exactly as lookup does, but
//! instead of cloning sub-values they track addresses into the document,
//! so the terminal step can mutate the owning containers in place.

use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{Program, Step, StepArgs, StepOp};
use crate::error::EvalError;
use crate::evaluator::{normalize_range, resolve_idx};
use crate::filter::Predicate;
use crate::mask::registry;

/// Mutation mode for the terminal step.
#[derive(Debug, Clone, Copy)]
enum Mode<'a> {
    Delete,
    Redact(&'a str),
}

impl Mode<'_> {
    fn name(&self) -> &'static str {
        match self {
            Mode::Delete => "delete",
            Mode::Redact(_) => "redact",
        }
    }
}

/// Delete every field matched by `program`, in place.
pub(crate) fn delete(program: &Program, doc: &mut Value) -> Result<(), EvalError> {
    operate(program, doc, Mode::Delete)
}

/// Redact every field matched by `program` under the named masking rule,
/// in place.
pub(crate) fn redact(program: &Program, doc: &mut Value, rule: &str) -> Result<(), EvalError> {
    operate(program, doc, Mode::Redact(rule))
}

fn operate(program: &Program, doc: &mut Value, mode: Mode<'_>) -> Result<(), EvalError> {
    debug!(path = %program.path, mode = mode.name(), "applying path mutation");
    let Some((last, narrowing)) = program.steps.split_last() else {
        // the bare root path matches the whole document; nothing to do
        return Ok(());
    };

    // `$`-references in predicates see the document as it was at entry
    let snapshot = doc.clone();
    let cursor = narrow(doc, &snapshot, narrowing)?;

    if last.op == StepOp::Scan {
        return terminal_scan(doc, &cursor, last, mode);
    }

    let lenient = matches!(cursor, Cursor::Gather(_));
    for address in cursor.addresses() {
        // an earlier terminal application may have detached this subtree
        let Some(node) = resolve_mut(doc, &address) else {
            continue;
        };
        match last.op {
            StepOp::Key => terminal_key(node, &last.key, mode, lenient)?,
            StepOp::Idx => {
                let StepArgs::Indices(indices) = &last.args else {
                    return Err(EvalError::UnsupportedStep);
                };
                terminal_idx(node, &last.key, indices, mode)?;
            }
            StepOp::Range => {
                let StepArgs::Range { from, to } = last.args else {
                    return Err(EvalError::UnsupportedStep);
                };
                terminal_range(node, &last.key, from, to, mode)?;
            }
            StepOp::Filter => {
                let StepArgs::Predicate(expr) = &last.args else {
                    return Err(EvalError::UnsupportedStep);
                };
                terminal_filter(node, &snapshot, &last.key, expr, mode)?;
            }
            StepOp::Scan | StepOp::Root => return Err(EvalError::UnsupportedStep),
        }
    }
    Ok(())
}

// ─── Address-based narrowing ────────────────────────────────────────────

/// One hop on the way from the document root to a target node.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Access {
    Key(String),
    Index(usize),
}

type Address = Vec<Access>;

/// The set of nodes the non-terminal steps have narrowed to.
///
/// `One` is a single tree node; `Gather` is an ordered selection (the
/// in-place analogue of the synthetic sequences lookup fabricates for
/// key-over-array access, multi-index selection, ranges, and filters).
/// Index and range steps applied to a `Gather` select within the
/// selection, exactly as lookup indexes into its synthetic sequence.
#[derive(Debug)]
enum Cursor {
    One(Address),
    Gather(Vec<Address>),
}

impl Cursor {
    fn addresses(&self) -> Vec<Address> {
        match self {
            Cursor::One(address) => vec![address.clone()],
            Cursor::Gather(addresses) => addresses.clone(),
        }
    }
}

fn resolve<'a>(doc: &'a Value, address: &Address) -> Option<&'a Value> {
    let mut current = doc;
    for access in address {
        current = match (access, current) {
            (Access::Key(key), Value::Object(map)) => map.get(key)?,
            (Access::Index(idx), Value::Array(items)) => items.get(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

fn resolve_mut<'a>(doc: &'a mut Value, address: &Address) -> Option<&'a mut Value> {
    let mut current = doc;
    for access in address {
        current = match (access, current) {
            (Access::Key(key), Value::Object(map)) => map.get_mut(key)?,
            (Access::Index(idx), Value::Array(items)) => items.get_mut(*idx)?,
            _ => return None,
        };
    }
    Some(current)
}

fn narrow(doc: &Value, root: &Value, steps: &[Step]) -> Result<Cursor, EvalError> {
    let mut cursor = Cursor::One(Vec::new());
    for step in steps {
        cursor = narrow_step(doc, root, cursor, step)?;
    }
    Ok(cursor)
}

fn narrow_step(
    doc: &Value,
    root: &Value,
    cursor: Cursor,
    step: &Step,
) -> Result<Cursor, EvalError> {
    match step.op {
        StepOp::Key => narrow_key(doc, cursor, &step.key),
        StepOp::Idx => {
            let cursor = descend(doc, cursor, &step.key)?;
            let StepArgs::Indices(indices) = &step.args else {
                return Err(EvalError::UnsupportedStep);
            };
            narrow_indices(doc, cursor, indices)
        }
        StepOp::Range => {
            let cursor = descend(doc, cursor, &step.key)?;
            let StepArgs::Range { from, to } = step.args else {
                return Err(EvalError::UnsupportedStep);
            };
            narrow_range(doc, cursor, from, to)
        }
        StepOp::Filter => {
            let cursor = descend(doc, cursor, &step.key)?;
            let StepArgs::Predicate(expr) = &step.args else {
                return Err(EvalError::UnsupportedStep);
            };
            narrow_filter(doc, root, cursor, expr)
        }
        StepOp::Scan => narrow_scan(doc, cursor, step),
        StepOp::Root => Err(EvalError::UnsupportedStep),
    }
}

fn descend(doc: &Value, cursor: Cursor, key: &str) -> Result<Cursor, EvalError> {
    if key.is_empty() {
        Ok(cursor)
    } else {
        narrow_key(doc, cursor, key)
    }
}

fn narrow_key(doc: &Value, cursor: Cursor, key: &str) -> Result<Cursor, EvalError> {
    match cursor {
        Cursor::One(address) => {
            let node = resolve(doc, &address).unwrap_or(&Value::Null);
            match node {
                Value::Null => Err(EvalError::NullObject),
                Value::Object(map) => {
                    if !map.contains_key(key) {
                        return Err(EvalError::KeyNotFound(key.to_string()));
                    }
                    let mut address = address;
                    address.push(Access::Key(key.to_string()));
                    Ok(Cursor::One(address))
                }
                Value::Array(_) => {
                    let mut gathered = Vec::new();
                    gather_key(doc, &address, key, &mut gathered);
                    Ok(Cursor::Gather(gathered))
                }
                _ => Err(EvalError::NotAContainer),
            }
        }
        Cursor::Gather(addresses) => {
            let mut gathered = Vec::new();
            for address in addresses {
                gather_key(doc, &address, key, &mut gathered);
            }
            Ok(Cursor::Gather(gathered))
        }
    }
}

/// Collect addresses of `key` bindings under one address, mirroring the
/// silent-skip semantics of key-over-array lookup. Nested arrays are
/// searched through; elements without the key are skipped.
fn gather_key(doc: &Value, address: &Address, key: &str, out: &mut Vec<Address>) {
    match resolve(doc, address) {
        Some(Value::Object(map)) => {
            if map.contains_key(key) {
                let mut found = address.clone();
                found.push(Access::Key(key.to_string()));
                out.push(found);
            }
        }
        Some(Value::Array(items)) => {
            for idx in 0..items.len() {
                let mut element = address.clone();
                element.push(Access::Index(idx));
                gather_key(doc, &element, key, out);
            }
        }
        _ => {}
    }
}

fn narrow_indices(doc: &Value, cursor: Cursor, indices: &[i64]) -> Result<Cursor, EvalError> {
    let select = |len: usize, extend: &dyn Fn(usize) -> Address| -> Result<Cursor, EvalError> {
        if indices.len() == 1 {
            Ok(Cursor::One(extend(resolve_idx(len, indices[0])?)))
        } else {
            let mut selected = Vec::new();
            for &idx in indices {
                selected.push(extend(resolve_idx(len, idx)?));
            }
            Ok(Cursor::Gather(selected))
        }
    };
    match cursor {
        Cursor::One(address) => {
            let Some(Value::Array(items)) = resolve(doc, &address) else {
                return Err(EvalError::NotAnArray);
            };
            select(items.len(), &|position| {
                let mut target = address.clone();
                target.push(Access::Index(position));
                target
            })
        }
        Cursor::Gather(addresses) => select(addresses.len(), &|position| {
            addresses[position].clone()
        }),
    }
}

fn narrow_range(
    doc: &Value,
    cursor: Cursor,
    from: Option<i64>,
    to: Option<i64>,
) -> Result<Cursor, EvalError> {
    match cursor {
        Cursor::One(address) => {
            let Some(Value::Array(items)) = resolve(doc, &address) else {
                return Err(EvalError::NotAnArray);
            };
            let (start, end) = normalize_range(items.len(), from, to)?;
            let selected = (start..end)
                .map(|position| {
                    let mut target = address.clone();
                    target.push(Access::Index(position));
                    target
                })
                .collect();
            Ok(Cursor::Gather(selected))
        }
        Cursor::Gather(addresses) => {
            let (start, end) = normalize_range(addresses.len(), from, to)?;
            Ok(Cursor::Gather(addresses[start..end].to_vec()))
        }
    }
}

fn narrow_filter(
    doc: &Value,
    root: &Value,
    cursor: Cursor,
    expr: &str,
) -> Result<Cursor, EvalError> {
    let predicate = Predicate::parse(expr)?;
    let keep = |address: &Address| -> Result<bool, EvalError> {
        match resolve(doc, address) {
            Some(node) => Ok(predicate.matches(node, root)?),
            None => Ok(false),
        }
    };
    match cursor {
        Cursor::One(address) => {
            let node = resolve(doc, &address).unwrap_or(&Value::Null);
            match node {
                Value::Array(items) => {
                    let mut selected = Vec::new();
                    for idx in 0..items.len() {
                        let mut element = address.clone();
                        element.push(Access::Index(idx));
                        if keep(&element)? {
                            selected.push(element);
                        }
                    }
                    Ok(Cursor::Gather(selected))
                }
                Value::Object(_) => {
                    if keep(&address)? {
                        Ok(Cursor::Gather(vec![address]))
                    } else {
                        Ok(Cursor::Gather(Vec::new()))
                    }
                }
                Value::Null => Err(EvalError::NullObject),
                _ => Err(EvalError::NotAContainer),
            }
        }
        Cursor::Gather(addresses) => {
            let mut selected = Vec::new();
            for address in addresses {
                if keep(&address)? {
                    selected.push(address);
                }
            }
            Ok(Cursor::Gather(selected))
        }
    }
}

/// Non-terminal recursive descent: gather occurrence addresses in document
/// order, then apply the scan's index window (normalized like lookup).
fn narrow_scan(doc: &Value, cursor: Cursor, step: &Step) -> Result<Cursor, EvalError> {
    let mut found = Vec::new();
    for address in cursor.addresses() {
        if matches!(resolve(doc, &address), Some(Value::Null)) {
            return Err(EvalError::NullObject);
        }
        collect_occurrences(doc, &address, &step.key, &mut found);
    }
    match &step.args {
        StepArgs::None => Ok(Cursor::Gather(found)),
        StepArgs::Range { from, to } => {
            let (start, end) = normalize_range(found.len(), *from, *to)?;
            Ok(Cursor::Gather(found[start..end].to_vec()))
        }
        StepArgs::Indices(indices) => {
            let mut selected = Vec::new();
            for &idx in indices {
                selected.push(found[resolve_idx(found.len(), idx)?].clone());
            }
            Ok(Cursor::Gather(selected))
        }
        StepArgs::Predicate(_) => Err(EvalError::UnsupportedStep),
    }
}

/// Preorder walk collecting addresses of `key` bindings; matched values
/// are not descended into.
fn collect_occurrences(doc: &Value, address: &Address, key: &str, out: &mut Vec<Address>) {
    match resolve(doc, address) {
        Some(Value::Object(map)) => {
            for k in map.keys() {
                let mut child = address.clone();
                child.push(Access::Key(k.clone()));
                if k == key {
                    out.push(child);
                } else {
                    collect_occurrences(doc, &child, key, out);
                }
            }
        }
        Some(Value::Array(items)) => {
            for idx in 0..items.len() {
                let mut child = address.clone();
                child.push(Access::Index(idx));
                collect_occurrences(doc, &child, key, out);
            }
        }
        _ => {}
    }
}

// ─── Terminal semantics ─────────────────────────────────────────────────

/// Terminal child access: remove or redact the field on an object, or map
/// the operation across a sequence. Inside a sequence (`lenient`), absent
/// keys are skipped; everything else still aborts.
fn terminal_key(
    node: &mut Value,
    key: &str,
    mode: Mode<'_>,
    lenient: bool,
) -> Result<(), EvalError> {
    match node {
        Value::Null => Err(EvalError::NullObject),
        Value::Object(map) => {
            if !map.contains_key(key) {
                if lenient {
                    return Ok(());
                }
                return Err(EvalError::KeyNotFound(key.to_string()));
            }
            match mode {
                Mode::Delete => {
                    map.shift_remove(key);
                    Ok(())
                }
                Mode::Redact(rule) => apply_rule(map, key, rule),
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                terminal_key(item, key, mode, true)?;
            }
            Ok(())
        }
        _ => Err(EvalError::NotAnObject),
    }
}

/// Terminal index selection: rebuild the owning sequence without the
/// listed positions. Negative entries match nothing. Redaction through a
/// slice has no single target and is rejected.
fn terminal_idx(
    node: &mut Value,
    key: &str,
    indices: &[i64],
    mode: Mode<'_>,
) -> Result<(), EvalError> {
    if matches!(mode, Mode::Redact(_)) {
        return Err(EvalError::RedactOnSlice);
    }
    let items = owned_array(node, key)?;
    let old = std::mem::take(items);
    *items = old
        .into_iter()
        .enumerate()
        .filter(|(position, _)| !indices.contains(&(*position as i64)))
        .map(|(_, item)| item)
        .collect();
    Ok(())
}

/// Terminal range: expand to the dense index list and defer to
/// [`terminal_idx`].
fn terminal_range(
    node: &mut Value,
    key: &str,
    from: Option<i64>,
    to: Option<i64>,
    mode: Mode<'_>,
) -> Result<(), EvalError> {
    if matches!(mode, Mode::Redact(_)) {
        return Err(EvalError::RedactOnSlice);
    }
    let len = owned_array(node, key)?.len();
    let (start, end) = normalize_range(len, from, to)?;
    let dense: Vec<i64> = (start..end).map(|position| position as i64).collect();
    terminal_idx(node, key, &dense, mode)
}

/// Locate the sequence owned by `key` on an object node.
fn owned_array<'a>(node: &'a mut Value, key: &str) -> Result<&'a mut Vec<Value>, EvalError> {
    if key.is_empty() {
        return Err(EvalError::KeyRequired);
    }
    let Value::Object(map) = node else {
        return Err(EvalError::NotAnObject);
    };
    let slot = map
        .get_mut(key)
        .ok_or_else(|| EvalError::KeyNotFound(key.to_string()))?;
    match slot {
        Value::Array(items) => Ok(items),
        _ => Err(EvalError::NotAnArray),
    }
}

/// Terminal filter: keep the elements that fail the predicate, or drop
/// the owning key when a single matching mapping was filtered.
fn terminal_filter(
    node: &mut Value,
    root: &Value,
    key: &str,
    expr: &str,
    mode: Mode<'_>,
) -> Result<(), EvalError> {
    if matches!(mode, Mode::Redact(_)) {
        return Err(EvalError::RedactOnFilter);
    }
    if key.is_empty() {
        return Err(EvalError::KeyRequired);
    }
    let Value::Object(map) = node else {
        return Err(EvalError::NotAnObject);
    };
    let target = map
        .get(key)
        .ok_or_else(|| EvalError::KeyNotFound(key.to_string()))?;

    let predicate = Predicate::parse(expr)?;
    match target {
        Value::Array(items) => {
            let mut kept = Vec::new();
            for item in items {
                if !predicate.matches(item, root)? {
                    kept.push(item.clone());
                }
            }
            map.insert(key.to_string(), Value::Array(kept));
            Ok(())
        }
        Value::Object(_) => {
            if predicate.matches(target, root)? {
                map.shift_remove(key);
            }
            Ok(())
        }
        _ => Err(EvalError::NotAContainer),
    }
}

/// Terminal recursive descent with an occurrence window.
///
/// Occurrences are counted in document order with a call-local counter.
/// Range windows use their raw bounds, both inclusive; index windows run
/// one walk per listed position, each with a fresh counter.
fn terminal_scan(
    doc: &mut Value,
    cursor: &Cursor,
    step: &Step,
    mode: Mode<'_>,
) -> Result<(), EvalError> {
    let bases = cursor.addresses();
    let window = match &step.args {
        StepArgs::None => vec![(0, None)],
        StepArgs::Range { from, to } => {
            let left = window_bound(from.unwrap_or(0))?;
            let right = match to {
                None => None,
                Some(t) => Some(window_bound(*t)?),
            };
            vec![(left, right)]
        }
        StepArgs::Indices(indices) => {
            let mut windows = Vec::new();
            for &idx in indices {
                let position = window_bound(idx)?;
                windows.push((position, Some(position)));
            }
            windows
        }
        StepArgs::Predicate(_) => return Err(EvalError::UnsupportedStep),
    };

    for (left, right) in window {
        let mut counter = 0usize;
        for base in &bases {
            let Some(node) = resolve_mut(doc, base) else {
                continue;
            };
            if node.is_null() {
                return Err(EvalError::NullObject);
            }
            scan_apply(node, &step.key, left, right, &mut counter, mode)?;
        }
    }
    Ok(())
}

fn window_bound(bound: i64) -> Result<usize, EvalError> {
    if bound < 0 {
        return Err(EvalError::ScanWindowNegative(bound));
    }
    Ok(bound as usize)
}

/// One windowed walk. Occurrences before the window only advance the
/// counter; occurrences past the window end the walk early.
fn scan_apply(
    node: &mut Value,
    key: &str,
    left: usize,
    right: Option<usize>,
    counter: &mut usize,
    mode: Mode<'_>,
) -> Result<(), EvalError> {
    if right.is_some_and(|r| *counter > r) {
        return Ok(());
    }
    match node {
        Value::Object(map) => {
            let fields: Vec<String> = map.keys().cloned().collect();
            for field in fields {
                if field == key {
                    if right.is_some_and(|r| *counter > r) {
                        return Ok(());
                    }
                    let occurrence = *counter;
                    *counter += 1;
                    if occurrence < left {
                        continue;
                    }
                    match mode {
                        Mode::Delete => {
                            map.shift_remove(&field);
                        }
                        Mode::Redact(rule) => apply_rule(map, &field, rule)?,
                    }
                } else if let Some(child) = map.get_mut(&field) {
                    scan_apply(child, key, left, right, counter, mode)?;
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                scan_apply(item, key, left, right, counter, mode)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Look up the masking rule and invoke it on the owning object.
fn apply_rule(map: &mut Map<String, Value>, key: &str, rule: &str) -> Result<(), EvalError> {
    let Some(redactor) = registry().get(rule) else {
        return Err(EvalError::RuleNotFound(rule.to_string()));
    };
    redactor(map, key)?;
    Ok(())
}
