//! Filter predicates — the `?( ... )` expression language
//!
//! A predicate body is `lp`, or `lp op rp`, split on whitespace with
//! single-quoted substrings kept whole. Operands starting with `@.` are
//! paths resolved against the candidate element, operands starting with
//! `$.` are resolved against the document root, and anything else is a
//! literal string.

use regex::Regex;
use serde_json::Value;

use crate::ast::{StepArgs, StepOp};
use crate::compiler::parse_token;
use crate::error::FilterError;
use crate::evaluator::{get_idx, get_key};
use crate::tokenizer::tokenize;

/// Comparison operator inside a filter predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Exists,
    Eq,
    Ne,
    Lt,
    Le,
    Ge,
    Gt,
    Match,
    In,
    NotIn,
}

/// A parsed filter predicate, reusable across candidate elements.
#[derive(Debug)]
pub(crate) struct Predicate {
    lp: String,
    op: FilterOp,
    rp: String,
    /// Compiled once at parse time for `=~` predicates
    regex: Option<Regex>,
}

impl Predicate {
    /// Parse a predicate body into its three stages.
    pub(crate) fn parse(expr: &str) -> Result<Self, FilterError> {
        let terms = split_terms(expr)?;
        let (lp, op, rp) = match terms.len() {
            0 => return Err(FilterError::EmptyPredicate),
            1 => (terms[0].clone(), FilterOp::Exists, String::new()),
            _ => {
                let op = parse_op(&terms[1])?;
                let rp = terms.get(2).cloned().unwrap_or_default();
                (terms[0].clone(), op, rp)
            }
        };

        let regex = if op == FilterOp::Match {
            Some(compile_regex_literal(&rp)?)
        } else {
            None
        };

        Ok(Self { lp, op, rp, regex })
    }

    /// Evaluate the predicate against one candidate element.
    pub(crate) fn matches(&self, candidate: &Value, root: &Value) -> Result<bool, FilterError> {
        match self.op {
            FilterOp::Exists => {
                let lp = resolve_operand(&self.lp, candidate, root)?;
                Ok(matches!(lp, Some(v) if !v.is_null()))
            }
            FilterOp::Match => {
                let lp = resolve_operand(&self.lp, candidate, root)?;
                let Some(Value::String(subject)) = lp else {
                    return Err(FilterError::RegexOnNonString);
                };
                let matched = self
                    .regex
                    .as_ref()
                    .map(|pattern| pattern.is_match(&subject))
                    .unwrap_or(false);
                Ok(matched)
            }
            FilterOp::In | FilterOp::NotIn => {
                let members = membership_set(&self.rp)?;
                let lp = resolve_operand(&self.lp, candidate, root)?;
                let mut found = false;
                for member in members {
                    let rp = resolve_operand(member.trim(), candidate, root)?;
                    if values_equal(lp.as_ref(), rp.as_ref()) {
                        found = true;
                        break;
                    }
                }
                Ok(if self.op == FilterOp::In { found } else { !found })
            }
            // `!=` is part of the grammar but not of the comparison set
            FilterOp::Ne => Err(FilterError::BadComparisonOp("!=".into())),
            FilterOp::Eq | FilterOp::Lt | FilterOp::Le | FilterOp::Ge | FilterOp::Gt => {
                let lp = resolve_operand(&self.lp, candidate, root)?;
                let rp = resolve_operand(&self.rp, candidate, root)?;
                Ok(compare(lp.as_ref(), rp.as_ref(), self.op))
            }
        }
    }
}

/// Split a predicate body into at most three whitespace-separated terms,
/// honoring single-quote grouping.
fn split_terms(expr: &str) -> Result<Vec<String>, FilterError> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;

    for ch in expr.chars() {
        match ch {
            '\'' => {
                quoted = !quoted;
                started = true;
            }
            ' ' if !quoted => {
                if started {
                    terms.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            _ => {
                current.push(ch);
                started = true;
            }
        }
    }
    if started {
        terms.push(current);
    }

    if terms.len() > 3 {
        return Err(FilterError::TooManyTerms(expr.to_string()));
    }
    Ok(terms)
}

fn parse_op(token: &str) -> Result<FilterOp, FilterError> {
    match token {
        "==" => Ok(FilterOp::Eq),
        "!=" => Ok(FilterOp::Ne),
        "<" => Ok(FilterOp::Lt),
        "<=" => Ok(FilterOp::Le),
        ">=" => Ok(FilterOp::Ge),
        ">" => Ok(FilterOp::Gt),
        "=~" => Ok(FilterOp::Match),
        "in" => Ok(FilterOp::In),
        "noin" => Ok(FilterOp::NotIn),
        other => Err(FilterError::BadComparisonOp(other.to_string())),
    }
}

fn compile_regex_literal(literal: &str) -> Result<Regex, FilterError> {
    let chars: Vec<char> = literal.chars().collect();
    if chars.len() <= 2 || chars[0] != '/' || chars[chars.len() - 1] != '/' {
        return Err(FilterError::RegexShape(literal.to_string()));
    }
    Ok(Regex::new(&literal[1..literal.len() - 1])?)
}

fn membership_set(operand: &str) -> Result<Vec<String>, FilterError> {
    let trimmed = operand.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('{') || !trimmed.ends_with('}') {
        return Err(FilterError::BadMembershipOperand(operand.to_string()));
    }
    Ok(trimmed[1..trimmed.len() - 1]
        .split(',')
        .map(str::to_string)
        .collect())
}

/// Resolve one operand token to a value.
///
/// Returns `Ok(None)` when a path operand misses data (absent key, index
/// out of range, null traversal): an absent operand never matches, but it
/// is not an error either.
fn resolve_operand(
    token: &str,
    candidate: &Value,
    root: &Value,
) -> Result<Option<Value>, FilterError> {
    if token.starts_with("@.") {
        inner_path(candidate, token)
    } else if token.starts_with("$.") {
        inner_path(root, token)
    } else {
        Ok(Some(Value::String(token.to_string())))
    }
}

/// Resolve a path operand with the restricted in-filter step set:
/// child access and single-element indices only.
fn inner_path(base: &Value, path: &str) -> Result<Option<Value>, FilterError> {
    let tokens = tokenize(path)?;
    let mut current = base.clone();
    for token in &tokens[1..] {
        let (step, extra) = parse_token(token)?;
        for step in std::iter::once(step).chain(extra) {
            current = match step.op {
                StepOp::Key => match get_key(&current, &step.key) {
                    Ok(value) => value,
                    Err(_) => return Ok(None),
                },
                StepOp::Idx => {
                    let StepArgs::Indices(indices) = &step.args else {
                        return Err(FilterError::UnsupportedInFilter);
                    };
                    if indices.len() != 1 {
                        return Err(FilterError::MultipleIndex);
                    }
                    let target = if step.key.is_empty() {
                        current
                    } else {
                        match get_key(&current, &step.key) {
                            Ok(value) => value,
                            Err(_) => return Ok(None),
                        }
                    };
                    match get_idx(&target, indices[0]) {
                        Ok(value) => value,
                        Err(_) => return Ok(None),
                    }
                }
                _ => return Err(FilterError::UnsupportedInFilter),
            };
        }
    }
    Ok(Some(current))
}

/// Equality with numeric coercion: numbers (or numeric strings) compare
/// numerically, everything else compares by scalar string form.
fn values_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    compare(left, right, FilterOp::Eq)
}

fn compare(left: Option<&Value>, right: Option<&Value>, op: FilterOp) -> bool {
    let (Some(left), Some(right)) = (left, right) else {
        return false;
    };
    if let (Some(a), Some(b)) = (numeric(left), numeric(right)) {
        return match op {
            FilterOp::Eq => (a - b).abs() < f64::EPSILON,
            FilterOp::Lt => a < b,
            FilterOp::Le => a <= b,
            FilterOp::Ge => a >= b,
            FilterOp::Gt => a > b,
            _ => false,
        };
    }
    let (Some(a), Some(b)) = (scalar_string(left), scalar_string(right)) else {
        return false;
    };
    match op {
        FilterOp::Eq => a == b,
        FilterOp::Lt => a < b,
        FilterOp::Le => a <= b,
        FilterOp::Ge => a >= b,
        FilterOp::Gt => a > b,
        _ => false,
    }
}

/// A value's numeric form, if it has one: native numbers, or strings that
/// parse as a 64-bit float.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// A scalar's string form; containers and null are not comparable.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(expr: &str, candidate: &Value) -> Result<bool, FilterError> {
        Predicate::parse(expr)?.matches(candidate, candidate)
    }

    #[test]
    fn test_existence() {
        let item = json!({"isbn": "0-553-21311-3"});
        assert!(eval("@.isbn", &item).unwrap());
        assert!(!eval("@.missing", &item).unwrap());
    }

    #[test]
    fn test_existence_null_is_absent() {
        let item = json!({"isbn": null});
        assert!(!eval("@.isbn", &item).unwrap());
    }

    #[test]
    fn test_numeric_comparison() {
        let item = json!({"price": 8.95});
        assert!(eval("@.price < 10", &item).unwrap());
        assert!(!eval("@.price > 10", &item).unwrap());
        assert!(eval("@.price >= 8.95", &item).unwrap());
    }

    #[test]
    fn test_numeric_string_coercion() {
        let item = json!({"price": "15"});
        assert!(eval("@.price > 9", &item).unwrap());
    }

    #[test]
    fn test_string_comparison_falls_back_to_lexicographic() {
        let item = json!({"name": "bob"});
        assert!(eval("@.name == bob", &item).unwrap());
        assert!(eval("@.name < carol", &item).unwrap());
    }

    #[test]
    fn test_quoted_literal_preserves_spaces() {
        let item = json!({"title": "Moby Dick"});
        assert!(eval("@.title == 'Moby Dick'", &item).unwrap());
    }

    #[test]
    fn test_root_reference() {
        let root = json!({"expensive": 10, "price": 12});
        let predicate = Predicate::parse("@.price > $.expensive").unwrap();
        assert!(predicate.matches(&root, &root).unwrap());
    }

    #[test]
    fn test_inner_index_path() {
        let item = json!({"tags": ["a", "b"]});
        assert!(eval("@.tags[1] == b", &item).unwrap());
        assert!(eval("@.tags[-1] == b", &item).unwrap());
    }

    #[test]
    fn test_inner_multi_index_rejected() {
        let item = json!({"tags": ["a", "b"]});
        assert!(matches!(
            eval("@.tags[0,1] == a", &item),
            Err(FilterError::MultipleIndex)
        ));
    }

    #[test]
    fn test_inner_range_rejected() {
        let item = json!({"tags": ["a", "b"]});
        assert!(matches!(
            eval("@.tags[0:1] == a", &item),
            Err(FilterError::UnsupportedInFilter)
        ));
    }

    #[test]
    fn test_regex_match() {
        let item = json!({"author": "Evelyn Waugh"});
        assert!(eval("@.author =~ /Waugh$/", &item).unwrap());
        assert!(!eval("@.author =~ /^X/", &item).unwrap());
    }

    #[test]
    fn test_regex_on_non_string_fails() {
        let item = json!({"price": 5});
        assert!(matches!(
            eval("@.price =~ /5/", &item),
            Err(FilterError::RegexOnNonString)
        ));
    }

    #[test]
    fn test_regex_shape_enforced() {
        let item = json!({"author": "X"});
        assert!(matches!(
            eval("@.author =~ Waugh", &item),
            Err(FilterError::RegexShape(_))
        ));
        assert!(matches!(
            eval("@.author =~ //", &item),
            Err(FilterError::RegexShape(_))
        ));
    }

    #[test]
    fn test_membership() {
        let item = json!({"category": "fiction"});
        assert!(eval("@.category in {fiction,reference}", &item).unwrap());
        assert!(!eval("@.category in {poetry,drama}", &item).unwrap());
        assert!(eval("@.category noin {poetry,drama}", &item).unwrap());
    }

    #[test]
    fn test_membership_numeric() {
        let item = json!({"price": 8});
        assert!(eval("@.price in {8,12}", &item).unwrap());
    }

    #[test]
    fn test_membership_requires_braces() {
        let item = json!({"category": "fiction"});
        assert!(matches!(
            eval("@.category in fiction", &item),
            Err(FilterError::BadMembershipOperand(_))
        ));
    }

    #[test]
    fn test_braced_operand_under_eq_is_literal() {
        // membership dispatch is gated on the operator, not operand shape
        let item = json!({"category": "{fiction,reference}"});
        assert!(eval("@.category == '{fiction,reference}'", &item).unwrap());
    }

    #[test]
    fn test_not_equal_rejected_at_evaluation() {
        let item = json!({"price": 5});
        assert!(matches!(
            eval("@.price != 5", &item),
            Err(FilterError::BadComparisonOp(op)) if op == "!="
        ));
    }

    #[test]
    fn test_too_many_terms() {
        let item = json!({});
        assert!(matches!(
            eval("a == b c", &item),
            Err(FilterError::TooManyTerms(_))
        ));
    }

    #[test]
    fn test_absent_operand_never_matches() {
        let item = json!({"other": 1});
        assert!(!eval("@.price < 10", &item).unwrap());
        assert!(!eval("@.price == 10", &item).unwrap());
        assert!(!eval("@.price in {10}", &item).unwrap());
        assert!(eval("@.price noin {10}", &item).unwrap());
    }
}
