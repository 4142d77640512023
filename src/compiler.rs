//! Step compiler — turns raw tokens into a typed [`Program`]

use tracing::debug;

use crate::ast::{Program, Step, StepArgs, StepOp};
use crate::error::CompileError;
use crate::tokenizer::tokenize;

/// Compile a path expression into a reusable [`Program`].
///
/// The leading `$`/`@` marker is consumed and never appears as a step. A
/// `*` marker produced by `..` is fused with the following token into a
/// single `Scan` step; index or range arguments carried by that token
/// become the scan's occurrence window.
pub fn compile(path: &str) -> Result<Program, CompileError> {
    let tokens = tokenize(path)?;

    let mut steps = Vec::new();
    let mut i = 1; // tokens[0] is the root marker
    while i < tokens.len() {
        if tokens[i] == "*" {
            i += 1;
            let Some(next) = tokens.get(i) else {
                return Err(CompileError::DanglingRecursion);
            };
            let (parsed, extra) = parse_token(next)?;
            if parsed.key.is_empty() {
                return Err(CompileError::DanglingRecursion);
            }
            let args = match parsed.args {
                StepArgs::Indices(_) | StepArgs::Range { .. } => parsed.args,
                _ => StepArgs::None,
            };
            steps.push(Step {
                op: StepOp::Scan,
                key: parsed.key,
                args,
            });
            if let Some(extra) = extra {
                steps.push(extra);
            }
        } else {
            let (parsed, extra) = parse_token(&tokens[i])?;
            steps.push(parsed);
            if let Some(extra) = extra {
                steps.push(extra);
            }
        }
        i += 1;
    }

    debug!(path, steps = steps.len(), "compiled path program");
    Ok(Program {
        path: path.to_string(),
        steps,
    })
}

/// Parse one raw token into a step.
///
/// A token of the form `name['child']` carries two child accesses and
/// yields a second step.
pub(crate) fn parse_token(token: &str) -> Result<(Step, Option<Step>), CompileError> {
    if token == "$" {
        return Ok((Step::bare(StepOp::Root), None));
    }

    let Some(bracket) = token.find('[') else {
        return Ok((Step::key(token), None));
    };

    let key = &token[..bracket];
    let tail = &token[bracket..];
    if tail.len() < 3 {
        return Err(CompileError::BracketTooShort(tail.to_string()));
    }
    let body = &tail[1..tail.len() - 1];

    if body.contains('?') {
        if body.starts_with("?(") && body.ends_with(')') {
            let expr = body[2..body.len() - 1].trim().to_string();
            return Ok((
                Step {
                    op: StepOp::Filter,
                    key: key.to_string(),
                    args: StepArgs::Predicate(expr),
                },
                None,
            ));
        }
        return Err(CompileError::BadFilterShape(body.to_string()));
    }

    if body.contains(':') {
        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() != 2 {
            return Err(CompileError::BadRangeColon(body.to_string()));
        }
        return Ok((
            Step {
                op: StepOp::Range,
                key: key.to_string(),
                args: StepArgs::Range {
                    from: parse_bound(parts[0])?,
                    to: parse_bound(parts[1])?,
                },
            },
            None,
        ));
    }

    if body == "*" {
        return Ok((
            Step {
                op: StepOp::Range,
                key: key.to_string(),
                args: StepArgs::Range {
                    from: None,
                    to: None,
                },
            },
            None,
        ));
    }

    if let Some(name) = quoted_name(body) {
        if key.is_empty() {
            return Ok((Step::key(name), None));
        }
        return Ok((Step::key(key), Some(Step::key(name))));
    }

    let mut indices = Vec::new();
    for piece in body.split(',') {
        let piece = piece.trim();
        indices.push(
            piece
                .parse::<i64>()
                .map_err(|_| CompileError::BadInteger(piece.to_string()))?,
        );
    }
    Ok((
        Step {
            op: StepOp::Idx,
            key: key.to_string(),
            args: StepArgs::Indices(indices),
        },
        None,
    ))
}

/// Parse one side of a range selector; blank means unbounded.
fn parse_bound(piece: &str) -> Result<Option<i64>, CompileError> {
    let piece = piece.trim();
    if piece.is_empty() {
        return Ok(None);
    }
    piece
        .parse::<i64>()
        .map(Some)
        .map_err(|_| CompileError::BadInteger(piece.to_string()))
}

/// Extract a quoted child name from a bracket body, unescaping `\]`.
fn quoted_name(body: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        if body.len() >= 2 && body.starts_with(quote) && body.ends_with(quote) {
            return Some(body[1..body.len() - 1].replace("\\]", "]"));
        }
    }
    None
}
