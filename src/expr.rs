//! Conditional expression evaluator for `!IF`/`!ELSEIF`: a left-to-right, no-precedence `&&`/`||`
//! splitter, a typed single-comparison evaluator, and bracketed sub-command substitution. The lack
//! of operator precedence between `&&` and `||` is intentional, not an oversight — see DESIGN.md.

use crate::cache::SubCommandEvaluator;
use crate::context::Context;
use crate::error::MakeError;
use crate::expand::{expand, AutomaticMacros};
use crate::vars::Vars;

/// Evaluate the boolean expression text following `!IF`/`!ELSEIF` (already stripped of the
/// directive keyword). Variable references are expanded first; the first top-level `&&`/`||`
/// splits the expression left-to-right with no precedence between the two operators.
pub fn evaluate(
    expr_text: &str,
    vars: &Vars,
    sub: &mut SubCommandEvaluator,
    context: &Context,
) -> Result<bool, MakeError> {
    let expanded = expand(expr_text, vars, &AutomaticMacros::default());
    evaluate_compound(&expanded, sub, vars, context)
}

/// Top-level comparison operators, longest-first so `==`/`!=`/`>=`/`<=` are not shadowed by a bare
/// `<`/`>`.
const OPERATORS: &[&str] = &["==", "!=", ">=", "<=", ">", "<"];

fn find_top_level_operator(s: &str) -> Option<(usize, &'static str)> {
    let mut depth: i32 = 0;
    let mut in_quotes = false;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes => depth -= 1,
            _ if !in_quotes && depth <= 0 => {
                for op in OPERATORS {
                    if s[i..].starts_with(op) {
                        return Some((i, op));
                    }
                }
            }
            _ => {}
        }
    }

    None
}

fn find_top_level_connective(s: &str) -> Option<(usize, char)> {
    let mut depth: i32 = 0;
    let mut in_quotes = false;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes => depth -= 1,
            '&' | '|' if !in_quotes && depth <= 0 && s[i + c.len_utf8()..].starts_with(c) => {
                return Some((i, c));
            }
            _ => {}
        }
    }

    None
}

/// Split on top-level `&&`/`||` left to right with no precedence and fold: each
/// operand is combined with the running result using the operator that preceded it, in the order
/// the operators appear in the text (not grouped by `&&`-before-`||` precedence).
fn evaluate_compound(
    text: &str,
    sub: &mut SubCommandEvaluator,
    vars: &Vars,
    context: &Context,
) -> Result<bool, MakeError> {
    let mut remaining = text.trim();
    let mut result: Option<bool> = None;
    let mut pending_op: Option<char> = None;

    loop {
        let (operand_text, rest) = match find_top_level_connective(remaining) {
            None => (remaining.trim(), None),
            Some((i, c)) => (remaining[..i].trim(), Some((c, remaining[i + 2..].trim()))),
        };

        let operand_value = evaluate_single(operand_text, sub, vars, context)?;
        result = Some(match (result, pending_op) {
            (None, _) => operand_value,
            (Some(acc), Some('&')) => acc && operand_value,
            (Some(acc), Some('|')) => acc || operand_value,
            (Some(acc), _) => acc,
        });

        match rest {
            None => break,
            Some((c, next_remaining)) => {
                pending_op = Some(c);
                remaining = next_remaining;
            }
        }
    }

    Ok(result.unwrap_or(false))
}

/// Evaluate a single, non-compound comparison.
fn evaluate_single(
    text: &str,
    sub: &mut SubCommandEvaluator,
    vars: &Vars,
    context: &Context,
) -> Result<bool, MakeError> {
    let text = text.trim();

    let Some((i, op)) = find_top_level_operator(text) else {
        return Err(MakeError::syntax(
            format!("missing comparison operator in expression `{}`", text),
            context.clone(),
        ));
    };

    let lhs = text[..i].trim();
    let rhs = text[i + op.len()..].trim();

    let lhs_is_string = lhs.starts_with('"');
    let rhs_is_string = rhs.starts_with('"');

    match (lhs_is_string, rhs_is_string) {
        (true, true) => {
            if op != "==" && op != "!=" {
                return Err(MakeError::syntax(
                    format!("operator `{}` is not valid for string comparison", op),
                    context.clone(),
                ));
            }
            let lhs_value = strip_quotes(lhs, context)?;
            let rhs_value = strip_quotes(rhs, context)?;
            Ok(if op == "==" {
                lhs_value == rhs_value
            } else {
                lhs_value != rhs_value
            })
        }
        (false, false) => {
            let lhs_value = resolve_numeric(lhs, sub, vars, context)?;
            let rhs_value = resolve_numeric(rhs, sub, vars, context)?;
            Ok(match op {
                "==" => lhs_value == rhs_value,
                "!=" => lhs_value != rhs_value,
                ">=" => lhs_value >= rhs_value,
                "<=" => lhs_value <= rhs_value,
                ">" => lhs_value > rhs_value,
                "<" => lhs_value < rhs_value,
                _ => unreachable!("exhaustive over OPERATORS"),
            })
        }
        _ => Err(MakeError::syntax(
            format!("cannot compare a string and a number in `{}`", text),
            context.clone(),
        )),
    }
}

fn strip_quotes<'a>(s: &'a str, context: &Context) -> Result<&'a str, MakeError> {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Ok(&s[1..s.len() - 1])
    } else {
        Err(MakeError::syntax(
            format!("unterminated string literal `{}`", s),
            context.clone(),
        ))
    }
}

/// Resolve one numeric operand: empty is zero, `[cmd]` is replaced by its exit code, otherwise
/// parsed as a signed integer.
fn resolve_numeric(
    s: &str,
    sub: &mut SubCommandEvaluator,
    vars: &Vars,
    context: &Context,
) -> Result<i64, MakeError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }

    if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return Ok(sub.eval(inner, vars) as i64);
    }

    s.parse::<i64>().map_err(|_| {
        MakeError::syntax(format!("`{}` is not a valid numeric operand", s), context.clone())
    })
}
