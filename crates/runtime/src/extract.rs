//! Output-name extraction from callable source text
//!
//! Explicitly declared outputs are the primary path for building a
//! contract; this module is the compatibility shim for callables
//! registered together with their defining text. It scans the body for
//! top-level return statements and reads the returned names, requiring
//! every return point to produce the same set.

use tracing::warn;

use crate::error::ContractDefinitionError;

/// Result of scanning one callable body.
#[derive(Debug, Default)]
pub struct SourceScan {
    /// Output names shared by every return point, in return order.
    pub outputs: Vec<String>,
    /// Non-fatal conditions hit while scanning (unbindable return
    /// statements). Also emitted as tracing warnings.
    pub warnings: Vec<String>,
}

/// True for a bare identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Scan a callable's defining text for output names.
///
/// Lines are walked top to bottom tracking indentation depth. Nested
/// definitions are skipped until control returns to the recording depth.
/// Each top-level return expression is split on top-level commas and the
/// pieces are treated as candidate output names; a statement with any
/// non-identifier piece contributes no names and records a warning
/// instead of failing. More than one distinct non-empty name list across
/// return statements is an error.
pub fn scan_outputs(name: &str, source: &str) -> Result<SourceScan, ContractDefinitionError> {
    let mut found: Vec<Vec<String>> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let mut main_def_seen = false;
    // Indentation of the most recent nested definition header, while its
    // body is being skipped.
    let mut suspended_at: Option<usize> = None;

    for (lineno, raw) in source.lines().enumerate() {
        let line = strip_comment(raw);
        if line.trim().is_empty() {
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        let stmt = line.trim();

        if stmt.starts_with('@') {
            continue;
        }

        if is_definition(stmt) {
            if main_def_seen {
                suspended_at = Some(indent);
            } else {
                main_def_seen = true;
            }
            continue;
        }

        if let Some(depth) = suspended_at {
            if indent <= depth {
                suspended_at = None;
            } else {
                continue;
            }
        }

        let Some(expr) = return_expression(stmt) else {
            continue;
        };

        let pieces = split_top_level_commas(expr);
        let mut vals: Vec<String> = pieces
            .iter()
            .map(|p| p.trim().trim_end_matches(';').trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if vals.iter().any(|v| !is_identifier(v)) {
            let msg = format!(
                "could not bind return names for {name} at line {}: {}",
                lineno + 1,
                stmt
            );
            warn!(contract = name, line = lineno + 1, "unbindable return statement");
            warnings.push(msg);
            vals.clear();
        }

        if !vals.is_empty() {
            found.push(vals);
        }
    }

    if let Some(first) = found.first()
        && found.iter().any(|set| set != first)
    {
        return Err(ContractDefinitionError::AmbiguousOutputs {
            name: name.to_string(),
            sets: found,
        });
    }

    Ok(SourceScan {
        outputs: found.into_iter().next().unwrap_or_default(),
        warnings,
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn is_definition(stmt: &str) -> bool {
    stmt.strip_prefix("def ").is_some() || stmt.strip_prefix("fn ").is_some()
}

/// The expression of a return statement, or None.
fn return_expression(stmt: &str) -> Option<&str> {
    let rest = stmt.strip_prefix("return")?;
    if rest.is_empty() {
        return Some("");
    }
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

/// Split on commas outside brackets and string literals.
fn split_top_level_commas(expr: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    pieces.push(&expr[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }

    pieces.push(&expr[start..]);
    pieces
}
