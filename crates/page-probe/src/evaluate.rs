//! Constrained page-expression evaluation.
//!
//! The planner only ever emits a handful of expression shapes; the probe
//! evaluates exactly those against the document and refuses the rest with a
//! typed error. Results are stringified and capped.

use crate::dom::Document;
use crate::errors::ProbeError;
use crate::selector;

/// Evaluate an expression, stringify the result, cap at `max_len` chars.
pub fn evaluate(doc: &Document, expression: &str, max_len: usize) -> Result<String, ProbeError> {
    let expr = expression.trim().trim_end_matches(';');

    let raw = match expr {
        "document.title" => doc.title.clone(),
        "location.href" | "window.location.href" | "document.URL" => doc.url.clone(),
        "document.body.innerText" => doc.text_content(doc.root()),
        _ => evaluate_query(doc, expr)?,
    };

    Ok(cap(&raw, max_len))
}

fn evaluate_query(doc: &Document, expr: &str) -> Result<String, ProbeError> {
    if let Some(rest) = expr.strip_prefix("document.querySelectorAll(") {
        let (sel, tail) = split_call_arg(rest, expr)?;
        if tail == ".length" {
            let count = selector::query_all_str(doc, &sel)?.len();
            return Ok(count.to_string());
        }
        return Err(ProbeError::UnsupportedExpression(expr.to_string()));
    }

    if let Some(rest) = expr.strip_prefix("document.querySelector(") {
        let (sel, tail) = split_call_arg(rest, expr)?;
        let id = selector::resolve(doc, &sel)?;
        let node = doc.node(id);
        return match tail {
            ".textContent" | ".innerText" => Ok(doc.text_content(id)),
            ".innerHTML" => Ok(doc.inner_html(id)),
            ".value" => Ok(node.data.value.clone().unwrap_or_default()),
            ".href" => Ok(node.data.attrs.get("href").cloned().unwrap_or_default()),
            tail => {
                if let Some(attr_call) = tail.strip_prefix(".getAttribute(") {
                    let (attr, after) = split_call_arg(attr_call, expr)?;
                    if !after.is_empty() {
                        return Err(ProbeError::UnsupportedExpression(expr.to_string()));
                    }
                    return Ok(node.data.attrs.get(&attr).cloned().unwrap_or_default());
                }
                Err(ProbeError::UnsupportedExpression(expr.to_string()))
            }
        };
    }

    Err(ProbeError::UnsupportedExpression(expr.to_string()))
}

/// Split `"arg")tail` into the quoted argument and the trailing accessor.
fn split_call_arg<'a>(rest: &'a str, whole: &str) -> Result<(String, &'a str), ProbeError> {
    let rest = rest.trim_start();
    let quote = rest
        .chars()
        .next()
        .filter(|&c| c == '"' || c == '\'')
        .ok_or_else(|| ProbeError::UnsupportedExpression(whole.to_string()))?;
    let body = &rest[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| ProbeError::UnsupportedExpression(whole.to_string()))?;
    let arg = body[..end].to_string();
    let after = body[end + 1..].trim_start();
    let tail = after
        .strip_prefix(')')
        .ok_or_else(|| ProbeError::UnsupportedExpression(whole.to_string()))?;
    Ok((arg, tail))
}

fn cap(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
