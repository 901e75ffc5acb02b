//! Regex-family handlers.
//!
//! Pattern and flags are captured verbatim at compile time; the matcher is
//! materialized at each call rather than cached, so an invalid pattern
//! surfaces as a runtime error exactly where it is used.

use crate::coerce::coercion_string;
use crate::error::VmError;
use crate::state::VmState;
use crate::values::Value;
use regex::{Regex, RegexBuilder};
use reverie_bytecode::OpCode;

/// Build a matcher from guest-language flags.  `g` is not a matcher option
/// but a mode: it switches MATCH/REPLACE to all-occurrences.
fn build(pattern: &str, flags: &str) -> Result<(Regex, bool), VmError> {
    let mut global = false;
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'g' => global = true,
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            other => {
                return Err(VmError::Syntax(format!(
                    "unsupported regex flag '{other}' in /{pattern}/{flags}"
                )));
            }
        }
    }
    let regex = builder
        .build()
        .map_err(|e| VmError::Syntax(format!("invalid regex /{pattern}/{flags}: {e}")))?;
    Ok((regex, global))
}

pub fn test(state: &mut VmState, pattern: &str, flags: &str) -> Result<(), VmError> {
    let subject = state.pop(OpCode::RegexTest)?;
    let subject = coercion_string(&state.heap, &subject);
    let (regex, _) = build(pattern, flags)?;
    state.push(Value::Bool(regex.is_match(&subject)));
    Ok(())
}

/// MATCH: with `g`, an array of every full-match string; without, the
/// first match's full text and capture groups.  No match pushes null.
pub fn match_op(state: &mut VmState, pattern: &str, flags: &str) -> Result<(), VmError> {
    let subject = state.pop(OpCode::RegexMatch)?;
    let subject = coercion_string(&state.heap, &subject);
    let (regex, global) = build(pattern, flags)?;
    let matches: Vec<Value> = if global {
        regex
            .find_iter(&subject)
            .map(|m| Value::String(m.as_str().to_string()))
            .collect()
    } else {
        match regex.captures(&subject) {
            Some(caps) => caps
                .iter()
                .map(|group| match group {
                    Some(m) => Value::String(m.as_str().to_string()),
                    None => Value::Undefined,
                })
                .collect(),
            None => Vec::new(),
        }
    };
    if matches.is_empty() {
        state.push(Value::Null);
    } else {
        let id = state.heap.allocate_array(matches);
        state.push(Value::ArrayRef(id));
    }
    Ok(())
}

pub fn replace(state: &mut VmState, pattern: &str, flags: &str) -> Result<(), VmError> {
    let replacement = state.pop(OpCode::RegexReplace)?;
    let subject = state.pop(OpCode::RegexReplace)?;
    let subject = coercion_string(&state.heap, &subject);
    let replacement = coercion_string(&state.heap, &replacement);
    let (regex, global) = build(pattern, flags)?;
    let replaced = if global {
        regex.replace_all(&subject, replacement.as_str())
    } else {
        regex.replace(&subject, replacement.as_str())
    };
    state.push(Value::String(replaced.into_owned()));
    Ok(())
}
