//! Dynamic coercion policy: toNumber, equality, and stringification.
//!
//! The rules here are behaviorally subtle and guest programs depend on the
//! exact boundaries (numeric-string parsing, the null/undefined loose-equality
//! special case, reference identity).  Change nothing casually.

use crate::heap::{Heap, HeapEntry};
use crate::values::{format_number, same_reference, Value};

/// Coerce a value to a number.
///
/// Numeric strings parse (trimmed; the empty string is 0); non-numeric
/// strings yield NaN; booleans become 0/1; null becomes 0; undefined and
/// references become NaN.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        Value::Null => 0.0,
        Value::Undefined => f64::NAN,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::ArrayRef(_) | Value::ObjectRef(_) => f64::NAN,
    }
}

/// ToString coercion: the string form used by concatenation, `JOIN`, the
/// TO_STRING opcode and the loose-equality string fallback.  Arrays join
/// their elements with `,` (null/undefined render empty, as the guest
/// language expects); objects render a deterministic `{key: value}` form.
pub fn coercion_string(heap: &Heap, value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        Value::ArrayRef(id) => match heap.get(*id) {
            Some(HeapEntry::Array(entry)) => entry
                .elements
                .iter()
                .map(|v| match v {
                    Value::Null | Value::Undefined => String::new(),
                    other => coercion_string(heap, other),
                })
                .collect::<Vec<_>>()
                .join(","),
            _ => "undefined".to_string(),
        },
        Value::ObjectRef(id) => match heap.get(*id) {
            Some(HeapEntry::Object(entry)) => {
                let fields: Vec<String> = entry
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", coercion_string(heap, v)))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            _ => "undefined".to_string(),
        },
    }
}

/// Pretty form for PRINT output: like [`coercion_string`] but arrays render
/// bracketed and strings inside containers are quoted.
pub fn display_string(heap: &Heap, value: &Value) -> String {
    match value {
        Value::ArrayRef(id) => match heap.get(*id) {
            Some(HeapEntry::Array(entry)) => {
                let items: Vec<String> = entry
                    .elements
                    .iter()
                    .map(|v| display_quoted(heap, v))
                    .collect();
                format!("[{}]", items.join(", "))
            }
            _ => "undefined".to_string(),
        },
        Value::ObjectRef(id) => match heap.get(*id) {
            Some(HeapEntry::Object(entry)) => {
                let fields: Vec<String> = entry
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", display_quoted(heap, v)))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            _ => "undefined".to_string(),
        },
        other => coercion_string(heap, other),
    }
}

fn display_quoted(heap: &Heap, value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => display_string(heap, other),
    }
}

/// Whether numeric coercion "succeeded" for loose equality: a value already
/// tagged Number always counts (so `NaN == NaN` stays a numeric comparison,
/// and false); anything else counts only if it coerced to a non-NaN number.
fn numeric_ok(value: &Value, coerced: f64) -> bool {
    matches!(value, Value::Number(_)) || !coerced.is_nan()
}

/// Loose equality (`==`).
///
/// Null and undefined are mutually equal and equal to nothing else.  Two
/// references compare by (kind, id).  Otherwise both sides go through
/// numeric coercion, with string comparison as the fallback when either
/// side is non-numeric.
pub fn loose_eq(heap: &Heap, a: &Value, b: &Value) -> bool {
    let a_nullish = matches!(a, Value::Null | Value::Undefined);
    let b_nullish = matches!(b, Value::Null | Value::Undefined);
    if a_nullish || b_nullish {
        return a_nullish && b_nullish;
    }
    if a.is_reference() && b.is_reference() {
        return same_reference(a, b);
    }
    let na = to_number(a);
    let nb = to_number(b);
    if numeric_ok(a, na) && numeric_ok(b, nb) {
        na == nb
    } else {
        coercion_string(heap, a) == coercion_string(heap, b)
    }
}

/// Strict equality (`===`): no coercion.  References compare by (kind, id);
/// primitives by tag and raw value, with f64 semantics (`NaN !== NaN`,
/// `0 === -0`).
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::ArrayRef(_), Value::ArrayRef(_)) | (Value::ObjectRef(_), Value::ObjectRef(_)) => {
            same_reference(a, b)
        }
        _ => false,
    }
}
