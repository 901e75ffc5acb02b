//! Constructors, unified indexed access, and the array/object operations.

use crate::coerce::{coercion_string, strict_eq, to_number};
use crate::error::VmError;
use crate::state::VmState;
use crate::values::{format_number, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use reverie_bytecode::OpCode;
use std::collections::BTreeMap;

/// Canonical non-negative integer strings address array elements; anything
/// else addressed onto an array goes to its property sidecar.
static INDEX_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(0|[1-9][0-9]*)$").expect("static pattern"));

/// Cap on how far SET_INDEX may extend an array past its end.
const MAX_ARRAY_EXTEND: usize = 1 << 24;

/// Resolve an index operand to an element index, or `None` when it should
/// be treated as a property key.
fn element_index(index: &Value) -> Option<usize> {
    match index {
        Value::Number(n) => {
            if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 {
                Some(*n as usize)
            } else {
                None
            }
        }
        Value::String(s) => {
            if INDEX_KEY.is_match(s) {
                s.parse::<usize>().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// The property-key form of an index operand.
fn property_key(state: &VmState, index: &Value) -> String {
    match index {
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
        other => coercion_string(&state.heap, other),
    }
}

pub fn new_array(state: &mut VmState, count: usize) -> Result<(), VmError> {
    let mut elements = Vec::with_capacity(count);
    for _ in 0..count {
        elements.push(state.pop(OpCode::NewArray)?);
    }
    elements.reverse();
    let id = state.heap.allocate_array(elements);
    state.push(Value::ArrayRef(id));
    Ok(())
}

pub fn new_object(state: &mut VmState, count: usize) -> Result<(), VmError> {
    let mut properties = BTreeMap::new();
    for _ in 0..count {
        let value = state.pop(OpCode::NewObject)?;
        let key_value = state.pop(OpCode::NewObject)?;
        let key = property_key(state, &key_value);
        // Earlier pairs win ties here because we insert back-to-front.
        properties.entry(key).or_insert(value);
    }
    let id = state.heap.allocate_object(properties);
    state.push(Value::ObjectRef(id));
    Ok(())
}

pub fn copy_value(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::CopyValue)?;
    let copy = state.heap.deep_copy_value(&value)?;
    state.push(copy);
    Ok(())
}

/// GET_INDEX: unified array/object/string indexing.
///
/// Array targets: numeric (or numeric-string) indices address `elements`,
/// anything else reads the property sidecar.  Object targets stringify the
/// index as a key.  String targets yield single characters.  Misses are
/// `Undefined`; number/boolean targets are hard type errors.
pub fn get_index(state: &mut VmState) -> Result<(), VmError> {
    let index = state.pop(OpCode::GetIndex)?;
    let target = state.pop(OpCode::GetIndex)?;
    let result = match &target {
        Value::ArrayRef(id) => match element_index(&index) {
            Some(i) => {
                let entry = state.heap.array(*id)?;
                entry.elements.get(i).cloned().unwrap_or(Value::Undefined)
            }
            None => {
                let key = property_key(state, &index);
                let entry = state.heap.array(*id)?;
                entry.properties.get(&key).cloned().unwrap_or(Value::Undefined)
            }
        },
        Value::ObjectRef(id) => {
            let key = property_key(state, &index);
            let entry = state.heap.object(*id)?;
            entry.properties.get(&key).cloned().unwrap_or(Value::Undefined)
        }
        Value::String(s) => match element_index(&index) {
            Some(i) => s
                .chars()
                .nth(i)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Undefined),
            None => Value::Undefined,
        },
        Value::Null | Value::Undefined => Value::Undefined,
        Value::Number(_) | Value::Bool(_) => {
            return Err(VmError::Type(format!(
                "cannot index a {}",
                target.type_name()
            )));
        }
    };
    state.push(result);
    Ok(())
}

/// SET_INDEX: the write half of the unified access pair.
///
/// Writing past the end of an array extends it (holes fill with
/// `Undefined`); non-index keys land in the property sidecar without
/// disturbing `length`.  Strings are immutable, so string/null/undefined
/// targets are silent no-ops; number/boolean targets are type errors.
pub fn set_index(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::SetIndex)?;
    let index = state.pop(OpCode::SetIndex)?;
    let target = state.pop(OpCode::SetIndex)?;
    match &target {
        Value::ArrayRef(id) => match element_index(&index) {
            Some(i) => {
                let entry = state.heap.array_mut(*id)?;
                if i >= entry.elements.len() {
                    if i >= MAX_ARRAY_EXTEND {
                        return Err(VmError::Runtime(format!(
                            "array index {i} exceeds the extension bound"
                        )));
                    }
                    entry.elements.resize(i + 1, Value::Undefined);
                }
                entry.elements[i] = value;
            }
            None => {
                let key = property_key(state, &index);
                state.heap.array_mut(*id)?.properties.insert(key, value);
            }
        },
        Value::ObjectRef(id) => {
            let key = property_key(state, &index);
            state.heap.object_mut(*id)?.properties.insert(key, value);
        }
        Value::String(_) | Value::Null | Value::Undefined => {}
        Value::Number(_) | Value::Bool(_) => {
            return Err(VmError::Type(format!(
                "cannot index a {}",
                target.type_name()
            )));
        }
    }
    Ok(())
}

/// ARRAY_PUSH: append and report the new length.
pub fn array_push(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::ArrayPush)?;
    let target = state.pop(OpCode::ArrayPush)?;
    match target {
        Value::ArrayRef(id) => {
            let entry = state.heap.array_mut(id)?;
            entry.elements.push(value);
            let len = entry.elements.len();
            state.push(Value::Number(len as f64));
            Ok(())
        }
        other => Err(VmError::Type(format!(
            "ARRAY_PUSH target must be an array, got {}",
            other.type_name()
        ))),
    }
}

/// Normalize slice bounds: negatives count from the end, NaN is 0, both
/// ends clamp to `[0, len]`.
fn slice_bounds(start: &Value, end: &Value, len: usize) -> (usize, usize) {
    let norm = |v: &Value, default: i64| -> i64 {
        if matches!(v, Value::Undefined) {
            return default;
        }
        let n = to_number(v);
        if n.is_nan() {
            0
        } else if n.is_infinite() {
            if n > 0.0 { len as i64 } else { i64::MIN / 2 }
        } else {
            n.trunc() as i64
        }
    };
    let resolve = |i: i64| -> usize {
        let adjusted = if i < 0 { i + len as i64 } else { i };
        adjusted.clamp(0, len as i64) as usize
    };
    (resolve(norm(start, 0)), resolve(norm(end, len as i64)))
}

/// SLICE: shallow sub-range of an array (fresh allocation) or of a string.
pub fn slice(state: &mut VmState) -> Result<(), VmError> {
    let end = state.pop(OpCode::Slice)?;
    let start = state.pop(OpCode::Slice)?;
    let target = state.pop(OpCode::Slice)?;
    match &target {
        Value::ArrayRef(id) => {
            let elements = state.heap.array(*id)?.elements.clone();
            let (from, to) = slice_bounds(&start, &end, elements.len());
            let sub: Vec<Value> = if from < to {
                elements[from..to].to_vec()
            } else {
                Vec::new()
            };
            let new_id = state.heap.allocate_array(sub);
            state.push(Value::ArrayRef(new_id));
            Ok(())
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = slice_bounds(&start, &end, chars.len());
            let sub: String = if from < to {
                chars[from..to].iter().collect()
            } else {
                String::new()
            };
            state.push(Value::String(sub));
            Ok(())
        }
        other => Err(VmError::Type(format!(
            "SLICE target must be an array or string, got {}",
            other.type_name()
        ))),
    }
}

/// JOIN: array elements stringified and joined; null/undefined render
/// empty, a missing separator defaults to a comma.
pub fn join(state: &mut VmState) -> Result<(), VmError> {
    let separator = state.pop(OpCode::Join)?;
    let target = state.pop(OpCode::Join)?;
    match target {
        Value::ArrayRef(id) => {
            let sep = match separator {
                Value::Undefined => ",".to_string(),
                other => coercion_string(&state.heap, &other),
            };
            let elements = state.heap.array(id)?.elements.clone();
            let joined = elements
                .iter()
                .map(|v| match v {
                    Value::Null | Value::Undefined => String::new(),
                    other => coercion_string(&state.heap, other),
                })
                .collect::<Vec<_>>()
                .join(&sep);
            state.push(Value::String(joined));
            Ok(())
        }
        other => Err(VmError::Type(format!(
            "JOIN target must be an array, got {}",
            other.type_name()
        ))),
    }
}

/// INDEX_OF: first match by strict equality in an array, or substring
/// search in a string; -1 when absent.  No coercion on array elements.
pub fn index_of(state: &mut VmState) -> Result<(), VmError> {
    let needle = state.pop(OpCode::IndexOf)?;
    let target = state.pop(OpCode::IndexOf)?;
    let found = match &target {
        Value::ArrayRef(id) => state
            .heap
            .array(*id)?
            .elements
            .iter()
            .position(|v| strict_eq(v, &needle))
            .map(|i| i as f64)
            .unwrap_or(-1.0),
        Value::String(s) => {
            let pat = coercion_string(&state.heap, &needle);
            match s.find(&pat) {
                Some(byte) => s[..byte].chars().count() as f64,
                None => -1.0,
            }
        }
        other => {
            return Err(VmError::Type(format!(
                "INDEX_OF target must be an array or string, got {}",
                other.type_name()
            )));
        }
    };
    state.push(Value::Number(found));
    Ok(())
}

/// LENGTH: string char count, array element count (sidecar properties
/// excluded), object property count.
pub fn length(state: &mut VmState) -> Result<(), VmError> {
    let target = state.pop(OpCode::Length)?;
    let len = match &target {
        Value::String(s) => s.chars().count(),
        Value::ArrayRef(id) => state.heap.array(*id)?.elements.len(),
        Value::ObjectRef(id) => state.heap.object(*id)?.properties.len(),
        other => {
            return Err(VmError::Type(format!(
                "cannot take length of {}",
                other.type_name()
            )));
        }
    };
    state.push(Value::Number(len as f64));
    Ok(())
}

/// KEYS: a fresh array of key strings — element indices plus sidecar keys
/// for arrays, property keys for objects.
pub fn keys(state: &mut VmState) -> Result<(), VmError> {
    let target = state.pop(OpCode::Keys)?;
    let keys: Vec<Value> = match &target {
        Value::ArrayRef(id) => {
            let entry = state.heap.array(*id)?;
            let mut out: Vec<Value> = (0..entry.elements.len())
                .map(|i| Value::String(i.to_string()))
                .collect();
            out.extend(entry.properties.keys().map(|k| Value::String(k.clone())));
            out
        }
        Value::ObjectRef(id) => state
            .heap
            .object(*id)?
            .properties
            .keys()
            .map(|k| Value::String(k.clone()))
            .collect(),
        other => {
            return Err(VmError::Type(format!(
                "KEYS target must be an array or object, got {}",
                other.type_name()
            )));
        }
    };
    let id = state.heap.allocate_array(keys);
    state.push(Value::ArrayRef(id));
    Ok(())
}
