//! JSON stringify/parse handlers.
//!
//! Stringify walks references recursively into a plain nested structure
//! before serialization; parse allocates fresh heap entries for every
//! nested array/object literal it encounters.

use crate::coerce::coercion_string;
use crate::error::VmError;
use crate::heap::Heap;
use crate::state::VmState;
use crate::values::Value;
use reverie_bytecode::OpCode;
use std::collections::BTreeMap;

/// Convert a VM value to a JSON tree.  `None` means "undefined": dropped
/// from objects, rendered as null inside arrays, and propagated at the top
/// level.  Cycles are reported, not followed.
fn to_json(
    heap: &Heap,
    value: &Value,
    visiting: &mut Vec<u64>,
) -> Result<Option<serde_json::Value>, VmError> {
    Ok(match value {
        Value::Undefined => None,
        Value::Null => Some(serde_json::Value::Null),
        Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => {
            // Integral values serialize without a decimal point; NaN and
            // infinities serialize as null.
            let number = if n.is_finite() && n.fract() == 0.0 && n.abs() < 9e15 {
                Some(serde_json::Number::from(*n as i64))
            } else {
                serde_json::Number::from_f64(*n)
            };
            Some(
                number
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            )
        }
        Value::String(s) => Some(serde_json::Value::String(s.clone())),
        Value::ArrayRef(id) => {
            if visiting.contains(&id.0) {
                return Err(VmError::Runtime(
                    "cannot stringify a circular structure".to_string(),
                ));
            }
            visiting.push(id.0);
            let elements = heap.array(*id)?.elements.clone();
            let mut items = Vec::with_capacity(elements.len());
            for element in &elements {
                items.push(to_json(heap, element, visiting)?.unwrap_or(serde_json::Value::Null));
            }
            visiting.pop();
            Some(serde_json::Value::Array(items))
        }
        Value::ObjectRef(id) => {
            if visiting.contains(&id.0) {
                return Err(VmError::Runtime(
                    "cannot stringify a circular structure".to_string(),
                ));
            }
            visiting.push(id.0);
            let properties = heap.object(*id)?.properties.clone();
            let mut map = serde_json::Map::new();
            for (key, prop) in &properties {
                if let Some(rendered) = to_json(heap, prop, visiting)? {
                    map.insert(key.clone(), rendered);
                }
            }
            visiting.pop();
            Some(serde_json::Value::Object(map))
        }
    })
}

/// Convert a parsed JSON tree to VM values, allocating heap entries for
/// every nested container.  Also used by hosts to inject structured
/// cognitive-call results into a restored state.
pub fn value_from_json(heap: &mut Heap, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            let elements: Vec<Value> = items
                .iter()
                .map(|item| value_from_json(heap, item))
                .collect();
            Value::ArrayRef(heap.allocate_array(elements))
        }
        serde_json::Value::Object(map) => {
            let mut properties = BTreeMap::new();
            for (key, item) in map {
                properties.insert(key.clone(), value_from_json(heap, item));
            }
            Value::ObjectRef(heap.allocate_object(properties))
        }
    }
}

pub fn stringify(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::JsonStringify)?;
    let mut visiting = Vec::new();
    match to_json(&state.heap, &value, &mut visiting)? {
        Some(json) => {
            let rendered = serde_json::to_string(&json)
                .map_err(|e| VmError::Runtime(format!("JSON stringify failed: {e}")))?;
            state.push(Value::String(rendered));
        }
        None => state.push(Value::Undefined),
    }
    Ok(())
}

pub fn parse(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::JsonParse)?;
    let text = coercion_string(&state.heap, &value);
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| VmError::Runtime(format!("JSON parse error: {e}")))?;
    let parsed = value_from_json(&mut state.heap, &json);
    state.push(parsed);
    Ok(())
}
