//! Iterator contexts for structured looping.
//!
//! Each context captures its iteration bound at creation and never re-reads
//! it, so mutations during the loop do not change how many times the loop
//! runs.  Element reads go through the live heap.  Contexts form a LIFO
//! stack; the compiler's structured-loop lowering guarantees the discipline,
//! the VM only enforces the depth bound.

use crate::heap::Heap;
use crate::values::{HeapId, Value};
use serde::{Deserialize, Serialize};

/// Bound on nested iterator depth; exceeding it indicates a runaway
/// compilation bug rather than a legitimate program.
pub const MAX_ITER_DEPTH: usize = 10;

/// What a context iterates over: a live array reference, or a key list
/// snapshotted from an object at loop entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IterTarget {
    Array(HeapId),
    Keys(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IteratorContext {
    pub target: IterTarget,
    pub index: usize,
    pub length: usize,
}

impl IteratorContext {
    pub fn over_array(id: HeapId, length: usize) -> Self {
        IteratorContext {
            target: IterTarget::Array(id),
            index: 0,
            length,
        }
    }

    pub fn over_keys(keys: Vec<String>) -> Self {
        let length = keys.len();
        IteratorContext {
            target: IterTarget::Keys(keys),
            index: 0,
            length,
        }
    }

    /// Advance: while `index < length` yields `(element, true)` with the
    /// element read live (a read past a shrunk array yields `Null`); once
    /// exhausted yields `(Null, false)` indefinitely.
    pub fn next(&mut self, heap: &Heap) -> (Value, bool) {
        if self.index >= self.length {
            return (Value::Null, false);
        }
        let element = match &self.target {
            IterTarget::Array(id) => heap
                .array(*id)
                .ok()
                .and_then(|entry| entry.elements.get(self.index).cloned())
                .unwrap_or(Value::Null),
            IterTarget::Keys(keys) => keys
                .get(self.index)
                .map(|k| Value::String(k.clone()))
                .unwrap_or(Value::Null),
        };
        self.index += 1;
        (element, true)
    }
}
