//! The indexed heap: arrays and objects behind stable integer ids.
//!
//! The heap is an explicit arena keyed by monotonically increasing id.  Ids
//! are never reclaimed or renumbered; cross-snapshot stability is a hard
//! correctness requirement, since aliasing variables must still resolve to
//! the same entry after a suspend/resume cycle.

use crate::error::VmError;
use crate::values::{HeapId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum nesting depth [`Heap::deep_copy_value`] will follow before
/// reporting a runaway (usually cyclic) structure.
const MAX_COPY_DEPTH: usize = 64;

/// An array entry: ordered elements plus a sparse sidecar of string-keyed
/// properties for non-index keys assigned onto the array.  `length` reflects
/// `elements` only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub elements: Vec<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

/// An object entry: a string-keyed map of values.  Keys are kept sorted so
/// serialization and printing are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeapEntry {
    Array(ArrayEntry),
    Object(ObjectEntry),
}

impl HeapEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            HeapEntry::Array(_) => "array",
            HeapEntry::Object(_) => "object",
        }
    }
}

/// The heap itself: id-keyed entries plus the next id to hand out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heap {
    entries: BTreeMap<u64, HeapEntry>,
    next_id: u64,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    /// Rebuild a heap from snapshot parts.  Ids are preserved exactly.
    pub fn from_parts(entries: BTreeMap<u64, HeapEntry>, next_id: u64) -> Self {
        Heap { entries, next_id }
    }

    pub fn into_parts(self) -> (BTreeMap<u64, HeapEntry>, u64) {
        (self.entries, self.next_id)
    }

    pub fn entries(&self) -> &BTreeMap<u64, HeapEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    fn allocate(&mut self, entry: HeapEntry) -> HeapId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, entry);
        HeapId(id)
    }

    /// Store a new array and return its reference.  Never fails.
    pub fn allocate_array(&mut self, elements: Vec<Value>) -> HeapId {
        self.allocate(HeapEntry::Array(ArrayEntry {
            elements,
            properties: BTreeMap::new(),
        }))
    }

    /// Store a new object and return its reference.  Never fails.
    pub fn allocate_object(&mut self, properties: BTreeMap<String, Value>) -> HeapId {
        self.allocate(HeapEntry::Object(ObjectEntry { properties }))
    }

    /// Untyped lookup.  Absence indicates a dangling or corrupt reference
    /// and is always caller-checked rather than trusted.
    pub fn get(&self, id: HeapId) -> Option<&HeapEntry> {
        self.entries.get(&id.0)
    }

    /// Typed array lookup.  A missing id or an object-tagged entry behind an
    /// array reference are both `InvalidReference` errors, never a silent
    /// coercion.
    pub fn array(&self, id: HeapId) -> Result<&ArrayEntry, VmError> {
        match self.entries.get(&id.0) {
            Some(HeapEntry::Array(a)) => Ok(a),
            Some(other) => Err(VmError::InvalidReference(format!(
                "array reference {id} points at {} entry",
                other.kind()
            ))),
            None => Err(VmError::InvalidReference(format!(
                "array reference {id} points at no heap entry"
            ))),
        }
    }

    pub fn array_mut(&mut self, id: HeapId) -> Result<&mut ArrayEntry, VmError> {
        match self.entries.get_mut(&id.0) {
            Some(HeapEntry::Array(a)) => Ok(a),
            Some(other) => {
                let kind = other.kind();
                Err(VmError::InvalidReference(format!(
                    "array reference {id} points at {kind} entry"
                )))
            }
            None => Err(VmError::InvalidReference(format!(
                "array reference {id} points at no heap entry"
            ))),
        }
    }

    /// Typed object lookup, same asymmetry rules as [`Heap::array`].
    pub fn object(&self, id: HeapId) -> Result<&ObjectEntry, VmError> {
        match self.entries.get(&id.0) {
            Some(HeapEntry::Object(o)) => Ok(o),
            Some(other) => Err(VmError::InvalidReference(format!(
                "object reference {id} points at {} entry",
                other.kind()
            ))),
            None => Err(VmError::InvalidReference(format!(
                "object reference {id} points at no heap entry"
            ))),
        }
    }

    pub fn object_mut(&mut self, id: HeapId) -> Result<&mut ObjectEntry, VmError> {
        match self.entries.get_mut(&id.0) {
            Some(HeapEntry::Object(o)) => Ok(o),
            Some(other) => {
                let kind = other.kind();
                Err(VmError::InvalidReference(format!(
                    "object reference {id} points at {kind} entry"
                )))
            }
            None => Err(VmError::InvalidReference(format!(
                "object reference {id} points at no heap entry"
            ))),
        }
    }

    /// Recursively clone a value.  Primitives come back unchanged;
    /// references are followed and their entire structure re-allocated
    /// under fresh ids, so the copy is fully independent of the original.
    pub fn deep_copy_value(&mut self, value: &Value) -> Result<Value, VmError> {
        self.deep_copy_at(value, 0)
    }

    fn deep_copy_at(&mut self, value: &Value, depth: usize) -> Result<Value, VmError> {
        if depth > MAX_COPY_DEPTH {
            return Err(VmError::Runtime(format!(
                "deep copy exceeded depth {MAX_COPY_DEPTH} (cyclic structure?)"
            )));
        }
        match value {
            Value::ArrayRef(id) => {
                let (elements, properties) = {
                    let entry = self.array(*id)?;
                    (entry.elements.clone(), entry.properties.clone())
                };
                let mut copied = Vec::with_capacity(elements.len());
                for element in &elements {
                    copied.push(self.deep_copy_at(element, depth + 1)?);
                }
                let mut copied_props = BTreeMap::new();
                for (key, prop) in &properties {
                    copied_props.insert(key.clone(), self.deep_copy_at(prop, depth + 1)?);
                }
                let new_id = self.allocate(HeapEntry::Array(ArrayEntry {
                    elements: copied,
                    properties: copied_props,
                }));
                Ok(Value::ArrayRef(new_id))
            }
            Value::ObjectRef(id) => {
                let properties = self.object(*id)?.properties.clone();
                let mut copied = BTreeMap::new();
                for (key, prop) in &properties {
                    copied.insert(key.clone(), self.deep_copy_at(prop, depth + 1)?);
                }
                let new_id = self.allocate_object(copied);
                Ok(Value::ObjectRef(new_id))
            }
            primitive => Ok(primitive.clone()),
        }
    }
}
