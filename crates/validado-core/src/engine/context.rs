//! Per-invocation execution context
//!
//! One `create()` call owns exactly one context: the in-progress instance
//! values in declaration order, the original raw input, the caller's context
//! data, and the trace. The context is discarded (or attached to the error)
//! when the call returns; nothing in it outlives the invocation.

use super::super::shape::CompiledShape;
use crate::trace::Trace;
use crate::types::Snapshot;
use indexmap::IndexMap;
use serde_json::Value;

/// Mutable state for one construction
#[derive(Debug)]
pub(crate) struct ExecutionContext {
    /// Class the instance is being built against, after routing
    pub class_id: String,
    /// Original raw input, untouched
    pub raw: Value,
    /// Caller-supplied context data
    pub context: Value,
    /// Current value of every field, in declaration order
    pub values: IndexMap<String, Value>,
    /// Audit log, appended by the interpreter
    pub trace: Trace,
}

impl ExecutionContext {
    /// Seed values from the raw input: declared fields take their raw value,
    /// absent fields start as null, undeclared raw keys are ignored
    pub fn seed(compiled: &CompiledShape, raw: Value, context: Value) -> Self {
        let mut values = IndexMap::with_capacity(compiled.fields.len());
        for field in &compiled.fields {
            let initial = raw
                .get(&field.spec.name)
                .cloned()
                .unwrap_or(Value::Null);
            values.insert(field.spec.name.clone(), initial);
        }
        Self {
            class_id: compiled.class_id.clone(),
            raw,
            context,
            values,
            trace: Trace::new(),
        }
    }

    /// Read-only view over the current values
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(&self.values)
    }

    /// Current value of one field (null if unknown)
    pub fn value_of(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&Value::Null)
    }

    /// Replace one field's value
    pub fn set_value(&mut self, field: &str, value: Value) {
        if let Some(slot) = self.values.get_mut(field) {
            *slot = value;
        }
    }

    /// Materialize the instance as a JSON object
    pub fn instance_value(&self) -> Value {
        self.snapshot().to_value()
    }
}
