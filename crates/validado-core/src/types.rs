//! Core data types for shapes, options, and construction results
//!
//! This module defines the shared vocabulary of the engine: execution
//! strategies, error modes, value type hints, validation outcomes, the
//! caller-facing options for `create()`, and the structures a successful or
//! failed construction reports back.

use crate::ai::AiHandler;
use crate::trace::{StepKind, Trace};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Execution strategy for one `create()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStrategy {
    /// Iterate field evaluation to a fixed point; tolerates cyclic dependencies
    Convergent,
    /// Evaluate each field exactly once in topological order; rejects cycles
    SinglePass,
}

impl fmt::Display for EngineStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStrategy::Convergent => write!(f, "convergent"),
            EngineStrategy::SinglePass => write!(f, "single-pass"),
        }
    }
}

/// How validation failures are surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorMode {
    /// First terminal failure aborts the whole call
    FailFast,
    /// Evaluate everything reachable, then report all failures together
    CollectAll,
}

impl fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMode::FailFast => write!(f, "fail-fast"),
            ErrorMode::CollectAll => write!(f, "collect-all"),
        }
    }
}

/// Declared value type of a field, used by built-in steps and introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// No declared type; steps decide what to accept
    Any,
}

/// Result of a validation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    /// The value is acceptable
    Pass,
    /// The value was rejected with a caller-presentable message
    Fail(String),
    /// The check cannot run yet because a dependency is unresolved
    ///
    /// Only legal under the convergent engine; the single-pass engine treats
    /// it as an engine defect.
    Deferred(String),
}

/// Read-only view over the in-progress instance, handed to step handlers
///
/// Handlers observe the current value of every field as of the moment the step
/// runs. The engine guarantees that any field a step declared as a dependency
/// is already value-stable when the handler is invoked.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    values: &'a IndexMap<String, Value>,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(values: &'a IndexMap<String, Value>) -> Self {
        Self { values }
    }

    /// Current value of a field, if the field exists in the shape
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.values.get(field)
    }

    /// Whether the field exists and currently holds a non-null value
    pub fn is_present(&self, field: &str) -> bool {
        self.values.get(field).map_or(false, |v| !v.is_null())
    }

    /// Materialize the snapshot as a JSON object in declaration order
    pub fn to_value(&self) -> Value {
        let mut object = serde_json::Map::new();
        for (name, value) in self.values {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// One field's terminal validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFailure {
    /// Field that failed
    pub field: String,
    /// Kind of step that produced the failure
    pub step_kind: StepKind,
    /// Caller-presentable failure message
    pub message: String,
    /// Number of attempts made (greater than 1 only for retried AI steps)
    pub attempts: u32,
}

/// A field that could not be evaluated because an upstream dependency failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedField {
    pub field: String,
    pub reason: String,
}

/// Caller-supplied options for one `create()` call
#[derive(Clone, Default)]
pub struct CreateOptions {
    /// Execution strategy; defaults to [`EngineStrategy::Convergent`]
    pub engine: EngineStrategy,
    /// Failure reporting mode; defaults to [`ErrorMode::FailFast`]
    pub error_mode: ErrorMode,
    /// Handler for `AiTransform` steps
    pub ai_handler: Option<Arc<dyn AiHandler>>,
    /// Handler for `AiValidate` steps
    pub ai_validation_handler: Option<Arc<dyn AiHandler>>,
    /// Arbitrary caller data, passed through to handlers untouched
    pub context: Value,
    /// Override for the convergent pass budget (default: field count x 4)
    pub max_passes: Option<usize>,
}

impl Default for EngineStrategy {
    fn default() -> Self {
        EngineStrategy::Convergent
    }
}

impl Default for ErrorMode {
    fn default() -> Self {
        ErrorMode::FailFast
    }
}

impl fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateOptions")
            .field("engine", &self.engine)
            .field("error_mode", &self.error_mode)
            .field("ai_handler", &self.ai_handler.is_some())
            .field("ai_validation_handler", &self.ai_validation_handler.is_some())
            .field("context", &self.context)
            .field("max_passes", &self.max_passes)
            .finish()
    }
}

/// Successful result of one `create()` call
#[derive(Debug, Clone, Serialize)]
pub struct ConstructionResult {
    /// The fully coerced, normalized, validated instance as a JSON object
    pub instance: Value,
    /// Audit log of every step execution
    pub trace: Trace,
    /// Optional metadata about the construction process
    pub metadata: Option<ConstructionMetadata>,
}

impl ConstructionResult {
    /// Convenience accessor for one field of the instance
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.instance.get(name)
    }
}

/// Metadata describing how a construction was performed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionMetadata {
    /// The class the instance was built against, after discriminator routing
    pub class_id: String,
    /// Strategy that ran
    pub engine: EngineStrategy,
    /// Failure reporting mode in effect
    pub error_mode: ErrorMode,
    /// RFC3339 timestamp of the call
    pub timestamp: String,
    /// Wall-clock duration of the call
    pub duration_ms: Option<u64>,
    /// Number of passes the convergent engine ran (`None` for single-pass)
    pub passes: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = CreateOptions::default();
        assert_eq!(options.engine, EngineStrategy::Convergent);
        assert_eq!(options.error_mode, ErrorMode::FailFast);
        assert!(options.ai_handler.is_none());
        assert!(options.max_passes.is_none());
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(EngineStrategy::Convergent.to_string(), "convergent");
        assert_eq!(EngineStrategy::SinglePass.to_string(), "single-pass");
        assert_eq!(ErrorMode::CollectAll.to_string(), "collect-all");
    }

    #[test]
    fn test_snapshot_access() {
        let mut values = IndexMap::new();
        values.insert("status".to_string(), json!("final"));
        values.insert("notes".to_string(), Value::Null);

        let snapshot = Snapshot::new(&values);
        assert_eq!(snapshot.get("status"), Some(&json!("final")));
        assert!(snapshot.is_present("status"));
        assert!(!snapshot.is_present("notes"));
        assert!(!snapshot.is_present("missing"));

        let object = snapshot.to_value();
        assert_eq!(object["status"], json!("final"));
        assert_eq!(object["notes"], Value::Null);
    }
}
