//! Trace recorder for step-by-step construction audit trails
//!
//! Every step the interpreter executes, including deferred evaluations and
//! retried AI attempts, appends one entry here. The trace is owned by a single
//! `create()` invocation and is returned to the caller with the result, or
//! attached to the error when construction fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The category of a processing step, mirroring the step descriptor variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Best-effort type coercion
    Coercion,
    /// Canonicalizing transformation (trim, case folding, defaults)
    Normalization,
    /// Rule-based validation check
    Validation,
    /// AI-backed value transformation
    AiTransform,
    /// AI-backed validation check
    AiValidate,
    /// Value derived from other fields or caller context
    DataSource,
    /// Conditional span opener (recorded only when its predicate defers)
    ConditionalBegin,
    /// Conditional span alternative marker
    ConditionalElse,
    /// Conditional span terminator
    ConditionalEnd,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Coercion => "coercion",
            StepKind::Normalization => "normalization",
            StepKind::Validation => "validation",
            StepKind::AiTransform => "ai-transform",
            StepKind::AiValidate => "ai-validate",
            StepKind::DataSource => "data-source",
            StepKind::ConditionalBegin => "conditional-begin",
            StepKind::ConditionalElse => "conditional-else",
            StepKind::ConditionalEnd => "conditional-end",
        };
        write!(f, "{}", name)
    }
}

/// Classified outcome of one step execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TraceOutcome {
    /// The step produced a (possibly identical) replacement value
    Updated,
    /// A validation step accepted the value
    Pass,
    /// A validation step rejected the value, or an AI attempt failed
    Fail(String),
    /// The step could not run yet because a dependency is unresolved
    Deferred(String),
}

impl TraceOutcome {
    /// Whether this outcome is terminal for the attempt it belongs to
    pub fn is_failure(&self) -> bool {
        matches!(self, TraceOutcome::Fail(_))
    }
}

/// Record of a single step execution against a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Field the step was applied to
    pub field_name: String,
    /// Category of the step
    pub step_kind: StepKind,
    /// Field value before the step ran
    pub value_before: Value,
    /// Field value after the step ran (unchanged for validations)
    pub value_after: Value,
    /// Classified outcome
    pub outcome: TraceOutcome,
    /// Evaluation pass for rule-based steps; retry attempt for AI steps
    pub attempt_number: u32,
    /// When this step executed
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit log of every step execution in one `create()` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append one entry
    pub fn record(
        &mut self,
        field_name: &str,
        step_kind: StepKind,
        value_before: Value,
        value_after: Value,
        outcome: TraceOutcome,
        attempt_number: u32,
    ) {
        self.entries.push(TraceEntry {
            field_name: field_name.to_string(),
            step_kind,
            value_before,
            value_after,
            outcome,
            attempt_number,
            timestamp: Utc::now(),
        });
    }

    /// All entries in execution order
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Entries touching one field, in execution order
    pub fn entries_for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a TraceEntry> {
        self.entries.iter().filter(move |e| e.field_name == field)
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any steps were recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute per-outcome counts for reporting
    pub fn summary(&self) -> TraceSummary {
        let mut summary = TraceSummary::default();
        for entry in &self.entries {
            summary.total += 1;
            match &entry.outcome {
                TraceOutcome::Updated => summary.updated += 1,
                TraceOutcome::Pass => summary.passed += 1,
                TraceOutcome::Fail(_) => summary.failed += 1,
                TraceOutcome::Deferred(_) => summary.deferred += 1,
            }
        }
        summary
    }
}

/// Aggregated counts over a trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub total: usize,
    pub updated: usize,
    pub passed: usize,
    pub failed: usize,
    pub deferred: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_query() {
        let mut trace = Trace::new();
        trace.record(
            "quantity",
            StepKind::Coercion,
            json!("five"),
            json!(5),
            TraceOutcome::Updated,
            1,
        );
        trace.record(
            "quantity",
            StepKind::Validation,
            json!(5),
            json!(5),
            TraceOutcome::Pass,
            1,
        );
        trace.record(
            "email",
            StepKind::Validation,
            json!("nope"),
            json!("nope"),
            TraceOutcome::Fail("value does not match pattern".to_string()),
            1,
        );

        assert_eq!(trace.len(), 3);
        assert_eq!(trace.entries_for_field("quantity").count(), 2);
        assert!(trace.entries()[2].outcome.is_failure());
    }

    #[test]
    fn test_summary_counts() {
        let mut trace = Trace::new();
        trace.record(
            "a",
            StepKind::Coercion,
            json!(null),
            json!(0),
            TraceOutcome::Updated,
            1,
        );
        trace.record(
            "a",
            StepKind::Validation,
            json!(0),
            json!(0),
            TraceOutcome::Pass,
            1,
        );
        trace.record(
            "b",
            StepKind::Validation,
            json!(null),
            json!(null),
            TraceOutcome::Deferred("waiting on field 'a'".to_string()),
            1,
        );

        let summary = trace.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_step_kind_display() {
        assert_eq!(StepKind::AiTransform.to_string(), "ai-transform");
        assert_eq!(StepKind::ConditionalBegin.to_string(), "conditional-begin");
    }

    #[test]
    fn test_trace_serializes() {
        let mut trace = Trace::new();
        trace.record(
            "a",
            StepKind::Normalization,
            json!(" x "),
            json!("x"),
            TraceOutcome::Updated,
            1,
        );
        let serialized = serde_json::to_value(&trace).expect("trace should serialize");
        assert_eq!(serialized["entries"][0]["field_name"], json!("a"));
    }
}
