//! Error aggregation: fail-fast and collect-all outcome assembly
//!
//! Under fail-fast the first terminal failure aborts the whole call, carrying
//! the trace collected so far. Under collect-all every field that dependencies
//! allow is still evaluated; failures are gathered into one aggregate error,
//! and fields blocked by a failed upstream dependency are reported as skipped
//! rather than silently omitted.

use crate::error::Error;
use crate::trace::Trace;
use crate::types::{ErrorMode, FieldFailure, SkippedField};

/// What the engine should do after recording a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Abort the call immediately (fail-fast)
    Abort,
    /// Keep evaluating remaining fields (collect-all)
    Continue,
}

/// Collects terminal failures and skipped fields for one invocation
#[derive(Debug)]
pub(crate) struct ErrorAggregator {
    mode: ErrorMode,
    failures: Vec<FieldFailure>,
    skipped: Vec<SkippedField>,
}

impl ErrorAggregator {
    pub fn new(mode: ErrorMode) -> Self {
        Self {
            mode,
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Record a terminal failure; the returned disposition tells the engine
    /// whether to abort
    pub fn record_failure(&mut self, failure: FieldFailure) -> Disposition {
        log::debug!(
            "field '{}' failed at {} step: {}",
            failure.field,
            failure.step_kind,
            failure.message
        );
        self.failures.push(failure);
        match self.mode {
            ErrorMode::FailFast => Disposition::Abort,
            ErrorMode::CollectAll => Disposition::Continue,
        }
    }

    /// Record a field that could not be evaluated because of a failed upstream
    pub fn record_skipped(&mut self, skipped: SkippedField) {
        log::debug!("field '{}' skipped: {}", skipped.field, skipped.reason);
        self.skipped.push(skipped);
    }

    /// Build the fail-fast error from the single recorded failure
    pub fn into_fail_fast_error(mut self, trace: Trace) -> Error {
        let failure = self
            .failures
            .pop()
            .unwrap_or_else(|| FieldFailure {
                field: "<unknown>".to_string(),
                step_kind: crate::trace::StepKind::Validation,
                message: "failure recorded without detail".to_string(),
                attempts: 0,
            });
        Error::FieldValidation { failure, trace }
    }

    /// Finish the invocation: pass the trace back on success, or wrap the
    /// collected failures and skips into an aggregate error
    pub fn finish(self, trace: Trace) -> Result<Trace, Error> {
        if self.failures.is_empty() {
            Ok(trace)
        } else {
            Err(Error::AggregateValidation {
                failures: self.failures,
                skipped: self.skipped,
                trace,
            })
        }
    }
}
