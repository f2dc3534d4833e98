//! Single-pass execution strategy: one topological sweep, no cycles
//!
//! The dependency graph is sorted before any step executes; a cycle aborts the
//! call with the offending fields and zero side effects. Each field is then
//! evaluated exactly once, in topological order, so every dependency is
//! already terminal when a field is reached. A deferral under this engine is
//! impossible by construction and is reported as an engine defect rather than
//! a control-flow signal.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use super::aggregator::{Disposition, ErrorAggregator};
use super::context::ExecutionContext;
use super::interpreter::{FieldEvalOutcome, Interpreter, ReadReadiness};
use crate::error::{Error, Result};
use crate::shape::CompiledShape;
use crate::types::{CreateOptions, SkippedField};
use std::collections::HashMap;

/// Run the single-pass engine
pub(crate) async fn run(
    compiled: &CompiledShape,
    ctx: &mut ExecutionContext,
    options: &CreateOptions,
) -> Result<()> {
    let order = compiled
        .graph
        .topological_order()
        .map_err(|members| Error::CyclicDependency {
            class_id: compiled.class_id.clone(),
            members,
        })?;

    let interpreter = Interpreter { compiled, options };
    let mut aggregator = ErrorAggregator::new(options.error_mode);
    let mut readiness: HashMap<String, ReadReadiness> = compiled
        .field_names()
        .into_iter()
        .map(|name| (name, ReadReadiness::Pending))
        .collect();

    for name in order {
        let idx = *compiled
            .field_index
            .get(&name)
            .ok_or_else(|| Error::internal(format!("field '{}' missing from index", name)))?;

        let outcome = interpreter
            .evaluate_field(idx, 0, ctx, &readiness, 1)
            .await;
        match outcome {
            FieldEvalOutcome::Completed => {
                readiness.insert(name, ReadReadiness::Ready);
            }
            FieldEvalOutcome::Failed(failure) => {
                readiness.insert(name, ReadReadiness::Terminal);
                if aggregator.record_failure(failure) == Disposition::Abort {
                    return Err(aggregator.into_fail_fast_error(std::mem::take(&mut ctx.trace)));
                }
            }
            FieldEvalOutcome::Skipped { reason } => {
                readiness.insert(name.clone(), ReadReadiness::Terminal);
                aggregator.record_skipped(SkippedField {
                    field: name,
                    reason,
                });
            }
            FieldEvalOutcome::Deferred { reason, .. } => {
                return Err(Error::internal(format!(
                    "deferred outcome under single-pass engine for field '{}': {}",
                    name, reason
                )));
            }
        }
    }

    ctx.trace = aggregator.finish(std::mem::take(&mut ctx.trace))?;
    Ok(())
}
