//! Convergent execution strategy: iterate field evaluation to a fixed point
//!
//! Fields are visited in declaration order, pass after pass, until every field
//! reaches a terminal state. Each field keeps a resume cursor so steps that
//! already ran are never re-executed on later passes; in particular, AI steps
//! are never re-invoked by iteration alone. A field whose remaining steps
//! cannot mutate its value counts as value-settled, which is what lets
//! mutually dependent validations converge: each side's value settles before
//! either side's cross-field check runs.
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    Pending { resume: usize },
    Stable,
    Failed,
    Skipped,
}

/// Run the convergent engine; returns the number of passes taken
pub(crate) async fn run(
    compiled: &CompiledShape,
    ctx: &mut ExecutionContext,
    options: &CreateOptions,
) -> Result<usize> {
    let field_count = compiled.fields.len();
    let budget = options
        .max_passes
        .unwrap_or_else(|| field_count.saturating_mul(4))
        .max(1);
    let interpreter = Interpreter { compiled, options };
    let mut aggregator = ErrorAggregator::new(options.error_mode);
    let mut states = vec![FieldState::Pending { resume: 0 }; field_count];
    let mut passes = 0usize;

    loop {
        let pending: Vec<usize> = states
            .iter()
            .enumerate()
            .filter_map(|(idx, state)| match state {
                FieldState::Pending { .. } => Some(idx),
                _ => None,
            })
            .collect();
        if pending.is_empty() {
            break;
        }
        if passes >= budget {
            return Err(Error::Convergence {
                class_id: compiled.class_id.clone(),
                passes,
                unstable: names_of(compiled, &pending),
            });
        }
        passes += 1;
        log::debug!(
            "convergent pass {} over '{}': {} field(s) unstable",
            passes,
            compiled.class_id,
            pending.len()
        );

        let mut progressed = false;
        for idx in pending {
            let resume = match states[idx] {
                FieldState::Pending { resume } => resume,
                _ => continue,
            };
            let readiness = readiness_map(compiled, &states);
            let outcome = interpreter
                .evaluate_field(idx, resume, ctx, &readiness, passes as u32)
                .await;
            match outcome {
                FieldEvalOutcome::Completed => {
                    states[idx] = FieldState::Stable;
                    progressed = true;
                }
                FieldEvalOutcome::Failed(failure) => {
                    states[idx] = FieldState::Failed;
                    progressed = true;
                    if aggregator.record_failure(failure) == Disposition::Abort {
                        return Err(
                            aggregator.into_fail_fast_error(std::mem::take(&mut ctx.trace))
                        );
                    }
                }
                FieldEvalOutcome::Skipped { reason } => {
                    states[idx] = FieldState::Skipped;
                    progressed = true;
                    aggregator.record_skipped(SkippedField {
                        field: compiled.fields[idx].spec.name.clone(),
                        reason,
                    });
                }
                FieldEvalOutcome::Deferred { resume_at, .. } => {
                    if resume_at > resume {
                        progressed = true;
                    }
                    states[idx] = FieldState::Pending { resume: resume_at };
                }
            }
        }

        if !progressed {
            let pending: Vec<usize> = states
                .iter()
                .enumerate()
                .filter_map(|(idx, state)| match state {
                    FieldState::Pending { .. } => Some(idx),
                    _ => None,
                })
                .collect();
            return Err(Error::Convergence {
                class_id: compiled.class_id.clone(),
                passes,
                unstable: names_of(compiled, &pending),
            });
        }
    }

    ctx.trace = aggregator.finish(std::mem::take(&mut ctx.trace))?;
    Ok(passes)
}

fn names_of(compiled: &CompiledShape, indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .map(|&idx| compiled.fields[idx].spec.name.clone())
        .collect()
}

/// Per-field readiness as seen by whichever field is evaluated next
fn readiness_map(
    compiled: &CompiledShape,
    states: &[FieldState],
) -> HashMap<String, ReadReadiness> {
    compiled
        .fields
        .iter()
        .zip(states)
        .map(|(field, state)| {
            let readiness = match state {
                FieldState::Stable => ReadReadiness::Ready,
                FieldState::Failed | FieldState::Skipped => ReadReadiness::Terminal,
                FieldState::Pending { resume } => {
                    // Value-settled: no remaining step can mutate the value,
                    // so dependents may read it even though checks remain.
                    if field.mutates_at_or_after(*resume) {
                        ReadReadiness::Pending
                    } else {
                        ReadReadiness::Ready
                    }
                }
            };
            (field.spec.name.clone(), readiness)
        })
        .collect()
}
