//! Step interpreter: executes one field's pipeline against the context
//!
//! Both engines drive the same interpreter; they differ only in visitation
//! order and in how they react to deferrals. The interpreter walks a field's
//! step list from a resume point, consults the conditional resolver for
//! marker jumps, checks every step's declared reads against the readiness the
//! engine supplies, executes the step, and appends exactly one trace entry
//! per executed (or deferred) step.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use super::conditional;
use super::context::ExecutionContext;
use crate::ai::{AiInvocation, AiStepResult};
use crate::builtins;
use crate::shape::{CompiledShape, StepDescriptor};
use crate::trace::{StepKind, TraceOutcome};
use crate::types::{CreateOptions, FieldFailure, ValidationOutcome};
use std::collections::HashMap;

/// What a step may assume about one of its declared reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadReadiness {
    /// The field's value is settled; reading it is sound
    Ready,
    /// The field is still being evaluated (convergent engine only)
    Pending,
    /// The field failed or was skipped; dependents cannot be evaluated
    Terminal,
}

/// Result of evaluating one field from its resume point
#[derive(Debug)]
pub(crate) enum FieldEvalOutcome {
    /// Every remaining step ran; the field is stable
    Completed,
    /// A step's dependency is unresolved; re-enter at `resume_at` next pass
    Deferred { resume_at: usize, reason: String },
    /// A validation step (or exhausted AI step) terminally rejected the field
    Failed(FieldFailure),
    /// An upstream dependency failed; the field cannot be evaluated
    Skipped { reason: String },
}

enum ReadCheck {
    Ready,
    Unresolved(String),
    Blocked(String),
}

fn check_reads(reads: &[String], readiness: &HashMap<String, ReadReadiness>) -> ReadCheck {
    let mut unresolved = None;
    for read in reads {
        match readiness.get(read) {
            Some(ReadReadiness::Terminal) => return ReadCheck::Blocked(read.clone()),
            Some(ReadReadiness::Pending) => {
                unresolved.get_or_insert_with(|| read.clone());
            }
            _ => {}
        }
    }
    match unresolved {
        Some(field) => ReadCheck::Unresolved(field),
        None => ReadCheck::Ready,
    }
}

/// Shared step executor for both engines
pub(crate) struct Interpreter<'a> {
    pub compiled: &'a CompiledShape,
    pub options: &'a CreateOptions,
}

impl Interpreter<'_> {
    /// Evaluate one field's steps starting at `from_step`
    ///
    /// `readiness` must cover every field of the shape. `pass` is recorded as
    /// the attempt number for rule-based steps; AI steps count their own
    /// attempts.
    pub async fn evaluate_field(
        &self,
        field_idx: usize,
        from_step: usize,
        ctx: &mut ExecutionContext,
        readiness: &HashMap<String, ReadReadiness>,
        pass: u32,
    ) -> FieldEvalOutcome {
        let field = &self.compiled.fields[field_idx];
        let name = field.spec.name.clone();
        let step_count = field.spec.steps.len();

        // Explicitly declared dependencies gate the whole evaluation.
        let explicit: Vec<String> = field.spec.depends_on.iter().cloned().collect();
        match check_reads(&explicit, readiness) {
            ReadCheck::Blocked(dep) => {
                return FieldEvalOutcome::Skipped {
                    reason: format!("dependency '{}' failed", dep),
                };
            }
            ReadCheck::Unresolved(dep) => {
                let reason = format!("waiting on field '{}'", dep);
                if let Some(step) = field.spec.steps.get(from_step) {
                    let current = ctx.value_of(&name).clone();
                    ctx.trace.record(
                        &name,
                        step.kind(),
                        current.clone(),
                        current,
                        TraceOutcome::Deferred(reason.clone()),
                        pass,
                    );
                }
                return FieldEvalOutcome::Deferred {
                    resume_at: from_step,
                    reason,
                };
            }
            ReadCheck::Ready => {}
        }

        let mut idx = from_step;
        while idx < step_count {
            let step = &field.spec.steps[idx];

            // Readiness gate for this step's own reads.
            match check_reads(&field.step_reads[idx], readiness) {
                ReadCheck::Blocked(dep) => {
                    return FieldEvalOutcome::Skipped {
                        reason: format!("dependency '{}' failed", dep),
                    };
                }
                ReadCheck::Unresolved(dep) => {
                    let reason = match step {
                        StepDescriptor::ConditionalBegin { predicate } => format!(
                            "predicate '{}' waits on field '{}'",
                            predicate.describe(),
                            dep
                        ),
                        _ => format!("waiting on field '{}'", dep),
                    };
                    let current = ctx.value_of(&name).clone();
                    ctx.trace.record(
                        &name,
                        step.kind(),
                        current.clone(),
                        current,
                        TraceOutcome::Deferred(reason.clone()),
                        pass,
                    );
                    return FieldEvalOutcome::Deferred {
                        resume_at: idx,
                        reason,
                    };
                }
                ReadCheck::Ready => {}
            }

            match step {
                StepDescriptor::ConditionalBegin { predicate } => {
                    let taken = predicate.evaluate(&ctx.snapshot());
                    idx = conditional::next_index_for_begin(field, idx, taken);
                }
                StepDescriptor::ConditionalElse => {
                    idx = conditional::next_index_for_else(field, idx);
                }
                StepDescriptor::ConditionalEnd => {
                    idx += 1;
                }
                StepDescriptor::Coercion { kind, .. } => {
                    let before = ctx.value_of(&name).clone();
                    let after = builtins::apply_coercion(kind, &before);
                    ctx.trace.record(
                        &name,
                        StepKind::Coercion,
                        before,
                        after.clone(),
                        TraceOutcome::Updated,
                        pass,
                    );
                    ctx.set_value(&name, after);
                    idx += 1;
                }
                StepDescriptor::Normalization { kind, .. } => {
                    let before = ctx.value_of(&name).clone();
                    let after = builtins::apply_normalization(kind, &before);
                    ctx.trace.record(
                        &name,
                        StepKind::Normalization,
                        before,
                        after.clone(),
                        TraceOutcome::Updated,
                        pass,
                    );
                    ctx.set_value(&name, after);
                    idx += 1;
                }
                StepDescriptor::DataSource { resolve, .. } => {
                    let before = ctx.value_of(&name).clone();
                    let after = resolve(&ctx.snapshot(), &ctx.context);
                    ctx.trace.record(
                        &name,
                        StepKind::DataSource,
                        before,
                        after.clone(),
                        TraceOutcome::Updated,
                        pass,
                    );
                    ctx.set_value(&name, after);
                    idx += 1;
                }
                StepDescriptor::Validation { check, .. } => {
                    let value = ctx.value_of(&name).clone();
                    let outcome = builtins::run_check(check, &value, &ctx.snapshot());
                    match outcome {
                        ValidationOutcome::Pass => {
                            ctx.trace.record(
                                &name,
                                StepKind::Validation,
                                value.clone(),
                                value,
                                TraceOutcome::Pass,
                                pass,
                            );
                            idx += 1;
                        }
                        ValidationOutcome::Fail(message) => {
                            ctx.trace.record(
                                &name,
                                StepKind::Validation,
                                value.clone(),
                                value,
                                TraceOutcome::Fail(message.clone()),
                                pass,
                            );
                            return FieldEvalOutcome::Failed(FieldFailure {
                                field: name,
                                step_kind: StepKind::Validation,
                                message,
                                attempts: 1,
                            });
                        }
                        ValidationOutcome::Deferred(reason) => {
                            ctx.trace.record(
                                &name,
                                StepKind::Validation,
                                value.clone(),
                                value,
                                TraceOutcome::Deferred(reason.clone()),
                                pass,
                            );
                            return FieldEvalOutcome::Deferred {
                                resume_at: idx,
                                reason,
                            };
                        }
                    }
                }
                StepDescriptor::AiTransform {
                    max_retries,
                    metadata,
                } => {
                    let Some(handler) = &self.options.ai_handler else {
                        return FieldEvalOutcome::Failed(FieldFailure {
                            field: name,
                            step_kind: StepKind::AiTransform,
                            message: "no ai_handler supplied in options".to_string(),
                            attempts: 0,
                        });
                    };
                    let caller_context = ctx.context.clone();
                    let snapshot_value = ctx.snapshot().to_value();
                    let current = ctx.value_of(&name).clone();
                    let invocation = AiInvocation {
                        handler: handler.as_ref(),
                        kind: StepKind::AiTransform,
                        field_name: &name,
                        class_id: &self.compiled.class_id,
                        max_retries: *max_retries,
                        metadata,
                        context: &caller_context,
                    };
                    match invocation.run(&current, snapshot_value, &mut ctx.trace).await {
                        AiStepResult::Updated(value) => {
                            ctx.set_value(&name, value);
                            idx += 1;
                        }
                        AiStepResult::Outcome { outcome, attempts } => {
                            // A transform handler has no verdict channel; any
                            // non-Updated result is a defect surfaced as failure.
                            let message = match outcome {
                                ValidationOutcome::Fail(m) => m,
                                other => format!("unexpected transform outcome: {:?}", other),
                            };
                            return FieldEvalOutcome::Failed(FieldFailure {
                                field: name,
                                step_kind: StepKind::AiTransform,
                                message,
                                attempts,
                            });
                        }
                        AiStepResult::Exhausted { message, attempts } => {
                            return FieldEvalOutcome::Failed(FieldFailure {
                                field: name,
                                step_kind: StepKind::AiTransform,
                                message,
                                attempts,
                            });
                        }
                    }
                }
                StepDescriptor::AiValidate {
                    max_retries,
                    metadata,
                } => {
                    let Some(handler) = &self.options.ai_validation_handler else {
                        return FieldEvalOutcome::Failed(FieldFailure {
                            field: name,
                            step_kind: StepKind::AiValidate,
                            message: "no ai_validation_handler supplied in options".to_string(),
                            attempts: 0,
                        });
                    };
                    let caller_context = ctx.context.clone();
                    let snapshot_value = ctx.snapshot().to_value();
                    let current = ctx.value_of(&name).clone();
                    let invocation = AiInvocation {
                        handler: handler.as_ref(),
                        kind: StepKind::AiValidate,
                        field_name: &name,
                        class_id: &self.compiled.class_id,
                        max_retries: *max_retries,
                        metadata,
                        context: &caller_context,
                    };
                    match invocation.run(&current, snapshot_value, &mut ctx.trace).await {
                        AiStepResult::Outcome {
                            outcome: ValidationOutcome::Pass,
                            ..
                        } => {
                            idx += 1;
                        }
                        AiStepResult::Outcome {
                            outcome: ValidationOutcome::Fail(message),
                            attempts,
                        } => {
                            return FieldEvalOutcome::Failed(FieldFailure {
                                field: name,
                                step_kind: StepKind::AiValidate,
                                message,
                                attempts,
                            });
                        }
                        AiStepResult::Outcome {
                            outcome: ValidationOutcome::Deferred(reason),
                            ..
                        } => {
                            return FieldEvalOutcome::Deferred {
                                resume_at: idx,
                                reason,
                            };
                        }
                        AiStepResult::Updated(_) => {
                            return FieldEvalOutcome::Failed(FieldFailure {
                                field: name,
                                step_kind: StepKind::AiValidate,
                                message: "ai validation produced a value update".to_string(),
                                attempts: 1,
                            });
                        }
                        AiStepResult::Exhausted { message, attempts } => {
                            return FieldEvalOutcome::Failed(FieldFailure {
                                field: name,
                                step_kind: StepKind::AiValidate,
                                message,
                                attempts,
                            });
                        }
                    }
                }
            }
        }

        FieldEvalOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::compile::compile;
    use crate::shape::{
        CoercionKind, FieldSpec, NormalizationKind, Predicate, TargetShape, ValidationCheck,
    };
    use serde_json::json;

    fn ready_map(compiled: &CompiledShape) -> HashMap<String, ReadReadiness> {
        compiled
            .field_names()
            .into_iter()
            .map(|name| (name, ReadReadiness::Ready))
            .collect()
    }

    async fn evaluate_single(
        compiled: &CompiledShape,
        field: &str,
        ctx: &mut ExecutionContext,
        readiness: &HashMap<String, ReadReadiness>,
    ) -> FieldEvalOutcome {
        let options = CreateOptions::default();
        let interp = Interpreter {
            compiled,
            options: &options,
        };
        let idx = compiled.field_index[field];
        interp.evaluate_field(idx, 0, ctx, readiness, 1).await
    }

    #[tokio::test]
    async fn test_pipeline_runs_in_order() {
        let compiled = compile(
            &TargetShape::builder("order")
                .field(
                    FieldSpec::builder("email")
                        .normalize(NormalizationKind::Trim)
                        .normalize(NormalizationKind::Lowercase)
                        .validate(ValidationCheck::Required)
                        .build(),
                )
                .build(),
        )
        .unwrap();
        let mut ctx = ExecutionContext::seed(
            &compiled,
            json!({"email": "  JOHN@EXAMPLE.COM  "}),
            serde_json::Value::Null,
        );
        let readiness = ready_map(&compiled);

        let outcome = evaluate_single(&compiled, "email", &mut ctx, &readiness).await;
        assert!(matches!(outcome, FieldEvalOutcome::Completed));
        assert_eq!(ctx.value_of("email"), &json!("john@example.com"));
        assert_eq!(ctx.trace.len(), 3);
    }

    #[tokio::test]
    async fn test_validation_failure_stops_field() {
        let compiled = compile(
            &TargetShape::builder("order")
                .field(
                    FieldSpec::builder("quantity")
                        .coerce(CoercionKind::Number)
                        .validate(ValidationCheck::Range {
                            min: Some(1.0),
                            max: None,
                        })
                        .validate(ValidationCheck::Required)
                        .build(),
                )
                .build(),
        )
        .unwrap();
        let mut ctx = ExecutionContext::seed(
            &compiled,
            json!({"quantity": "zero"}),
            serde_json::Value::Null,
        );
        let readiness = ready_map(&compiled);

        let outcome = evaluate_single(&compiled, "quantity", &mut ctx, &readiness).await;
        match outcome {
            FieldEvalOutcome::Failed(failure) => {
                assert_eq!(failure.field, "quantity");
                assert_eq!(failure.step_kind, StepKind::Validation);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        // Coercion entry plus the failing range check; the later Required
        // check never ran.
        assert_eq!(ctx.trace.len(), 2);
    }

    #[tokio::test]
    async fn test_unresolved_predicate_defers_field() {
        let compiled = compile(
            &TargetShape::builder("report")
                .field(FieldSpec::builder("status").build())
                .field(
                    FieldSpec::builder("approval_notes")
                        .when(Predicate::field_equals("status", "final"))
                        .validate(ValidationCheck::Required)
                        .end_when()
                        .build(),
                )
                .build(),
        )
        .unwrap();
        let mut ctx =
            ExecutionContext::seed(&compiled, json!({"status": "final"}), serde_json::Value::Null);
        let mut readiness = ready_map(&compiled);
        readiness.insert("status".to_string(), ReadReadiness::Pending);

        let outcome = evaluate_single(&compiled, "approval_notes", &mut ctx, &readiness).await;
        match outcome {
            FieldEvalOutcome::Deferred { resume_at, reason } => {
                assert_eq!(resume_at, 0);
                assert!(reason.contains("status"));
            }
            other => panic!("expected deferral, got {:?}", other),
        }
        assert_eq!(
            ctx.trace.entries()[0].step_kind,
            StepKind::ConditionalBegin
        );
    }

    #[tokio::test]
    async fn test_failed_dependency_skips_field() {
        let compiled = compile(
            &TargetShape::builder("report")
                .field(FieldSpec::builder("status").build())
                .field(
                    FieldSpec::builder("approval_notes")
                        .when(Predicate::field_equals("status", "final"))
                        .validate(ValidationCheck::Required)
                        .end_when()
                        .build(),
                )
                .build(),
        )
        .unwrap();
        let mut ctx = ExecutionContext::seed(&compiled, json!({}), serde_json::Value::Null);
        let mut readiness = ready_map(&compiled);
        readiness.insert("status".to_string(), ReadReadiness::Terminal);

        let outcome = evaluate_single(&compiled, "approval_notes", &mut ctx, &readiness).await;
        match outcome {
            FieldEvalOutcome::Skipped { reason } => assert!(reason.contains("status")),
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_untaken_conditional_leaves_value_unchanged() {
        let compiled = compile(
            &TargetShape::builder("report")
                .field(FieldSpec::builder("status").build())
                .field(
                    FieldSpec::builder("approval_notes")
                        .when(Predicate::field_equals("status", "final"))
                        .validate(ValidationCheck::Required)
                        .end_when()
                        .build(),
                )
                .build(),
        )
        .unwrap();
        let mut ctx =
            ExecutionContext::seed(&compiled, json!({"status": "draft"}), serde_json::Value::Null);
        let readiness = ready_map(&compiled);

        let outcome = evaluate_single(&compiled, "approval_notes", &mut ctx, &readiness).await;
        assert!(matches!(outcome, FieldEvalOutcome::Completed));
        assert_eq!(ctx.value_of("approval_notes"), &serde_json::Value::Null);
        // Nothing inside the untaken span executed or traced
        assert!(ctx.trace.is_empty());
    }

    #[tokio::test]
    async fn test_missing_ai_handler_is_field_failure() {
        let compiled = compile(
            &TargetShape::builder("report")
                .field(
                    FieldSpec::builder("summary")
                        .ai_transform(3, Default::default())
                        .build(),
                )
                .build(),
        )
        .unwrap();
        let mut ctx = ExecutionContext::seed(&compiled, json!({}), serde_json::Value::Null);
        let readiness = ready_map(&compiled);

        let outcome = evaluate_single(&compiled, "summary", &mut ctx, &readiness).await;
        match outcome {
            FieldEvalOutcome::Failed(failure) => {
                assert_eq!(failure.step_kind, StepKind::AiTransform);
                assert!(failure.message.contains("ai_handler"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
