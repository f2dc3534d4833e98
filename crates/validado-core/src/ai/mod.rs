//! AI step adapter: caller-supplied asynchronous handlers with retry-with-context
//!
//! The engine has zero knowledge of prompts, models, or transport. AI-backed
//! steps call whatever handler the caller supplied through `CreateOptions`,
//! feeding it the current value, an instance snapshot, caller context, and
//! attempt metadata. On retry the prior failure is carried into the next
//! attempt so the handler can adjust its behavior (e.g. build a corrective
//! prompt). The adapter itself holds no retry policy beyond counting attempts;
//! an optional inter-attempt delay is read from step metadata.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use crate::trace::{StepKind, Trace, TraceOutcome};
use crate::types::ValidationOutcome;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Everything a handler gets to see for one attempt
#[derive(Debug, Clone)]
pub struct AiHandlerParams {
    /// Current value of the field being processed
    pub value: Value,
    /// Snapshot of the in-progress instance as a JSON object
    pub instance_snapshot: Value,
    /// Arbitrary caller data from `CreateOptions::context`
    pub context: Value,
    /// Field the step is attached to
    pub field_name: String,
    /// Class the instance is being built against (post-routing)
    pub class_id: String,
    /// Failure message from the previous attempt, if this is a retry
    pub previous_error: Option<String>,
    /// 1-based attempt counter
    pub attempt_number: u32,
    /// Total attempt budget for the step
    pub max_retries: u32,
    /// Free-form step metadata, passed through verbatim
    pub metadata: HashMap<String, Value>,
}

/// Failure modes a handler can report
#[derive(Error, Debug, Clone)]
pub enum AiHandlerError {
    /// The attempt failed; the adapter may retry with this message as context
    #[error("{0}")]
    Failed(String),

    /// The caller cancelled or timed out the invocation
    ///
    /// Cancellation is terminal: it is never retried and never deferred, so a
    /// cancelled step cannot keep the convergent engine iterating.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

/// Caller-supplied asynchronous handler for AI-backed steps
///
/// For `AiTransform` steps the returned value replaces the field value. For
/// `AiValidate` steps the returned value is interpreted as a verdict: boolean
/// `true` passes, boolean `false` fails with a generic message, and a string
/// fails with that string as the message.
#[async_trait]
pub trait AiHandler: Send + Sync {
    async fn invoke(&self, params: AiHandlerParams) -> Result<Value, AiHandlerError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> AiHandler for FnHandler<F>
where
    F: Fn(AiHandlerParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, AiHandlerError>> + Send,
{
    async fn invoke(&self, params: AiHandlerParams) -> Result<Value, AiHandlerError> {
        (self.0)(params).await
    }
}

/// Wrap a plain async closure as an [`AiHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn AiHandler>
where
    F: Fn(AiHandlerParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, AiHandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Metadata key holding an optional delay between attempts, in milliseconds
pub const RETRY_DELAY_MS_KEY: &str = "retry_delay_ms";

/// Outcome of driving one AI step to completion
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AiStepResult {
    /// Transform succeeded with a replacement value
    Updated(Value),
    /// Validate reached a verdict
    Outcome {
        outcome: ValidationOutcome,
        attempts: u32,
    },
    /// All attempts failed; message describes the last failure
    Exhausted { message: String, attempts: u32 },
}

/// Invocation parameters shared across the attempts of one step
pub(crate) struct AiInvocation<'a> {
    pub handler: &'a dyn AiHandler,
    pub kind: StepKind,
    pub field_name: &'a str,
    pub class_id: &'a str,
    pub max_retries: u32,
    pub metadata: &'a HashMap<String, Value>,
    pub context: &'a Value,
}

impl<'a> AiInvocation<'a> {
    /// Drive the handler through up to `max_retries` attempts, appending one
    /// trace entry per attempt
    pub async fn run(
        &self,
        current_value: &Value,
        instance_snapshot: Value,
        trace: &mut Trace,
    ) -> AiStepResult {
        let max_attempts = self.max_retries.max(1);
        let delay_ms = self
            .metadata
            .get(RETRY_DELAY_MS_KEY)
            .and_then(Value::as_u64);
        let mut previous_error: Option<String> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                if let Some(ms) = delay_ms {
                    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                }
            }

            let params = AiHandlerParams {
                value: current_value.clone(),
                instance_snapshot: instance_snapshot.clone(),
                context: self.context.clone(),
                field_name: self.field_name.to_string(),
                class_id: self.class_id.to_string(),
                previous_error: previous_error.clone(),
                attempt_number: attempt,
                max_retries: max_attempts,
                metadata: self.metadata.clone(),
            };

            match self.handler.invoke(params).await {
                Ok(value) => {
                    return self.classify_success(value, current_value, attempt, trace);
                }
                Err(AiHandlerError::Cancelled(reason)) => {
                    let message = format!("cancelled: {}", reason);
                    trace.record(
                        self.field_name,
                        self.kind,
                        current_value.clone(),
                        current_value.clone(),
                        TraceOutcome::Fail(message.clone()),
                        attempt,
                    );
                    return AiStepResult::Exhausted { message, attempts: attempt };
                }
                Err(AiHandlerError::Failed(message)) => {
                    log::debug!(
                        "ai {} attempt {}/{} failed for field '{}': {}",
                        self.kind,
                        attempt,
                        max_attempts,
                        self.field_name,
                        message
                    );
                    trace.record(
                        self.field_name,
                        self.kind,
                        current_value.clone(),
                        current_value.clone(),
                        TraceOutcome::Fail(message.clone()),
                        attempt,
                    );
                    previous_error = Some(message);
                }
            }
        }

        AiStepResult::Exhausted {
            message: previous_error
                .unwrap_or_else(|| "ai handler produced no result".to_string()),
            attempts: max_attempts,
        }
    }

    fn classify_success(
        &self,
        value: Value,
        current_value: &Value,
        attempt: u32,
        trace: &mut Trace,
    ) -> AiStepResult {
        match self.kind {
            StepKind::AiTransform => {
                trace.record(
                    self.field_name,
                    self.kind,
                    current_value.clone(),
                    value.clone(),
                    TraceOutcome::Updated,
                    attempt,
                );
                AiStepResult::Updated(value)
            }
            _ => {
                let outcome = match value {
                    Value::Bool(true) => ValidationOutcome::Pass,
                    Value::Bool(false) => {
                        ValidationOutcome::Fail("ai validation rejected the value".to_string())
                    }
                    Value::String(message) => ValidationOutcome::Fail(message),
                    other => ValidationOutcome::Fail(format!(
                        "ai validation handler returned unexpected result: {}",
                        other
                    )),
                };
                let trace_outcome = match &outcome {
                    ValidationOutcome::Pass => TraceOutcome::Pass,
                    ValidationOutcome::Fail(message) => TraceOutcome::Fail(message.clone()),
                    ValidationOutcome::Deferred(reason) => TraceOutcome::Deferred(reason.clone()),
                };
                trace.record(
                    self.field_name,
                    self.kind,
                    current_value.clone(),
                    current_value.clone(),
                    trace_outcome,
                    attempt,
                );
                AiStepResult::Outcome {
                    outcome,
                    attempts: attempt,
                }
            }
        }
    }
}
