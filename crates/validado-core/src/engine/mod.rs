//! Execution engines and the caller-facing `create()` entry point
//!
//! `create()` routes the raw input through the discriminator (when one is
//! registered), compiles and caches the target shape on first use, seeds an
//! execution context, and hands off to the selected strategy. Both strategies
//! share the step interpreter, conditional resolver, and error aggregator;
//! they differ only in visitation order and cycle tolerance.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

pub(crate) mod aggregator;
pub(crate) mod conditional;
pub(crate) mod context;
pub(crate) mod convergent;
pub(crate) mod interpreter;
pub(crate) mod single_pass;

use crate::error::Result;
use crate::shape::ShapeRegistry;
use crate::types::{
    ConstructionMetadata, ConstructionResult, CreateOptions, EngineStrategy,
};
use context::ExecutionContext;
use serde_json::Value;
use std::time::Instant;

/// Build one instance of a registered class from raw input
///
/// This is the primary public API of the engine. The raw input is a JSON
/// object (or anything JSON-like); declared fields absent from it start as
/// null, undeclared keys are ignored. On success the result carries the
/// coerced, normalized, validated instance plus the full step trace; on
/// failure the error carries the field-level breakdown and the trace up to
/// the failure.
///
/// # Arguments
///
/// * `class_id` - A class registered in the global [`ShapeRegistry`], or an
///   abstract class with a registered discriminator rule
/// * `raw_input` - The loosely-typed input (JSON, LLM output, form data)
/// * `options` - Engine strategy, error mode, AI handlers, caller context
///
/// # Errors
///
/// * [`Error::Shape`](crate::Error::Shape) - unknown class or malformed step
///   configuration (reported at first use, not at registration)
/// * [`Error::UnknownDiscriminator`](crate::Error::UnknownDiscriminator) -
///   routing failed against the raw input
/// * [`Error::CyclicDependency`](crate::Error::CyclicDependency) - single-pass
///   engine over a cyclic shape; raised before any step executes
/// * [`Error::Convergence`](crate::Error::Convergence) - convergent engine ran
///   out of passes without stabilizing
/// * [`Error::FieldValidation`](crate::Error::FieldValidation) /
///   [`Error::AggregateValidation`](crate::Error::AggregateValidation) -
///   data-quality failures, per the configured error mode
///
/// # Example
///
/// ```no_run
/// use validado_core::{create, CreateOptions};
/// use serde_json::json;
///
/// # async fn example() -> validado_core::Result<()> {
/// let result = create(
///     "order",
///     json!({"quantity": "five", "email": "  JOHN@EXAMPLE.COM  "}),
///     CreateOptions::default(),
/// )
/// .await?;
/// assert_eq!(result.instance["quantity"], json!(5));
/// # Ok(())
/// # }
/// ```
pub async fn create(
    class_id: &str,
    raw_input: Value,
    options: CreateOptions,
) -> Result<ConstructionResult> {
    ShapeRegistry::global()
        .create(class_id, raw_input, options)
        .await
}

impl ShapeRegistry {
    /// [`create`] against this registry instead of the global one
    pub async fn create(
        &self,
        class_id: &str,
        raw_input: Value,
        options: CreateOptions,
    ) -> Result<ConstructionResult> {
        let start_time = Instant::now();

        // Step 1: discriminated routing, reading the raw input only
        let routed_id = match self.discriminator_rule(class_id) {
            Some(rule) => rule.resolve_branch(&raw_input)?,
            None => class_id.to_string(),
        };

        // Step 2: shape lookup and lazy compilation (cached per class)
        let compiled = self.compiled_shape(&routed_id)?;

        // Step 3: seed the per-invocation context from the raw input
        let mut ctx = ExecutionContext::seed(&compiled, raw_input, options.context.clone());

        // Step 4: run the selected strategy
        let passes = match options.engine {
            EngineStrategy::Convergent => {
                Some(convergent::run(&compiled, &mut ctx, &options).await?)
            }
            EngineStrategy::SinglePass => {
                single_pass::run(&compiled, &mut ctx, &options).await?;
                None
            }
        };

        // Step 5: assemble the result
        let duration_ms = start_time.elapsed().as_millis() as u64;
        let metadata = ConstructionMetadata {
            class_id: routed_id,
            engine: options.engine,
            error_mode: options.error_mode,
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_ms: Some(duration_ms),
            passes,
        };
        log::debug!(
            "constructed '{}' in {}ms ({} trace entries)",
            metadata.class_id,
            duration_ms,
            ctx.trace.len()
        );

        Ok(ConstructionResult {
            instance: ctx.instance_value(),
            trace: ctx.trace,
            metadata: Some(metadata),
        })
    }
}
