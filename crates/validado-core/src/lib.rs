//! Validado Core - Field-level transformation/validation pipeline engine
//!
//! This crate builds fully coerced, normalized, and validated instances from
//! raw, loosely-typed input (JSON, LLM output, form data) against registered
//! class shapes, resolving field interdependencies automatically and
//! reporting a structured trace of every transformation applied.
//!
//! # Main Components
//!
//! - **Shapes**: per-class field and step definitions, registered once and
//!   cached, assembled through a builder API
//! - **Dependency Graph**: directed graph over fields, derived from explicit
//!   declarations, conditional predicates, and cross-field references
//! - **Execution Engines**: a convergent fixed-point strategy that tolerates
//!   cycles, and a single-pass topological strategy that rejects them
//! - **AI Steps**: caller-supplied async handlers with retry-with-context
//! - **Discriminated Routing**: dispatch to branch shapes on a raw-input field
//! - **Trace & Errors**: an append-only audit log and a fail-fast/collect-all
//!   error aggregator
//!
//! # Example
//!
//! ```no_run
//! use validado_core::{
//!     create, CoercionKind, CreateOptions, FieldSpec, NormalizationKind, Result,
//!     TargetShape, ValidationCheck,
//! };
//! use serde_json::json;
//!
//! # async fn example() -> Result<()> {
//! TargetShape::builder("order")
//!     .field(
//!         FieldSpec::builder("quantity")
//!             .coerce(CoercionKind::Number)
//!             .validate(ValidationCheck::Required)
//!             .build(),
//!     )
//!     .field(
//!         FieldSpec::builder("email")
//!             .normalize(NormalizationKind::Trim)
//!             .normalize(NormalizationKind::Lowercase)
//!             .build(),
//!     )
//!     .register();
//!
//! let result = create(
//!     "order",
//!     json!({"quantity": "five", "email": "  JOHN@EXAMPLE.COM  "}),
//!     CreateOptions::default(),
//! )
//! .await?;
//! assert_eq!(result.instance["quantity"], json!(5));
//! assert_eq!(result.instance["email"], json!("john@example.com"));
//! # Ok(())
//! # }
//! ```

pub mod ai;
pub mod builtins;
pub mod engine;
pub mod error;
pub mod graph;
pub mod router;
pub mod shape;
pub mod trace;
pub mod types;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use types::{
    // Options and modes
    CreateOptions, EngineStrategy, ErrorMode,

    // Results
    ConstructionMetadata, ConstructionResult,

    // Outcomes and failures
    FieldFailure, SkippedField, ValidationOutcome,

    // Handler views
    Snapshot, ValueType,
};

// Shapes and steps
pub use shape::{
    CoercionKind, FieldBuilder, FieldSpec, NormalizationKind, Predicate, ShapeRegistry,
    StepDescriptor, StepMetadata, TargetShape, ValidationCheck,
};

// Dependency graph
pub use graph::DependencyGraph;

// Tracing
pub use trace::{StepKind, Trace, TraceEntry, TraceOutcome, TraceSummary};

// AI handler boundary
pub use ai::{handler_fn, AiHandler, AiHandlerError, AiHandlerParams};

// Discriminated routing
pub use router::DiscriminatorRule;

// Entry point
pub use engine::create;
