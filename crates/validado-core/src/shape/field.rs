//! Field specifications and the fluent builder that assembles them
//!
//! A `FieldSpec` is one field's ordered step pipeline plus its declared
//! dependencies. Pipelines are assembled through `FieldBuilder` at
//! registration time; an explicit builder API keeps step order and types
//! statically visible rather than hiding them behind attribute magic.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use super::descriptor::{
    CoercionKind, NormalizationKind, Predicate, ResolveFn, StepDescriptor, StepMetadata,
    ValidationCheck,
};
use crate::types::{Snapshot, ValueType};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One field's definition within a target shape
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name, unique within the shape
    pub name: String,
    /// Declared value type, used by built-in steps and introspection
    pub type_hint: ValueType,
    /// Ordered step pipeline
    pub steps: Vec<StepDescriptor>,
    /// Explicitly declared dependencies; implicit reads from steps are
    /// gathered separately when the shape is compiled
    pub depends_on: BTreeSet<String>,
}

impl FieldSpec {
    /// Start building a field
    pub fn builder(name: impl Into<String>) -> FieldBuilder {
        FieldBuilder::new(name)
    }
}

/// Fluent builder for a [`FieldSpec`]
///
/// Steps execute in the order they are added. Conditional spans are opened
/// with [`when`](FieldBuilder::when), optionally split with
/// [`otherwise`](FieldBuilder::otherwise), and closed with
/// [`end_when`](FieldBuilder::end_when); spans are flat, and nesting is rejected
/// when the shape is first used.
#[derive(Debug)]
pub struct FieldBuilder {
    name: String,
    type_hint: ValueType,
    steps: Vec<StepDescriptor>,
    depends_on: BTreeSet<String>,
}

impl FieldBuilder {
    /// Create a builder for the named field
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_hint: ValueType::Any,
            steps: Vec::new(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Declare the field's value type
    pub fn type_hint(mut self, hint: ValueType) -> Self {
        self.type_hint = hint;
        self
    }

    /// Append a coercion step
    pub fn coerce(mut self, kind: CoercionKind) -> Self {
        self.steps.push(StepDescriptor::Coercion {
            kind,
            metadata: StepMetadata::new(),
        });
        self
    }

    /// Append a normalization step
    pub fn normalize(mut self, kind: NormalizationKind) -> Self {
        self.steps.push(StepDescriptor::Normalization {
            kind,
            metadata: StepMetadata::new(),
        });
        self
    }

    /// Append a validation step
    pub fn validate(mut self, check: ValidationCheck) -> Self {
        self.steps.push(StepDescriptor::Validation {
            check,
            metadata: StepMetadata::new(),
        });
        self
    }

    /// Append an AI-backed transformation step
    ///
    /// `max_retries` is the total attempt budget (minimum 1). Metadata is
    /// passed verbatim to the handler on every attempt.
    pub fn ai_transform(mut self, max_retries: u32, metadata: StepMetadata) -> Self {
        self.steps.push(StepDescriptor::AiTransform {
            max_retries,
            metadata,
        });
        self
    }

    /// Append an AI-backed validation step
    pub fn ai_validate(mut self, max_retries: u32, metadata: StepMetadata) -> Self {
        self.steps.push(StepDescriptor::AiValidate {
            max_retries,
            metadata,
        });
        self
    }

    /// Append a derivation step reading the named source fields
    pub fn derive_from(
        mut self,
        sources: Vec<String>,
        resolve: impl Fn(&Snapshot<'_>, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.steps.push(StepDescriptor::DataSource {
            sources,
            resolve: Arc::new(resolve) as ResolveFn,
            metadata: StepMetadata::new(),
        });
        self
    }

    /// Open a conditional span: following steps run only when the predicate
    /// holds at evaluation time
    pub fn when(mut self, predicate: Predicate) -> Self {
        self.steps.push(StepDescriptor::ConditionalBegin { predicate });
        self
    }

    /// Split the open conditional span into an else-branch
    pub fn otherwise(mut self) -> Self {
        self.steps.push(StepDescriptor::ConditionalElse);
        self
    }

    /// Close the open conditional span
    pub fn end_when(mut self) -> Self {
        self.steps.push(StepDescriptor::ConditionalEnd);
        self
    }

    /// Declare an explicit dependency on another field
    pub fn depends_on(mut self, field: impl Into<String>) -> Self {
        self.depends_on.insert(field.into());
        self
    }

    /// Finish the field
    pub fn build(self) -> FieldSpec {
        FieldSpec {
            name: self.name,
            type_hint: self.type_hint,
            steps: self.steps,
            depends_on: self.depends_on,
        }
    }
}
