//! Target shapes: per-class field and step definitions
//!
//! A shape is the registered, immutable definition of one target class: its
//! ordered fields and each field's step pipeline. Shapes are built once
//! through the builder API, cached by class identity, and compiled lazily on
//! first use (which is also where malformed step configuration is reported).
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

pub mod compile;
pub mod descriptor;
pub mod field;
pub mod registry;

pub use descriptor::{
    CoercionKind, NormalizationKind, Predicate, PredicateFn, ResolveFn, StepDescriptor,
    StepMetadata, TransformFn, ValidateFn, ValidationCheck,
};
pub use field::{FieldBuilder, FieldSpec};
pub use registry::ShapeRegistry;

pub(crate) use compile::{CompiledField, CompiledShape};

/// The immutable field/step definition for one target class
#[derive(Debug, Clone)]
pub struct TargetShape {
    /// Class identity the shape is cached by
    pub class_id: String,
    /// Fields in declaration order
    pub fields: Vec<FieldSpec>,
}

impl TargetShape {
    /// Start building a shape for the given class
    pub fn builder(class_id: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder {
            class_id: class_id.into(),
            fields: Vec::new(),
        }
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the shape declares no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builder for a [`TargetShape`]
#[derive(Debug)]
pub struct ShapeBuilder {
    class_id: String,
    fields: Vec<FieldSpec>,
}

impl ShapeBuilder {
    /// Add a finished field
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Finish the shape
    pub fn build(self) -> TargetShape {
        TargetShape {
            class_id: self.class_id,
            fields: self.fields,
        }
    }

    /// Finish the shape and register it in the global registry
    ///
    /// Registration is idempotent: if the class is already registered the
    /// existing shape is kept and this call is a no-op.
    pub fn register(self) -> bool {
        ShapeRegistry::global().register(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_builder_declaration_order() {
        let shape = TargetShape::builder("order")
            .field(FieldSpec::builder("quantity").build())
            .field(FieldSpec::builder("email").build())
            .build();

        assert_eq!(shape.class_id, "order");
        assert_eq!(
            shape.field_names().collect::<Vec<_>>(),
            vec!["quantity", "email"]
        );
        assert_eq!(shape.len(), 2);
        assert!(!shape.is_empty());
    }
}
