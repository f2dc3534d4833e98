//! Process-wide shape and discriminator-rule cache
//!
//! Shapes are registered once per class and cached by class identity. The
//! cache is read-mostly: writes happen only at registration, reads on every
//! `create()` call, so a `RwLock` around plain maps is sufficient. Compiled
//! forms are built at most once per shape behind a `OnceCell`; compilation
//! failures are not cached and are re-reported on every use of the malformed
//! shape.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use super::compile::{compile, CompiledShape};
use super::TargetShape;
use crate::error::{Error, Result};
use crate::router::DiscriminatorRule;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

static GLOBAL: Lazy<ShapeRegistry> = Lazy::new(ShapeRegistry::new);

pub(crate) struct ShapeEntry {
    shape: TargetShape,
    compiled: OnceCell<Arc<CompiledShape>>,
}

impl ShapeEntry {
    fn new(shape: TargetShape) -> Self {
        Self {
            shape,
            compiled: OnceCell::new(),
        }
    }

    pub(crate) fn compiled(&self) -> Result<Arc<CompiledShape>> {
        self.compiled
            .get_or_try_init(|| compile(&self.shape).map(Arc::new))
            .cloned()
    }
}

/// Cache of registered shapes and discriminator rules
///
/// Most callers use the process-wide instance through
/// [`ShapeRegistry::global`] (the free functions at the crate root do);
/// separate instances are useful for tests and embedding.
#[derive(Default)]
pub struct ShapeRegistry {
    shapes: RwLock<HashMap<String, Arc<ShapeEntry>>>,
    rules: RwLock<HashMap<String, DiscriminatorRule>>,
}

impl ShapeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static ShapeRegistry {
        &GLOBAL
    }

    /// Register a shape; idempotent per class
    ///
    /// Returns `true` when the shape was stored, `false` when the class was
    /// already registered (the existing shape is kept). No validation happens
    /// here; malformed configuration surfaces at first `create()`.
    pub fn register(&self, shape: TargetShape) -> bool {
        let mut shapes = self.shapes.write().expect("shape cache poisoned");
        if shapes.contains_key(&shape.class_id) {
            return false;
        }
        log::debug!("registering shape '{}'", shape.class_id);
        shapes.insert(shape.class_id.clone(), Arc::new(ShapeEntry::new(shape)));
        true
    }

    /// Register a discriminator rule for an abstract class id
    ///
    /// `create(class_id, ...)` calls for this id will route to one of the
    /// rule's branch shapes based on the raw input. Idempotent like
    /// [`register`](Self::register).
    pub fn register_discriminator(
        &self,
        class_id: impl Into<String>,
        rule: DiscriminatorRule,
    ) -> bool {
        let class_id = class_id.into();
        let mut rules = self.rules.write().expect("rule cache poisoned");
        if rules.contains_key(&class_id) {
            return false;
        }
        log::debug!(
            "registering discriminator on '{}' for class '{}'",
            rule.discriminator_field,
            class_id
        );
        rules.insert(class_id, rule);
        true
    }

    /// Whether a shape is registered for the class
    pub fn is_registered(&self, class_id: &str) -> bool {
        self.shapes
            .read()
            .expect("shape cache poisoned")
            .contains_key(class_id)
    }

    pub(crate) fn discriminator_rule(&self, class_id: &str) -> Option<DiscriminatorRule> {
        self.rules
            .read()
            .expect("rule cache poisoned")
            .get(class_id)
            .cloned()
    }

    pub(crate) fn compiled_shape(&self, class_id: &str) -> Result<Arc<CompiledShape>> {
        let entry = {
            let shapes = self.shapes.read().expect("shape cache poisoned");
            shapes.get(class_id).cloned()
        };
        match entry {
            Some(entry) => entry.compiled(),
            None => Err(Error::Shape {
                class_id: class_id.to_string(),
                message: "no shape registered for this class".to_string(),
            }),
        }
    }
}
