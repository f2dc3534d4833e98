//! Discriminated routing: dispatch construction to a branch shape
//!
//! A discriminator rule inspects one designated field of the raw input, never
//! the partially-built instance, and routes the whole `create()` call to one
//! of several registered branch classes. Unmatched branches are never
//! compiled or evaluated.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Routing rule from a raw-input field value to branch class ids
///
/// Branch keys are the stringified scalar values of the discriminator field;
/// branch values are class ids that must be registered in the same registry.
#[derive(Debug, Clone)]
pub struct DiscriminatorRule {
    /// Raw-input field whose value selects the branch
    pub discriminator_field: String,
    /// Discriminator value -> branch class id
    pub branches: HashMap<String, String>,
}

impl DiscriminatorRule {
    /// Create a rule over the named raw-input field
    pub fn new(discriminator_field: impl Into<String>) -> Self {
        Self {
            discriminator_field: discriminator_field.into(),
            branches: HashMap::new(),
        }
    }

    /// Map a discriminator value to a branch class id
    pub fn branch(mut self, value: impl Into<String>, class_id: impl Into<String>) -> Self {
        self.branches.insert(value.into(), class_id.into());
        self
    }

    /// Resolve the branch class for one raw input
    ///
    /// The discriminator must be present verbatim in the raw input; a missing
    /// field, a non-scalar value, or a value with no mapped branch all raise
    /// [`Error::UnknownDiscriminator`].
    pub fn resolve_branch(&self, raw_input: &Value) -> Result<String> {
        let value = raw_input.get(&self.discriminator_field);
        let key = value.and_then(discriminator_key).ok_or_else(|| {
            Error::UnknownDiscriminator {
                field: self.discriminator_field.clone(),
                value: value
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "<missing>".to_string()),
            }
        })?;

        match self.branches.get(&key) {
            Some(class_id) => {
                log::debug!(
                    "discriminator '{}' = '{}' routed to shape '{}'",
                    self.discriminator_field,
                    key,
                    class_id
                );
                Ok(class_id.clone())
            }
            None => Err(Error::UnknownDiscriminator {
                field: self.discriminator_field.clone(),
                value: key,
            }),
        }
    }
}

/// Stringify a scalar discriminator value for branch lookup
fn discriminator_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn versioned_rule() -> DiscriminatorRule {
        DiscriminatorRule::new("schema_version")
            .branch("v1", "document_v1")
            .branch("v2", "document_v2")
    }

    #[test]
    fn test_routes_to_matching_branch() {
        let rule = versioned_rule();
        let routed = rule
            .resolve_branch(&json!({"schema_version": "v2", "title": "x"}))
            .expect("mapped value");
        assert_eq!(routed, "document_v2");
    }

    #[test]
    fn test_numeric_and_boolean_discriminators() {
        let rule = DiscriminatorRule::new("kind")
            .branch("2", "pair")
            .branch("true", "flagged");

        assert_eq!(rule.resolve_branch(&json!({"kind": 2})).unwrap(), "pair");
        assert_eq!(
            rule.resolve_branch(&json!({"kind": true})).unwrap(),
            "flagged"
        );
    }

    #[test]
    fn test_unmapped_value_is_rejected() {
        let rule = versioned_rule();
        let err = rule
            .resolve_branch(&json!({"schema_version": "v9"}))
            .expect_err("unmapped");
        match err {
            Error::UnknownDiscriminator { field, value } => {
                assert_eq!(field, "schema_version");
                assert_eq!(value, "v9");
            }
            other => panic!("expected UnknownDiscriminator, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_discriminator_is_rejected() {
        let rule = versioned_rule();
        let err = rule
            .resolve_branch(&json!({"title": "no version"}))
            .expect_err("missing");
        match err {
            Error::UnknownDiscriminator { value, .. } => assert_eq!(value, "<missing>"),
            other => panic!("expected UnknownDiscriminator, got {:?}", other),
        }
    }

    #[test]
    fn test_non_scalar_discriminator_is_rejected() {
        let rule = versioned_rule();
        let err = rule
            .resolve_branch(&json!({"schema_version": {"major": 2}}))
            .expect_err("non-scalar");
        assert!(matches!(err, Error::UnknownDiscriminator { .. }));
    }
}
