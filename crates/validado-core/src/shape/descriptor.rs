//! Step descriptors: the tagged variants a field's pipeline is built from
//!
//! Each field carries an ordered list of these descriptors. Handlers are
//! stored behind `Arc` so descriptors stay cheaply cloneable, and every
//! variant that can read other fields declares those reads explicitly; the
//! dependency graph builder and the engines' readiness checks both consume the
//! same declarations.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use crate::trace::StepKind;
use crate::types::{Snapshot, ValidationOutcome};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Infallible value transformation handler
pub type TransformFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Validation handler with access to the instance snapshot
pub type ValidateFn = Arc<dyn Fn(&Value, &Snapshot<'_>) -> ValidationOutcome + Send + Sync>;

/// Derivation handler reading other fields and caller context
pub type ResolveFn = Arc<dyn Fn(&Snapshot<'_>, &Value) -> Value + Send + Sync>;

/// Custom predicate handler
pub type PredicateFn = Arc<dyn Fn(&Snapshot<'_>) -> bool + Send + Sync>;

/// Free-form step metadata, passed verbatim to AI handlers
pub type StepMetadata = HashMap<String, Value>;

/// Best-effort type coercion applied to a field value
///
/// Coercions never fail: input that cannot be coerced passes through
/// unchanged for a later validation step to reject.
#[derive(Clone)]
pub enum CoercionKind {
    /// Parse numeric strings and spelled-out number words into JSON numbers
    Number,
    /// Map boolean words ("true", "yes", "1", "on", ...) into JSON booleans
    Boolean,
    /// Render scalars as strings
    Text,
    /// Caller-supplied coercion
    Custom { name: String, apply: TransformFn },
}

/// Canonicalizing transformation applied to a field value
#[derive(Clone)]
pub enum NormalizationKind {
    /// Strip leading and trailing whitespace from strings
    Trim,
    /// Lowercase strings
    Lowercase,
    /// Uppercase strings
    Uppercase,
    /// Collapse internal whitespace runs to single spaces
    CollapseWhitespace,
    /// Replace null with a default value
    Default(Value),
    /// Caller-supplied normalization
    Custom { name: String, apply: TransformFn },
}

/// Rule-based validation check
#[derive(Clone)]
pub enum ValidationCheck {
    /// Reject null (covers fields absent from the raw input)
    Required,
    /// Minimum string length
    MinLength(usize),
    /// Maximum string length
    MaxLength(usize),
    /// Regex match on strings
    Pattern(Regex),
    /// Numeric range, either bound optional
    Range { min: Option<f64>, max: Option<f64> },
    /// Membership in a fixed set of values
    OneOf(Vec<Value>),
    /// Cross-field equality against another field's current value
    MatchesField(String),
    /// Caller-supplied check; `references` declares the fields it reads
    Custom {
        name: String,
        references: Vec<String>,
        test: ValidateFn,
    },
}

/// Branch condition for conditional spans
#[derive(Clone)]
pub enum Predicate {
    /// Another field currently equals a value
    Equals { field: String, value: Value },
    /// Another field is present and non-null
    Present { field: String },
    /// Another field is a string matching a pattern
    Matches { field: String, pattern: Regex },
    /// Negation
    Not(Box<Predicate>),
    /// All of the inner predicates hold
    And(Vec<Predicate>),
    /// Any of the inner predicates holds
    Or(Vec<Predicate>),
    /// Caller-supplied predicate; `fields` declares the fields it reads
    Custom {
        name: String,
        fields: Vec<String>,
        test: PredicateFn,
    },
}

impl Predicate {
    /// Predicate that holds when `field` equals `value`
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Predicate that holds when `field` is present and non-null
    pub fn field_present(field: impl Into<String>) -> Self {
        Predicate::Present {
            field: field.into(),
        }
    }

    /// Predicate that holds when `field` is a string matching `pattern`
    pub fn field_matches(
        field: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Predicate::Matches {
            field: field.into(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// Caller-supplied predicate over the instance snapshot
    ///
    /// `fields` must name every field the closure reads; the dependency graph
    /// and the convergent engine's deferral logic rely on the declaration.
    pub fn custom(
        name: impl Into<String>,
        fields: Vec<String>,
        test: impl Fn(&Snapshot<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Predicate::Custom {
            name: name.into(),
            fields,
            test: Arc::new(test),
        }
    }

    /// Every field this predicate may read
    pub fn referenced_fields(&self) -> Vec<String> {
        match self {
            Predicate::Equals { field, .. }
            | Predicate::Present { field }
            | Predicate::Matches { field, .. } => vec![field.clone()],
            Predicate::Not(inner) => inner.referenced_fields(),
            Predicate::And(inner) | Predicate::Or(inner) => {
                let mut fields: Vec<String> =
                    inner.iter().flat_map(|p| p.referenced_fields()).collect();
                fields.dedup();
                fields
            }
            Predicate::Custom { fields, .. } => fields.clone(),
        }
    }

    /// Evaluate against the current instance snapshot
    pub fn evaluate(&self, snapshot: &Snapshot<'_>) -> bool {
        match self {
            Predicate::Equals { field, value } => {
                snapshot.get(field).map_or(false, |v| v == value)
            }
            Predicate::Present { field } => snapshot.is_present(field),
            Predicate::Matches { field, pattern } => snapshot
                .get(field)
                .and_then(Value::as_str)
                .map_or(false, |s| pattern.is_match(s)),
            Predicate::Not(inner) => !inner.evaluate(snapshot),
            Predicate::And(inner) => inner.iter().all(|p| p.evaluate(snapshot)),
            Predicate::Or(inner) => inner.iter().any(|p| p.evaluate(snapshot)),
            Predicate::Custom { test, .. } => test(snapshot),
        }
    }

    /// Short human-readable form for deferral reasons and logs
    pub fn describe(&self) -> String {
        match self {
            Predicate::Equals { field, value } => format!("{} == {}", field, value),
            Predicate::Present { field } => format!("{} is present", field),
            Predicate::Matches { field, pattern } => {
                format!("{} matches /{}/", field, pattern.as_str())
            }
            Predicate::Not(inner) => format!("not ({})", inner.describe()),
            Predicate::And(inner) => inner
                .iter()
                .map(|p| p.describe())
                .collect::<Vec<_>>()
                .join(" and "),
            Predicate::Or(inner) => inner
                .iter()
                .map(|p| p.describe())
                .collect::<Vec<_>>()
                .join(" or "),
            Predicate::Custom { name, .. } => name.clone(),
        }
    }
}

/// One atomic processing step attached to a field
#[derive(Clone)]
pub enum StepDescriptor {
    Coercion {
        kind: CoercionKind,
        metadata: StepMetadata,
    },
    Normalization {
        kind: NormalizationKind,
        metadata: StepMetadata,
    },
    Validation {
        check: ValidationCheck,
        metadata: StepMetadata,
    },
    AiTransform {
        max_retries: u32,
        metadata: StepMetadata,
    },
    AiValidate {
        max_retries: u32,
        metadata: StepMetadata,
    },
    DataSource {
        sources: Vec<String>,
        resolve: ResolveFn,
        metadata: StepMetadata,
    },
    ConditionalBegin {
        predicate: Predicate,
    },
    ConditionalElse,
    ConditionalEnd,
}

impl StepDescriptor {
    /// The trace-level category of this step
    pub fn kind(&self) -> StepKind {
        match self {
            StepDescriptor::Coercion { .. } => StepKind::Coercion,
            StepDescriptor::Normalization { .. } => StepKind::Normalization,
            StepDescriptor::Validation { .. } => StepKind::Validation,
            StepDescriptor::AiTransform { .. } => StepKind::AiTransform,
            StepDescriptor::AiValidate { .. } => StepKind::AiValidate,
            StepDescriptor::DataSource { .. } => StepKind::DataSource,
            StepDescriptor::ConditionalBegin { .. } => StepKind::ConditionalBegin,
            StepDescriptor::ConditionalElse => StepKind::ConditionalElse,
            StepDescriptor::ConditionalEnd => StepKind::ConditionalEnd,
        }
    }

    /// Fields this step may read from the instance snapshot
    pub(crate) fn reads(&self) -> Vec<String> {
        match self {
            StepDescriptor::Validation { check, .. } => match check {
                ValidationCheck::MatchesField(other) => vec![other.clone()],
                ValidationCheck::Custom { references, .. } => references.clone(),
                _ => Vec::new(),
            },
            StepDescriptor::DataSource { sources, .. } => sources.clone(),
            StepDescriptor::ConditionalBegin { predicate } => predicate.referenced_fields(),
            _ => Vec::new(),
        }
    }

    /// Whether this step can replace the field's value
    pub(crate) fn mutates_value(&self) -> bool {
        matches!(
            self,
            StepDescriptor::Coercion { .. }
                | StepDescriptor::Normalization { .. }
                | StepDescriptor::AiTransform { .. }
                | StepDescriptor::DataSource { .. }
        )
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepDescriptor::ConditionalBegin { predicate } => {
                write!(f, "ConditionalBegin({})", predicate.describe())
            }
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.describe())
    }
}

impl fmt::Debug for CoercionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionKind::Number => write!(f, "Number"),
            CoercionKind::Boolean => write!(f, "Boolean"),
            CoercionKind::Text => write!(f, "Text"),
            CoercionKind::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

impl fmt::Debug for NormalizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationKind::Trim => write!(f, "Trim"),
            NormalizationKind::Lowercase => write!(f, "Lowercase"),
            NormalizationKind::Uppercase => write!(f, "Uppercase"),
            NormalizationKind::CollapseWhitespace => write!(f, "CollapseWhitespace"),
            NormalizationKind::Default(value) => write!(f, "Default({})", value),
            NormalizationKind::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

impl fmt::Debug for ValidationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationCheck::Required => write!(f, "Required"),
            ValidationCheck::MinLength(n) => write!(f, "MinLength({})", n),
            ValidationCheck::MaxLength(n) => write!(f, "MaxLength({})", n),
            ValidationCheck::Pattern(re) => write!(f, "Pattern(/{}/)", re.as_str()),
            ValidationCheck::Range { min, max } => write!(f, "Range({:?}, {:?})", min, max),
            ValidationCheck::OneOf(values) => write!(f, "OneOf({} values)", values.len()),
            ValidationCheck::MatchesField(other) => write!(f, "MatchesField({})", other),
            ValidationCheck::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}
