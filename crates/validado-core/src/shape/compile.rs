//! Lazy shape compilation: structural validation and evaluation metadata
//!
//! Shapes are registered without any checking so that introspection tooling
//! can inspect partially configured shapes. The first `create()` call against
//! a class compiles its shape: conditional spans are checked for balance and
//! flatness, every cross-field reference is resolved, each step's read set is
//! precomputed, and the dependency graph is built. The compiled form is cached
//! alongside the shape and shared by both engines.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use super::{FieldSpec, StepDescriptor, TargetShape};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use std::collections::{BTreeSet, HashMap};

/// A balanced `ConditionalBegin … [Else] … End` span within a step list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub begin: usize,
    pub else_idx: Option<usize>,
    pub end: usize,
}

/// One field with its precomputed evaluation metadata
#[derive(Debug, Clone)]
pub(crate) struct CompiledField {
    pub spec: FieldSpec,
    /// Spans keyed by the index of their `ConditionalBegin`
    pub spans: HashMap<usize, Span>,
    /// Matching `ConditionalEnd` for each `ConditionalElse`
    pub else_to_end: HashMap<usize, usize>,
    /// Fields each step may read, indexed by step position
    pub step_reads: Vec<Vec<String>>,
    /// Union of explicit dependencies and every step's reads
    pub all_reads: BTreeSet<String>,
}

impl CompiledField {
    /// Whether any step at or after `from` can still replace the value
    pub fn mutates_at_or_after(&self, from: usize) -> bool {
        self.spec.steps[from.min(self.spec.steps.len())..]
            .iter()
            .any(|step| step.mutates_value())
    }
}

/// A shape with validated structure, read sets, and dependency graph
#[derive(Debug, Clone)]
pub(crate) struct CompiledShape {
    pub class_id: String,
    pub fields: Vec<CompiledField>,
    pub field_index: HashMap<String, usize>,
    pub graph: DependencyGraph,
}

impl CompiledShape {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.spec.name.clone()).collect()
    }
}

/// Compile a registered shape, reporting malformed configuration as
/// [`Error::Shape`]
pub(crate) fn compile(shape: &TargetShape) -> Result<CompiledShape> {
    let known: BTreeSet<&str> = shape.field_names().collect();
    let mut field_index = HashMap::new();
    for (idx, field) in shape.fields.iter().enumerate() {
        if field_index.insert(field.name.clone(), idx).is_some() {
            return Err(shape_error(
                shape,
                format!("duplicate field '{}'", field.name),
            ));
        }
    }

    let mut fields = Vec::with_capacity(shape.fields.len());
    for field in &shape.fields {
        let (spans, else_to_end) = scan_spans(shape, field)?;

        let mut step_reads = Vec::with_capacity(field.steps.len());
        let mut all_reads: BTreeSet<String> = field.depends_on.clone();
        for step in &field.steps {
            // A step's own field is always readable mid-evaluation; only
            // foreign reads participate in dependencies and readiness.
            let reads: Vec<String> = step
                .reads()
                .into_iter()
                .filter(|r| r != &field.name)
                .collect();
            all_reads.extend(reads.iter().cloned());
            step_reads.push(reads);
        }

        for reference in &all_reads {
            if !known.contains(reference.as_str()) {
                return Err(shape_error(
                    shape,
                    format!(
                        "field '{}' references unknown field '{}'",
                        field.name, reference
                    ),
                ));
            }
        }

        fields.push(CompiledField {
            spec: field.clone(),
            spans,
            else_to_end,
            step_reads,
            all_reads,
        });
    }

    let graph = DependencyGraph::build(fields.iter().map(|f| {
        (
            f.spec.name.as_str(),
            f.all_reads.iter().map(|r| r.as_str()),
        )
    }));

    Ok(CompiledShape {
        class_id: shape.class_id.clone(),
        fields,
        field_index,
        graph,
    })
}

/// Check one field's conditional markers for balance and flatness
fn scan_spans(
    shape: &TargetShape,
    field: &FieldSpec,
) -> Result<(HashMap<usize, Span>, HashMap<usize, usize>)> {
    let mut spans = HashMap::new();
    let mut else_to_end = HashMap::new();
    let mut open: Option<(usize, Option<usize>)> = None;

    for (idx, step) in field.steps.iter().enumerate() {
        match step {
            StepDescriptor::ConditionalBegin { .. } => {
                if open.is_some() {
                    return Err(shape_error(
                        shape,
                        format!(
                            "field '{}' nests conditional blocks; spans must be flat",
                            field.name
                        ),
                    ));
                }
                open = Some((idx, None));
            }
            StepDescriptor::ConditionalElse => match &mut open {
                Some((_, else_slot @ None)) => *else_slot = Some(idx),
                Some((_, Some(_))) => {
                    return Err(shape_error(
                        shape,
                        format!(
                            "field '{}' has more than one else in a conditional block",
                            field.name
                        ),
                    ));
                }
                None => {
                    return Err(shape_error(
                        shape,
                        format!("field '{}' has an else outside a conditional block", field.name),
                    ));
                }
            },
            StepDescriptor::ConditionalEnd => match open.take() {
                Some((begin, else_idx)) => {
                    spans.insert(
                        begin,
                        Span {
                            begin,
                            else_idx,
                            end: idx,
                        },
                    );
                    if let Some(else_idx) = else_idx {
                        else_to_end.insert(else_idx, idx);
                    }
                }
                None => {
                    return Err(shape_error(
                        shape,
                        format!(
                            "field '{}' closes a conditional block that was never opened",
                            field.name
                        ),
                    ));
                }
            },
            _ => {}
        }
    }

    if open.is_some() {
        return Err(shape_error(
            shape,
            format!("field '{}' has an unterminated conditional block", field.name),
        ));
    }

    Ok((spans, else_to_end))
}

fn shape_error(shape: &TargetShape, message: String) -> Error {
    Error::Shape {
        class_id: shape.class_id.clone(),
        message,
    }
}
