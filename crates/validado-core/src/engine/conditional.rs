//! Conditional block resolution
//!
//! Spans are flat `Begin(predicate) … [Else] … End` sequences inside one
//! field's step list. The resolver turns marker positions into jump targets:
//! a true predicate continues into the first branch, a false predicate jumps
//! past the `Else` (or to the `End` when no else-branch exists), and an `Else`
//! reached from inside the taken branch jumps to its matching `End`. Whether
//! the predicate may be evaluated at all (its reads being resolved) is the
//! interpreter's readiness check, not the resolver's concern.

use crate::shape::CompiledField;

/// Step index to continue at after evaluating the predicate of the span
/// opening at `begin`
pub(crate) fn next_index_for_begin(
    field: &CompiledField,
    begin: usize,
    predicate_true: bool,
) -> usize {
    let span = field
        .spans
        .get(&begin)
        .copied()
        .expect("span table covers every ConditionalBegin");
    if predicate_true {
        span.begin + 1
    } else {
        match span.else_idx {
            Some(else_idx) => else_idx + 1,
            None => span.end,
        }
    }
}

/// Step index to continue at when execution reaches an `Else` marker from the
/// taken branch
pub(crate) fn next_index_for_else(field: &CompiledField, else_idx: usize) -> usize {
    field
        .else_to_end
        .get(&else_idx)
        .copied()
        .expect("span table covers every ConditionalElse")
}
