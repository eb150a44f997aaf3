//! Forward dependency propagation over a statement sequence.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::ast::Statement;
use crate::symbols::{bound_symbols, referenced_symbols};

/// Extends the changed statements with every later statement that touches a
/// name rebound by a changed or already included statement.
///
/// `changed` holds positions into `next` as produced by [`crate::diff::diff`].
/// The result is ordered by position. A statement is only ever pulled in by
/// bindings that precede it, so edits never cause earlier lines to re-run.
pub fn expand(next: &[Statement], changed: &[usize]) -> Vec<usize> {
    let changed: FxHashSet<usize> = changed.iter().copied().collect();
    let mut changed_names = BTreeSet::new();
    let mut run_set = Vec::new();

    for (position, statement) in next.iter().enumerate() {
        if changed.contains(&position) {
            changed_names.extend(bound_symbols(statement));
            run_set.push(position);
            continue;
        }

        let referenced = referenced_symbols(statement);
        if referenced.is_disjoint(&changed_names) {
            continue;
        }
        trace!(
            line = statement.span.start,
            names = ?referenced.intersection(&changed_names).collect::<Vec<_>>(),
            "statement depends on rebound names"
        );
        changed_names.extend(bound_symbols(statement));
        run_set.push(position);
    }

    run_set
}
