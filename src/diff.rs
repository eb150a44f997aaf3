//! Statement-sequence diff.
//!
//! Statements are reduced to position-free fingerprints and aligned with a
//! Myers edit script. Inserted and replaced statements of the new sequence
//! are the ones that changed.

use std::ops::Range;

use similar::{Algorithm, DiffTag, capture_diff_slices};

use crate::ast::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// One contiguous run of the edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub prev: Range<usize>,
    pub next: Range<usize>,
}

/// Canonical serialization of a statement that two statements share exactly
/// when they are structurally equal.
pub fn fingerprint(statement: &Statement) -> String {
    // Spans are `serde(skip)`; every other node serializes infallibly.
    serde_json::to_string(&statement.kind).unwrap_or_else(|_| format!("{:?}", statement.kind))
}

pub fn opcodes(prev: &[Statement], next: &[Statement]) -> Vec<Opcode> {
    let prev_fingerprints: Vec<String> = prev.iter().map(fingerprint).collect();
    let next_fingerprints: Vec<String> = next.iter().map(fingerprint).collect();

    capture_diff_slices(Algorithm::Myers, &prev_fingerprints, &next_fingerprints)
        .iter()
        .map(|op| {
            let (tag, prev, next) = op.as_tag_tuple();
            let tag = match tag {
                DiffTag::Equal => OpTag::Equal,
                DiffTag::Insert => OpTag::Insert,
                DiffTag::Delete => OpTag::Delete,
                DiffTag::Replace => OpTag::Replace,
            };
            Opcode { tag, prev, next }
        })
        .collect()
}

/// Positions in `next` of statements that are new or replaced, in order.
pub fn diff(prev: &[Statement], next: &[Statement]) -> Vec<usize> {
    opcodes(prev, next)
        .into_iter()
        .filter(|opcode| matches!(opcode.tag, OpTag::Insert | OpTag::Replace))
        .flat_map(|opcode| opcode.next)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare;
    use crate::parser::parse;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn statements(source: &str) -> Vec<Statement> {
        parse(source).expect("parse failed").statements
    }

    #[test]
    fn first_run_is_one_insert() {
        let next = statements("a = 1\nb = 2\nc = 3\n");
        assert_eq!(
            opcodes(&[], &next),
            vec![Opcode {
                tag: OpTag::Insert,
                prev: 0..0,
                next: 0..3,
            }]
        );
        assert_eq!(diff(&[], &next), vec![0, 1, 2]);
    }

    #[test]
    fn identical_sequences_have_no_changes() {
        let prev = statements("a = 1\nprint(a)\n");
        let next = statements("\n\na = 1\n\nprint(a)  # reformatted\n");
        assert!(diff(&prev, &next).is_empty());
    }

    #[test]
    fn appended_statements_are_inserted() {
        let prev = statements("a = 1\n");
        let next = statements("a = 1\nb = 2\nc = 3\n");
        assert_eq!(diff(&prev, &next), vec![1, 2]);
    }

    #[test]
    fn edited_statement_is_replaced() {
        let prev = statements(indoc! {"
            a = 1
            def foo(x):
                return x + 1
            foo(a)
        "});
        let next = statements(indoc! {"
            a = 1
            def foo(x):
                return x + 2
            foo(a)
        "});
        let ops = opcodes(&prev, &next);
        assert!(ops.iter().any(|op| op.tag == OpTag::Replace || op.tag == OpTag::Insert));
        assert_eq!(diff(&prev, &next), vec![1]);
    }

    #[test]
    fn deletions_contribute_nothing() {
        let prev = statements("a = 2\nprint(a)\n");
        let next = statements("a = 2\n");
        let ops = opcodes(&prev, &next);
        assert_eq!(
            ops,
            vec![
                Opcode {
                    tag: OpTag::Equal,
                    prev: 0..1,
                    next: 0..1,
                },
                Opcode {
                    tag: OpTag::Delete,
                    prev: 1..2,
                    next: 1..1,
                },
            ]
        );
        assert!(diff(&prev, &next).is_empty());
    }

    #[test]
    fn fingerprints_agree_with_structural_equality() {
        let samples = statements(indoc! {"
            a = 1
            a = 1.0
            a = '1'
            (a, b) = (1, 2)
            [a, b] = (1, 2)
            a += 1
            a: int = 1
            def f(x=1):
                return x
            def f(x=2):
                return x
            class C:
                pass
        "});
        let reformatted = statements(indoc! {"
            a = 1
            a = 1.0
            a = '1'
            (a,
             b) = (1, 2)
            [a, b] = (1,
                      2)
            a += 1
            a: int = 1
            def f(x=1):

                return x
            def f(x=2): return x
            class C: pass
        "});
        for (i, left) in samples.iter().enumerate() {
            for (j, right) in samples.iter().chain(&reformatted).enumerate() {
                assert_eq!(
                    fingerprint(left) == fingerprint(right),
                    compare::equal(left, right),
                    "fingerprint and comparator disagree on {i} vs {j}"
                );
            }
            assert_eq!(fingerprint(left), fingerprint(&reformatted[i]));
        }
    }
}
