//! Structural equality of syntax trees.
//!
//! Two nodes are equal when they are the same kind of node and all of their
//! non-positional fields and children are equal. Statement and handler line
//! spans never take part. Expressions hold no positions, so their derived
//! `PartialEq` already is structural equality.

use crate::ast::{ExceptHandler, Expression, Module, Parameter, Statement, StatementKind, Target};

pub trait Structural {
    fn structurally_eq(&self, other: &Self) -> bool;
}

/// Compares two statements ignoring where they sit in the source.
pub fn equal(left: &Statement, right: &Statement) -> bool {
    left.structurally_eq(right)
}

pub fn statements_equal(left: &[Statement], right: &[Statement]) -> bool {
    left.structurally_eq(right)
}

impl<T: Structural> Structural for [T] {
    fn structurally_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other)
                .all(|(left, right)| left.structurally_eq(right))
    }
}

impl<T: Structural> Structural for Option<T> {
    fn structurally_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(left), Some(right)) => left.structurally_eq(right),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Structural for Expression {
    fn structurally_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl Structural for Target {
    fn structurally_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl Structural for Parameter {
    fn structurally_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl Structural for Module {
    fn structurally_eq(&self, other: &Self) -> bool {
        self.statements.structurally_eq(&other.statements)
    }
}

impl Structural for ExceptHandler {
    fn structurally_eq(&self, other: &Self) -> bool {
        self.exception.structurally_eq(&other.exception)
            && self.name == other.name
            && self.body.structurally_eq(&other.body)
    }
}

impl Structural for Statement {
    fn structurally_eq(&self, other: &Self) -> bool {
        self.kind.structurally_eq(&other.kind)
    }
}

impl Structural for StatementKind {
    fn structurally_eq(&self, other: &Self) -> bool {
        use StatementKind as S;

        match (self, other) {
            (S::Expr(left), S::Expr(right)) => left == right,
            (
                S::Assign {
                    targets: left_targets,
                    value: left_value,
                },
                S::Assign {
                    targets: right_targets,
                    value: right_value,
                },
            ) => left_targets == right_targets && left_value == right_value,
            (
                S::AugAssign {
                    target: left_target,
                    op: left_op,
                    value: left_value,
                },
                S::AugAssign {
                    target: right_target,
                    op: right_op,
                    value: right_value,
                },
            ) => left_target == right_target && left_op == right_op && left_value == right_value,
            (
                S::AnnAssign {
                    target: left_target,
                    annotation: left_annotation,
                    value: left_value,
                },
                S::AnnAssign {
                    target: right_target,
                    annotation: right_annotation,
                    value: right_value,
                },
            ) => {
                left_target == right_target
                    && left_annotation == right_annotation
                    && left_value == right_value
            }
            (
                S::FunctionDef {
                    name: left_name,
                    params: left_params,
                    returns: left_returns,
                    body: left_body,
                },
                S::FunctionDef {
                    name: right_name,
                    params: right_params,
                    returns: right_returns,
                    body: right_body,
                },
            ) => {
                left_name == right_name
                    && left_params.structurally_eq(right_params)
                    && left_returns == right_returns
                    && left_body.structurally_eq(right_body)
            }
            (
                S::ClassDef {
                    name: left_name,
                    bases: left_bases,
                    body: left_body,
                },
                S::ClassDef {
                    name: right_name,
                    bases: right_bases,
                    body: right_body,
                },
            ) => {
                left_name == right_name
                    && left_bases == right_bases
                    && left_body.structurally_eq(right_body)
            }
            (S::Return(left), S::Return(right)) => left == right,
            (S::Raise(left), S::Raise(right)) => left == right,
            (S::Pass, S::Pass) | (S::Break, S::Break) | (S::Continue, S::Continue) => true,
            (
                S::If {
                    condition: left_condition,
                    then_body: left_then,
                    else_body: left_else,
                },
                S::If {
                    condition: right_condition,
                    then_body: right_then,
                    else_body: right_else,
                },
            ) => {
                left_condition == right_condition
                    && left_then.structurally_eq(right_then)
                    && left_else.structurally_eq(right_else)
            }
            (
                S::While {
                    condition: left_condition,
                    body: left_body,
                },
                S::While {
                    condition: right_condition,
                    body: right_body,
                },
            ) => left_condition == right_condition && left_body.structurally_eq(right_body),
            (
                S::For {
                    target: left_target,
                    iterable: left_iterable,
                    body: left_body,
                },
                S::For {
                    target: right_target,
                    iterable: right_iterable,
                    body: right_body,
                },
            ) => {
                left_target == right_target
                    && left_iterable == right_iterable
                    && left_body.structurally_eq(right_body)
            }
            (
                S::Try {
                    body: left_body,
                    handlers: left_handlers,
                    else_body: left_else,
                    finally_body: left_finally,
                },
                S::Try {
                    body: right_body,
                    handlers: right_handlers,
                    else_body: right_else,
                    finally_body: right_finally,
                },
            ) => {
                left_body.structurally_eq(right_body)
                    && left_handlers.structurally_eq(right_handlers)
                    && left_else.structurally_eq(right_else)
                    && left_finally.structurally_eq(right_finally)
            }
            (
                S::Assert {
                    test: left_test,
                    message: left_message,
                },
                S::Assert {
                    test: right_test,
                    message: right_message,
                },
            ) => left_test == right_test && left_message == right_message,
            (
                S::Import {
                    module: left_module,
                    alias: left_alias,
                },
                S::Import {
                    module: right_module,
                    alias: right_alias,
                },
            ) => left_module == right_module && left_alias == right_alias,
            // Listed out so a new statement kind fails to compile here.
            (
                S::Expr(_)
                | S::Assign { .. }
                | S::AugAssign { .. }
                | S::AnnAssign { .. }
                | S::FunctionDef { .. }
                | S::ClassDef { .. }
                | S::Return(_)
                | S::Pass
                | S::Break
                | S::Continue
                | S::If { .. }
                | S::While { .. }
                | S::For { .. }
                | S::Try { .. }
                | S::Raise(_)
                | S::Assert { .. }
                | S::Import { .. },
                _,
            ) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    fn module(source: &str) -> Module {
        parse(source).expect("parse failed")
    }

    #[test]
    fn same_source_is_equal() {
        assert!(module("a = 1\n").structurally_eq(&module("a = 1\n")));
    }

    #[test]
    fn nested_bodies_are_compared_recursively() {
        let left = module(indoc! {"
            def foo():
                a = 1
        "});
        assert!(left.structurally_eq(&module(indoc! {"
            def foo():
                a = 1
        "})));
        assert!(!left.structurally_eq(&module(indoc! {"
            def foo():
                b = 1
        "})));
        assert!(!left.structurally_eq(&module(indoc! {"
            def bar():
                a = 1
        "})));
    }

    #[test]
    fn different_targets_are_not_equal() {
        assert!(!module("a = 1\n").structurally_eq(&module("b = 1\n")));
        assert!(!module("(a, b) = c\n").structurally_eq(&module("[a, b] = c\n")));
    }

    #[test]
    fn ignores_positions_after_reformatting() {
        let compact = module(indoc! {"
            def f(x):
                if x:
                    return [1, 2]
                return []
        "});
        let spread = module(indoc! {"


            def f(x):

                if x:
                    return [
                        1,
                        2,
                    ]
                # comment
                return []
        "});
        assert_ne!(compact.statements[0].span, spread.statements[0].span);
        assert!(compact.structurally_eq(&spread));
        assert!(spread.structurally_eq(&compact));
    }

    #[test]
    fn list_length_matters() {
        let one = module("a = 1\n");
        let two = module("a = 1\nb = 2\n");
        assert!(!statements_equal(&one.statements, &two.statements));
        assert!(equal(&one.statements[0], &two.statements[0]));
    }
}
