//! Bound and referenced symbols of a single top-level statement.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::ast::{Expression, Statement, StatementKind, Target};

/// Names a statement introduces or rebinds at its own top level.
///
/// Definitions bind their name; assignments bind the names in their targets,
/// including names nested in tuple and list destructuring. Attribute and
/// subscript targets mutate an existing object and bind nothing.
pub fn bound_symbols(statement: &Statement) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    match &statement.kind {
        StatementKind::FunctionDef { name, .. } | StatementKind::ClassDef { name, .. } => {
            names.insert(name.clone());
        }
        StatementKind::Assign { targets, .. } => {
            for target in targets {
                target_names(target, &mut |name| {
                    names.insert(name.to_string());
                });
            }
        }
        StatementKind::AugAssign { target, .. } | StatementKind::AnnAssign { target, .. } => {
            target_names(target, &mut |name| {
                names.insert(name.to_string());
            });
        }
        _ => {}
    }
    names
}

/// Outer-scope names the statement reads or rebinds when executed.
///
/// Names local to a function or class body the statement defines are left
/// out, as are attribute names.
pub fn referenced_symbols(statement: &Statement) -> BTreeSet<String> {
    let mut collector = Collector {
        scopes: vec![Scope::module()],
        referenced: BTreeSet::new(),
    };
    collector.visit_statement(statement);
    collector.referenced
}

fn target_names(target: &Target, emit: &mut impl FnMut(&str)) {
    match target {
        Target::Name(name) => emit(name),
        Target::Tuple(items) | Target::List(items) => {
            for item in items {
                target_names(item, emit);
            }
        }
        Target::Attribute { .. } | Target::Index { .. } => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Function,
    Class,
}

struct Scope {
    kind: ScopeKind,
    locals: FxHashSet<String>,
}

impl Scope {
    fn module() -> Self {
        Self {
            kind: ScopeKind::Module,
            locals: FxHashSet::default(),
        }
    }

    fn nested(kind: ScopeKind, locals: FxHashSet<String>) -> Self {
        Self { kind, locals }
    }
}

struct Collector {
    scopes: Vec<Scope>,
    referenced: BTreeSet<String>,
}

impl Collector {
    fn current(&self) -> &Scope {
        // The module scope is pushed first and never popped.
        &self.scopes[self.scopes.len() - 1]
    }

    /// Resolves a use of `name` from the innermost scope outwards. Class
    /// scopes are only visible to code directly in the class body.
    fn use_name(&mut self, name: &str) {
        let innermost = self.scopes.len() - 1;
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            match scope.kind {
                ScopeKind::Module => {
                    self.referenced.insert(name.to_string());
                    return;
                }
                ScopeKind::Class if depth != innermost => continue,
                ScopeKind::Function | ScopeKind::Class => {
                    if scope.locals.contains(name) {
                        return;
                    }
                }
            }
        }
    }

    fn bind_name(&mut self, name: &str) {
        if self.current().kind == ScopeKind::Module {
            self.referenced.insert(name.to_string());
        }
    }

    fn visit_body(&mut self, body: &[Statement]) {
        for statement in body {
            self.visit_statement(statement);
        }
    }

    fn visit_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Expr(expr) => self.visit_expression(expr),
            StatementKind::Assign { targets, value } => {
                self.visit_expression(value);
                for target in targets {
                    self.visit_target(target);
                }
            }
            StatementKind::AugAssign { target, value, .. } => {
                self.visit_expression(value);
                // Reads the old value before rebinding it.
                if let Target::Name(name) = target {
                    self.use_name(name);
                }
                self.visit_target(target);
            }
            StatementKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                self.visit_expression(annotation);
                if let Some(value) = value {
                    self.visit_expression(value);
                }
                self.visit_target(target);
            }
            StatementKind::FunctionDef {
                name,
                params,
                returns,
                body,
            } => {
                for param in params {
                    if let Some(default) = &param.default {
                        self.visit_expression(default);
                    }
                    if let Some(annotation) = &param.annotation {
                        self.visit_expression(annotation);
                    }
                }
                if let Some(returns) = returns {
                    self.visit_expression(returns);
                }
                self.bind_name(name);

                let mut locals = assigned_names(body);
                locals.extend(params.iter().map(|param| param.name.clone()));
                self.scopes.push(Scope::nested(ScopeKind::Function, locals));
                self.visit_body(body);
                self.scopes.pop();
            }
            StatementKind::ClassDef { name, bases, body } => {
                for base in bases {
                    self.visit_expression(base);
                }
                self.bind_name(name);

                self.scopes
                    .push(Scope::nested(ScopeKind::Class, assigned_names(body)));
                self.visit_body(body);
                self.scopes.pop();
            }
            StatementKind::Return(value) | StatementKind::Raise(value) => {
                if let Some(value) = value {
                    self.visit_expression(value);
                }
            }
            StatementKind::Pass | StatementKind::Break | StatementKind::Continue => {}
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                self.visit_expression(condition);
                self.visit_body(then_body);
                self.visit_body(else_body);
            }
            StatementKind::While { condition, body } => {
                self.visit_expression(condition);
                self.visit_body(body);
            }
            StatementKind::For {
                target,
                iterable,
                body,
            } => {
                self.visit_expression(iterable);
                self.visit_target(target);
                self.visit_body(body);
            }
            StatementKind::Try {
                body,
                handlers,
                else_body,
                finally_body,
            } => {
                self.visit_body(body);
                for handler in handlers {
                    if let Some(exception) = &handler.exception {
                        self.visit_expression(exception);
                    }
                    if let Some(name) = &handler.name {
                        self.bind_name(name);
                    }
                    self.visit_body(&handler.body);
                }
                self.visit_body(else_body);
                self.visit_body(finally_body);
            }
            StatementKind::Assert { test, message } => {
                self.visit_expression(test);
                if let Some(message) = message {
                    self.visit_expression(message);
                }
            }
            StatementKind::Import { module, alias } => {
                self.bind_name(alias.as_deref().unwrap_or(module));
            }
        }
    }

    fn visit_target(&mut self, target: &Target) {
        match target {
            Target::Name(name) => self.bind_name(name),
            Target::Tuple(items) | Target::List(items) => {
                for item in items {
                    self.visit_target(item);
                }
            }
            Target::Attribute { object, .. } => self.visit_expression(object),
            Target::Index { object, index } => {
                self.visit_expression(object);
                self.visit_expression(index);
            }
        }
    }

    fn visit_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::None
            | Expression::Boolean(_)
            | Expression::Integer(_)
            | Expression::Float(_)
            | Expression::String(_) => {}
            Expression::Identifier(name) => self.use_name(name),
            Expression::List(items) | Expression::Tuple(items) => {
                for item in items {
                    self.visit_expression(item);
                }
            }
            Expression::Dict(entries) => {
                for (key, value) in entries {
                    self.visit_expression(key);
                    self.visit_expression(value);
                }
            }
            Expression::Attribute { object, .. } => self.visit_expression(object),
            Expression::Index { object, index } => {
                self.visit_expression(object);
                self.visit_expression(index);
            }
            Expression::Call { callee, args } => {
                self.visit_expression(callee);
                for arg in args {
                    self.visit_expression(arg);
                }
            }
            Expression::Unary { operand, .. } => self.visit_expression(operand),
            Expression::BinaryOp { left, right, .. } => {
                self.visit_expression(left);
                self.visit_expression(right);
            }
            Expression::BoolOp { values, .. } => {
                for value in values {
                    self.visit_expression(value);
                }
            }
            Expression::Compare { left, comparisons } => {
                self.visit_expression(left);
                for (_, right) in comparisons {
                    self.visit_expression(right);
                }
            }
        }
    }
}

/// Names bound directly in a function or class body. Nested definitions
/// contribute their own name but not their contents.
fn assigned_names(body: &[Statement]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    collect_assigned(body, &mut names);
    names
}

fn collect_assigned(body: &[Statement], names: &mut FxHashSet<String>) {
    for statement in body {
        match &statement.kind {
            StatementKind::Assign { targets, .. } => {
                for target in targets {
                    target_names(target, &mut |name| {
                        names.insert(name.to_string());
                    });
                }
            }
            StatementKind::AugAssign { target, .. } | StatementKind::AnnAssign { target, .. } => {
                target_names(target, &mut |name| {
                    names.insert(name.to_string());
                });
            }
            StatementKind::FunctionDef { name, .. } | StatementKind::ClassDef { name, .. } => {
                names.insert(name.clone());
            }
            StatementKind::Import { module, alias } => {
                names.insert(alias.clone().unwrap_or_else(|| module.clone()));
            }
            StatementKind::For { target, body, .. } => {
                target_names(target, &mut |name| {
                    names.insert(name.to_string());
                });
                collect_assigned(body, names);
            }
            StatementKind::If {
                then_body,
                else_body,
                ..
            } => {
                collect_assigned(then_body, names);
                collect_assigned(else_body, names);
            }
            StatementKind::While { body, .. } => collect_assigned(body, names),
            StatementKind::Try {
                body,
                handlers,
                else_body,
                finally_body,
            } => {
                collect_assigned(body, names);
                for handler in handlers {
                    if let Some(name) = &handler.name {
                        names.insert(name.clone());
                    }
                    collect_assigned(&handler.body, names);
                }
                collect_assigned(else_body, names);
                collect_assigned(finally_body, names);
            }
            StatementKind::Expr(_)
            | StatementKind::Return(_)
            | StatementKind::Pass
            | StatementKind::Break
            | StatementKind::Continue
            | StatementKind::Raise(_)
            | StatementKind::Assert { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn statement(source: &str) -> Statement {
        let mut statements = parse(source).expect("parse failed").statements;
        assert_eq!(statements.len(), 1, "expected a single statement");
        statements.remove(0)
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn binds_definition_names() {
        assert_eq!(bound_symbols(&statement("def f():\n    pass\n")), set(&["f"]));
        assert_eq!(bound_symbols(&statement("class C:\n    pass\n")), set(&["C"]));
    }

    #[test]
    fn binds_every_assignment_form() {
        assert_eq!(bound_symbols(&statement("a = 1\n")), set(&["a"]));
        assert_eq!(bound_symbols(&statement("a = b = 1\n")), set(&["a", "b"]));
        assert_eq!(
            bound_symbols(&statement("(a, [b, c]) = x\n")),
            set(&["a", "b", "c"])
        );
        assert_eq!(bound_symbols(&statement("a += 1\n")), set(&["a"]));
        assert_eq!(bound_symbols(&statement("a: int = 1\n")), set(&["a"]));
        assert_eq!(bound_symbols(&statement("a: int\n")), set(&["a"]));
    }

    #[test]
    fn mutation_and_other_statements_bind_nothing() {
        assert!(bound_symbols(&statement("a.b = 1\n")).is_empty());
        assert!(bound_symbols(&statement("a[0] = 1\n")).is_empty());
        assert!(bound_symbols(&statement("print(a)\n")).is_empty());
        assert!(bound_symbols(&statement("import time\n")).is_empty());
        assert!(bound_symbols(&statement("for i in x:\n    pass\n")).is_empty());
    }

    #[test]
    fn module_level_reads_and_writes_are_referenced() {
        assert_eq!(referenced_symbols(&statement("c = a + b\n")), set(&["a", "b", "c"]));
        assert_eq!(referenced_symbols(&statement("print(a)\n")), set(&["a", "print"]));
        assert_eq!(
            referenced_symbols(&statement("for i in range(n):\n    total += i\n")),
            set(&["i", "n", "range", "total"])
        );
    }

    #[test]
    fn attribute_names_are_not_symbols() {
        assert_eq!(
            referenced_symbols(&statement("time.sleep(delay)\n")),
            set(&["delay", "time"])
        );
        assert_eq!(referenced_symbols(&statement("obj.field = 1\n")), set(&["obj"]));
    }

    #[test]
    fn function_locals_are_not_free() {
        let def = statement(indoc! {"
            def f(x, scale=factor):
                y = x * scale
                for i in items:
                    y += i
                return helper(y)
        "});
        assert_eq!(
            referenced_symbols(&def),
            set(&["f", "factor", "helper", "items"])
        );
    }

    #[test]
    fn methods_do_not_see_class_scope() {
        let class = statement(indoc! {"
            class Counter(Base):
                start = origin
                def bump(self):
                    return start + 1
        "});
        assert_eq!(
            referenced_symbols(&class),
            set(&["Base", "Counter", "origin", "start"])
        );
    }

    #[test]
    fn try_handlers_and_imports_bind_at_module_level() {
        let statement = statement(indoc! {"
            try:
                import math as m
            except ValueError as err:
                print(err)
        "});
        assert_eq!(
            referenced_symbols(&statement),
            set(&["ValueError", "err", "m", "print"])
        );
    }
}
