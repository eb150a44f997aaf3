use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{
    BinaryOperator, BoolOperator, ExceptHandler, Expression, Statement, StatementKind, Target,
    UnaryOperator,
};
use crate::builtins::{self, BuiltinModule};

use super::environment::{Frame, FrameKind};
use super::error::{RaisedException, RuntimeError, expect_arity};
use super::value::{Class, Dict, Function, Instance, Param, Value, range_item, range_len};
use super::{Output, ops};

const MAX_CALL_DEPTH: usize = 200;

pub(super) type Result<T> = std::result::Result<T, RuntimeError>;

/// Control-flow marker for statement execution.
pub(super) enum ExecResult {
    Next,
    Return(Value),
    Break,
    Continue,
}

/// Executes statements and evaluates expressions against a frame.
pub(super) struct Runtime<'a> {
    pub(super) output: &'a mut Output,
    depth: usize,
    /// Exceptions being handled by enclosing `except` blocks, innermost last.
    handling: Vec<RuntimeError>,
    /// Line of the innermost nested statement the propagating error came
    /// from. Reset whenever an `except` clause catches the error.
    pub(super) origin: Option<usize>,
}

impl<'a> Runtime<'a> {
    pub(super) fn new(output: &'a mut Output) -> Self {
        Self {
            output,
            depth: 0,
            handling: Vec::new(),
            origin: None,
        }
    }

    pub(super) fn exec_block(
        &mut self,
        body: &[Statement],
        frame: &mut Frame<'_>,
    ) -> Result<ExecResult> {
        for statement in body {
            match self.exec_statement(statement, frame) {
                Ok(ExecResult::Next) => {}
                Ok(other) => return Ok(other),
                Err(error) => {
                    self.origin.get_or_insert(statement.span.start);
                    return Err(error);
                }
            }
        }
        Ok(ExecResult::Next)
    }

    pub(super) fn exec_statement(
        &mut self,
        statement: &Statement,
        frame: &mut Frame<'_>,
    ) -> Result<ExecResult> {
        match &statement.kind {
            StatementKind::Expr(expr) => {
                self.eval_expression(expr, frame)?;
            }
            StatementKind::Assign { targets, value } => {
                let value = self.eval_expression(value, frame)?;
                for target in targets {
                    self.assign(target, value.clone(), frame)?;
                }
            }
            StatementKind::AugAssign { target, op, value } => {
                self.exec_aug_assign(target, *op, value, frame)?;
            }
            StatementKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.eval_expression(value, frame)?;
                    self.assign(target, value, frame)?;
                }
            }
            StatementKind::FunctionDef { name, params, body, .. } => {
                if frame.kind() == FrameKind::Function {
                    return Err(RuntimeError::NestedDefinitionUnsupported { name: name.clone() });
                }
                let mut evaluated = Vec::with_capacity(params.len());
                for param in params {
                    let default = match &param.default {
                        Some(default) => Some(self.eval_expression(default, frame)?),
                        None => None,
                    };
                    evaluated.push(Param {
                        name: param.name.clone(),
                        default,
                    });
                }
                let function = Function {
                    name: name.clone(),
                    params: evaluated,
                    body: body.clone(),
                };
                frame.store(name.clone(), Value::Function(Rc::new(function)));
            }
            StatementKind::ClassDef { name, bases, body } => {
                if frame.kind() != FrameKind::Module {
                    return Err(RuntimeError::NestedDefinitionUnsupported { name: name.clone() });
                }
                let class = self.define_class(name, bases, body, frame)?;
                frame.store(name.clone(), Value::Class(Rc::new(class)));
            }
            StatementKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval_expression(value, frame)?,
                    None => Value::None,
                };
                return Ok(ExecResult::Return(value));
            }
            StatementKind::Pass => {}
            StatementKind::Break => return Ok(ExecResult::Break),
            StatementKind::Continue => return Ok(ExecResult::Continue),
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.eval_expression(condition, frame)?;
                let body = if condition.is_truthy() {
                    then_body
                } else {
                    else_body
                };
                return self.exec_block(body, frame);
            }
            StatementKind::While { condition, body } => loop {
                if !self.eval_expression(condition, frame)?.is_truthy() {
                    break;
                }
                match self.exec_block(body, frame)? {
                    ExecResult::Next | ExecResult::Continue => {}
                    ExecResult::Break => break,
                    ExecResult::Return(value) => return Ok(ExecResult::Return(value)),
                }
            },
            StatementKind::For {
                target,
                iterable,
                body,
            } => {
                let iterable = self.eval_expression(iterable, frame)?;
                for item in iterate(&iterable)? {
                    self.assign(target, item, frame)?;
                    match self.exec_block(body, frame)? {
                        ExecResult::Next | ExecResult::Continue => {}
                        ExecResult::Break => break,
                        ExecResult::Return(value) => return Ok(ExecResult::Return(value)),
                    }
                }
            }
            StatementKind::Try {
                body,
                handlers,
                else_body,
                finally_body,
            } => return self.exec_try(body, handlers, else_body, finally_body, frame),
            StatementKind::Raise(value) => {
                let error = match value {
                    Some(value) => {
                        let value = self.eval_expression(value, frame)?;
                        self.make_exception(value, frame)?
                    }
                    None => self
                        .handling
                        .last()
                        .cloned()
                        .unwrap_or(RuntimeError::NoActiveException),
                };
                return Err(error);
            }
            StatementKind::Assert { test, message } => {
                if !self.eval_expression(test, frame)?.is_truthy() {
                    let message = match message {
                        Some(message) => {
                            let message = self.eval_expression(message, frame)?;
                            Some(self.to_str(&message, frame)?)
                        }
                        None => None,
                    };
                    return Err(RuntimeError::AssertionFailed { message });
                }
            }
            StatementKind::Import { module, alias } => {
                let builtin = BuiltinModule::from_name(module).ok_or_else(|| {
                    RuntimeError::ModuleNotFound {
                        name: module.clone(),
                    }
                })?;
                let binding = alias.as_ref().unwrap_or(module);
                frame.store(binding.clone(), Value::Module(builtin));
            }
        }
        Ok(ExecResult::Next)
    }

    fn exec_aug_assign(
        &mut self,
        target: &Target,
        op: BinaryOperator,
        value: &Expression,
        frame: &mut Frame<'_>,
    ) -> Result<()> {
        match target {
            Target::Name(name) => {
                let current = self.load_name(name, frame)?;
                let operand = self.eval_expression(value, frame)?;
                let updated = self.augmented(op, current, &operand)?;
                frame.store(name.clone(), updated);
            }
            Target::Attribute { object, name } => {
                let object = self.eval_expression(object, frame)?;
                let current = self.get_attribute(&object, name)?;
                let operand = self.eval_expression(value, frame)?;
                let updated = self.augmented(op, current, &operand)?;
                self.set_attribute(&object, name, updated)?;
            }
            Target::Index { object, index } => {
                let object = self.eval_expression(object, frame)?;
                let index = self.eval_expression(index, frame)?;
                let current = get_item(&object, &index)?;
                let operand = self.eval_expression(value, frame)?;
                let updated = self.augmented(op, current, &operand)?;
                set_item(&object, index, updated)?;
            }
            Target::Tuple(_) | Target::List(_) => {
                return Err(RuntimeError::UnsupportedOperand {
                    operation: op.symbol(),
                    left: "tuple",
                    right: "tuple",
                });
            }
        }
        Ok(())
    }

    /// `+=` on a list extends it in place; everything else rebinds.
    fn augmented(&mut self, op: BinaryOperator, current: Value, operand: &Value) -> Result<Value> {
        if let (BinaryOperator::Add, Value::List(items)) = (op, &current) {
            let extra: Vec<Value> = iterate(operand)?.collect();
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        ops::binary(op, &current, operand)
    }

    fn define_class(
        &mut self,
        name: &str,
        bases: &[Expression],
        body: &[Statement],
        frame: &mut Frame<'_>,
    ) -> Result<Class> {
        let mut evaluated = Vec::with_capacity(bases.len());
        for base in bases {
            let base = self.eval_expression(base, frame)?;
            if !matches!(base, Value::Class(_) | Value::ExceptionClass(_)) {
                return Err(RuntimeError::InvalidArgumentType {
                    operation: "class".to_string(),
                    argument: "base".to_string(),
                    expected: "a class",
                    got: base.type_name(),
                });
            }
            evaluated.push(base);
        }

        let mut namespace = FxHashMap::default();
        {
            let mut class_frame = frame.child(&mut namespace, FrameKind::Class);
            match self.exec_block(body, &mut class_frame)? {
                ExecResult::Next => {}
                ExecResult::Return(_) => return Err(RuntimeError::ReturnOutsideFunction),
                ExecResult::Break | ExecResult::Continue => {
                    return Err(RuntimeError::LoopControlOutsideLoop);
                }
            }
        }

        Ok(Class {
            name: name.to_string(),
            bases: evaluated,
            attributes: RefCell::new(namespace),
        })
    }

    fn exec_try(
        &mut self,
        body: &[Statement],
        handlers: &[ExceptHandler],
        else_body: &[Statement],
        finally_body: &[Statement],
        frame: &mut Frame<'_>,
    ) -> Result<ExecResult> {
        let outcome = match self.exec_block(body, frame) {
            Ok(ExecResult::Next) => self.exec_block(else_body, frame),
            Ok(flow) => Ok(flow),
            Err(error) => self.handle_exception(error, handlers, frame),
        };

        if finally_body.is_empty() {
            return outcome;
        }
        let pending_origin = self.origin.take();
        match self.exec_block(finally_body, frame)? {
            ExecResult::Next => {
                self.origin = pending_origin;
                outcome
            }
            // A jump out of `finally` discards the pending outcome.
            flow => Ok(flow),
        }
    }

    fn handle_exception(
        &mut self,
        error: RuntimeError,
        handlers: &[ExceptHandler],
        frame: &mut Frame<'_>,
    ) -> Result<ExecResult> {
        for handler in handlers {
            let matches = match &handler.exception {
                None => true,
                Some(expr) => {
                    let class = self.eval_expression(expr, frame)?;
                    exception_matches(&error, &class)?
                }
            };
            if !matches {
                continue;
            }
            if let Some(name) = &handler.name {
                frame.store(name.clone(), exception_value(&error));
            }
            self.origin = None;
            self.handling.push(error);
            let result = self.exec_block(&handler.body, frame);
            self.handling.pop();
            return result;
        }
        Err(error)
    }

    /// Turns a raised value into the error that propagates.
    fn make_exception(&mut self, value: Value, frame: &mut Frame<'_>) -> Result<RuntimeError> {
        match value {
            Value::ExceptionClass(kind) => {
                Ok(RuntimeError::Raised(RaisedException::builtin(kind, "")))
            }
            Value::Exception { kind, message } => {
                Ok(RuntimeError::Raised(RaisedException::builtin(kind, message)))
            }
            Value::Class(class) if class.exception_base().is_some() => {
                let instance = self.call_value(Value::Class(class), Vec::new(), frame)?;
                self.make_exception(instance, frame)
            }
            Value::Instance(instance) => {
                let Some(kind) = instance.class.exception_base() else {
                    return Err(RuntimeError::NotAnException {
                        type_name: "object",
                    });
                };
                let message = self.exception_message(&instance, frame)?;
                Ok(RuntimeError::Raised(RaisedException {
                    kind,
                    class_name: instance.class.name.clone(),
                    message,
                    instance: Some(instance),
                }))
            }
            other => Err(RuntimeError::NotAnException {
                type_name: other.type_name(),
            }),
        }
    }

    pub(super) fn eval_expression(
        &mut self,
        expr: &Expression,
        frame: &mut Frame<'_>,
    ) -> Result<Value> {
        match expr {
            Expression::None => Ok(Value::None),
            Expression::Boolean(value) => Ok(Value::Boolean(*value)),
            Expression::Integer(value) => Ok(Value::Integer(*value)),
            Expression::Float(value) => Ok(Value::Float(*value)),
            Expression::String(value) => Ok(Value::String(value.clone())),
            Expression::Identifier(name) => self.load_name(name, frame),
            Expression::List(items) => Ok(Value::list(self.eval_all(items, frame)?)),
            Expression::Tuple(items) => Ok(Value::tuple(self.eval_all(items, frame)?)),
            Expression::Dict(entries) => {
                let mut dict = Dict::default();
                for (key, value) in entries {
                    let key = self.eval_expression(key, frame)?;
                    let value = self.eval_expression(value, frame)?;
                    dict.insert(key, value)?;
                }
                Ok(Value::dict(dict))
            }
            Expression::Attribute { object, name } => {
                let object = self.eval_expression(object, frame)?;
                self.get_attribute(&object, name)
            }
            Expression::Index { object, index } => {
                let object = self.eval_expression(object, frame)?;
                let index = self.eval_expression(index, frame)?;
                get_item(&object, &index)
            }
            Expression::Call { callee, args } => {
                let callee = self.eval_expression(callee, frame)?;
                let args = self.eval_all(args, frame)?;
                self.call_value(callee, args, frame)
            }
            Expression::Unary { op, operand } => {
                let operand = self.eval_expression(operand, frame)?;
                unary(*op, &operand)
            }
            Expression::BinaryOp { left, op, right } => {
                let left = self.eval_expression(left, frame)?;
                let right = self.eval_expression(right, frame)?;
                ops::binary(*op, &left, &right)
            }
            Expression::BoolOp { op, values } => {
                let mut result = Value::None;
                for value in values {
                    result = self.eval_expression(value, frame)?;
                    let settled = match op {
                        BoolOperator::And => !result.is_truthy(),
                        BoolOperator::Or => result.is_truthy(),
                    };
                    if settled {
                        break;
                    }
                }
                Ok(result)
            }
            Expression::Compare { left, comparisons } => {
                let mut left = self.eval_expression(left, frame)?;
                for (op, right) in comparisons {
                    let right = self.eval_expression(right, frame)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Boolean(false));
                    }
                    left = right;
                }
                Ok(Value::Boolean(true))
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expression], frame: &mut Frame<'_>) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval_expression(expr, frame)?);
        }
        Ok(values)
    }

    fn load_name(&self, name: &str, frame: &Frame<'_>) -> Result<Value> {
        frame
            .load(name)
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn assign(&mut self, target: &Target, value: Value, frame: &mut Frame<'_>) -> Result<()> {
        match target {
            Target::Name(name) => frame.store(name.clone(), value),
            Target::Tuple(targets) | Target::List(targets) => {
                let values: Vec<Value> = iterate(&value)?.collect();
                if values.len() != targets.len() {
                    return Err(RuntimeError::UnpackMismatch {
                        expected: targets.len(),
                        found: values.len(),
                    });
                }
                for (target, value) in targets.iter().zip(values) {
                    self.assign(target, value, frame)?;
                }
            }
            Target::Attribute { object, name } => {
                let object = self.eval_expression(object, frame)?;
                self.set_attribute(&object, name, value)?;
            }
            Target::Index { object, index } => {
                let object = self.eval_expression(object, frame)?;
                let index = self.eval_expression(index, frame)?;
                set_item(&object, index, value)?;
            }
        }
        Ok(())
    }

    pub(super) fn get_attribute(&self, object: &Value, name: &str) -> Result<Value> {
        let missing = |type_name: String| RuntimeError::UnknownAttribute {
            attribute: name.to_string(),
            type_name,
        };
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.fields.borrow().get(name) {
                    return Ok(value.clone());
                }
                match instance.class.lookup(name) {
                    Some(Value::Function(function)) => Ok(Value::BoundMethod {
                        receiver: Box::new(object.clone()),
                        function,
                    }),
                    Some(value) => Ok(value),
                    None => Err(missing(instance.class.name.clone())),
                }
            }
            Value::Class(class) => class
                .lookup(name)
                .ok_or_else(|| missing(class.name.clone())),
            Value::Module(module) => module
                .attribute(name)
                .ok_or_else(|| missing(format!("module {}", module.name()))),
            other => builtins::method_name(other.type_name(), name)
                .map(|method| Value::BuiltinMethod {
                    receiver: Box::new(other.clone()),
                    method,
                })
                .ok_or_else(|| missing(other.type_name().to_string())),
        }
    }

    fn set_attribute(&self, object: &Value, name: &str, value: Value) -> Result<()> {
        match object {
            Value::Instance(instance) => {
                instance.fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) => {
                class.attributes.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            other => Err(RuntimeError::UnknownAttribute {
                attribute: name.to_string(),
                type_name: other.type_name().to_string(),
            }),
        }
    }

    pub(super) fn call_value(
        &mut self,
        callee: Value,
        mut args: Vec<Value>,
        frame: &mut Frame<'_>,
    ) -> Result<Value> {
        match callee {
            Value::Function(function) => self.call_function(&function, args, frame),
            Value::BoundMethod { receiver, function } => {
                args.insert(0, *receiver);
                self.call_function(&function, args, frame)
            }
            Value::Class(class) => self.instantiate(class, args, frame),
            Value::Builtin(builtin) => self.call_builtin(builtin, args, frame),
            Value::BuiltinMethod { receiver, method } => {
                self.call_method(&receiver, method, args, frame)
            }
            Value::ExceptionClass(kind) => {
                let message = self.message_from_args(&args, frame)?;
                Ok(Value::Exception { kind, message })
            }
            other => Err(RuntimeError::ObjectNotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        frame: &mut Frame<'_>,
    ) -> Result<Value> {
        let required = function
            .params
            .iter()
            .take_while(|param| param.default.is_none())
            .count();
        expect_arity(&function.name, &args, required, function.params.len())?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimit);
        }

        let mut locals = FxHashMap::default();
        let mut args = args.into_iter();
        for param in &function.params {
            let value = match args.next() {
                Some(value) => value,
                None => param.default.clone().unwrap_or(Value::None),
            };
            locals.insert(param.name.clone(), value);
        }

        self.depth += 1;
        let result = {
            let mut call_frame = frame.child(&mut locals, FrameKind::Function);
            self.exec_block(&function.body, &mut call_frame)
        };
        self.depth -= 1;

        match result? {
            ExecResult::Next => Ok(Value::None),
            ExecResult::Return(value) => Ok(value),
            ExecResult::Break | ExecResult::Continue => Err(RuntimeError::LoopControlOutsideLoop),
        }
    }

    fn instantiate(
        &mut self,
        class: Rc<Class>,
        args: Vec<Value>,
        frame: &mut Frame<'_>,
    ) -> Result<Value> {
        let instance = Rc::new(Instance::new(Rc::clone(&class)));
        match class.lookup("__init__") {
            Some(Value::Function(init)) => {
                let mut init_args = Vec::with_capacity(args.len() + 1);
                init_args.push(Value::Instance(Rc::clone(&instance)));
                init_args.extend(args);
                self.call_function(&init, init_args, frame)?;
            }
            _ if class.exception_base().is_some() => {
                instance
                    .fields
                    .borrow_mut()
                    .insert("args".to_string(), Value::tuple(args));
            }
            _ => expect_arity(&class.name, &args, 0, 0)?,
        }
        Ok(Value::Instance(instance))
    }

    /// Calls `name` on an instance if its class defines it.
    pub(super) fn call_dunder(
        &mut self,
        instance: &Rc<Instance>,
        name: &str,
        frame: &mut Frame<'_>,
    ) -> Result<Option<Value>> {
        match instance.class.lookup(name) {
            Some(Value::Function(function)) => {
                let receiver = Value::Instance(Rc::clone(instance));
                self.call_function(&function, vec![receiver], frame).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn exception_message(&mut self, instance: &Rc<Instance>, frame: &mut Frame<'_>) -> Result<String> {
        self.to_str(&Value::Instance(Rc::clone(instance)), frame)
    }

    pub(super) fn message_from_args(&mut self, args: &[Value], frame: &mut Frame<'_>) -> Result<String> {
        match args {
            [] => Ok(String::new()),
            [single] => self.to_str(single, frame),
            many => self.to_str(&Value::tuple(many.to_vec()), frame),
        }
    }
}

fn unary(op: UnaryOperator, operand: &Value) -> Result<Value> {
    let unsupported = |operation| RuntimeError::UnsupportedUnaryOperand {
        operation,
        type_name: operand.type_name(),
    };
    match op {
        UnaryOperator::Not => Ok(Value::Boolean(!operand.is_truthy())),
        UnaryOperator::Negate => match operand {
            Value::Float(value) => Ok(Value::Float(-value)),
            other => other
                .as_int()
                .ok_or_else(|| unsupported("-"))?
                .checked_neg()
                .map(Value::Integer)
                .ok_or(RuntimeError::IntegerOverflow),
        },
        UnaryOperator::Plus => match operand {
            Value::Float(value) => Ok(Value::Float(*value)),
            other => other
                .as_int()
                .map(Value::Integer)
                .ok_or_else(|| unsupported("+")),
        },
    }
}

/// Values produced by iterating over `value`. Lists are iterated over a
/// snapshot taken when the loop starts.
pub(super) fn iterate(value: &Value) -> Result<Box<dyn Iterator<Item = Value>>> {
    match value {
        Value::List(items) => Ok(Box::new(items.borrow().clone().into_iter())),
        Value::Tuple(items) => Ok(Box::new(items.to_vec().into_iter())),
        Value::String(text) => Ok(Box::new(
            text.chars()
                .map(|ch| Value::String(ch.to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        )),
        Value::Dict(dict) => Ok(Box::new(
            dict.borrow()
                .entries()
                .iter()
                .map(|(key, _)| key.clone())
                .collect::<Vec<_>>()
                .into_iter(),
        )),
        range @ Value::Range { .. } => {
            let range = range.clone();
            Ok(Box::new(
                (0..range_len(&range))
                    .map_while(move |offset| range_item(&range, offset).map(Value::Integer)),
            ))
        }
        other => Err(RuntimeError::NotIterable {
            type_name: other.type_name(),
        }),
    }
}

pub(super) fn normalize_index(index: &Value, len: usize, type_name: &'static str) -> Result<usize> {
    let raw = index.as_int().ok_or(RuntimeError::InvalidIndexType {
        type_name,
        got: index.type_name(),
    })?;
    let (raw, len) = (i128::from(raw), len as i128);
    let resolved = if raw < 0 { raw + len } else { raw };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| RuntimeError::IndexOutOfRange { type_name })
    } else {
        Err(RuntimeError::IndexOutOfRange { type_name })
    }
}

pub(super) fn get_item(object: &Value, index: &Value) -> Result<Value> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let position = normalize_index(index, items.len(), "list")?;
            Ok(items[position].clone())
        }
        Value::Tuple(items) => {
            let position = normalize_index(index, items.len(), "tuple")?;
            Ok(items[position].clone())
        }
        Value::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            let position = normalize_index(index, chars.len(), "string")?;
            Ok(Value::String(chars[position].to_string()))
        }
        Value::Range { .. } => {
            let position = normalize_index(index, range_len(object), "range object")?;
            range_item(object, position)
                .map(Value::Integer)
                .ok_or(RuntimeError::IndexOutOfRange {
                    type_name: "range object",
                })
        }
        Value::Dict(dict) => {
            index.ensure_hashable()?;
            dict.borrow()
                .get(index)
                .cloned()
                .ok_or_else(|| RuntimeError::KeyNotFound { key: index.repr() })
        }
        other => Err(RuntimeError::NotSubscriptable {
            type_name: other.type_name(),
        }),
    }
}

fn set_item(object: &Value, index: Value, value: Value) -> Result<()> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let position = normalize_index(&index, items.len(), "list")?;
            items[position] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(index, value),
        other => Err(RuntimeError::NotItemAssignable {
            type_name: other.type_name(),
        }),
    }
}

fn exception_matches(error: &RuntimeError, class: &Value) -> Result<bool> {
    match class {
        Value::ExceptionClass(kind) => Ok(error.exception_kind().is_subclass_of(*kind)),
        Value::Class(class) if class.exception_base().is_some() => Ok(matches!(
            error,
            RuntimeError::Raised(RaisedException {
                instance: Some(instance),
                ..
            }) if instance.class.is_subclass_of(class)
        )),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if exception_matches(error, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(RuntimeError::NotAnExceptionClass),
    }
}

/// Value bound by `except ... as name`.
fn exception_value(error: &RuntimeError) -> Value {
    match error {
        RuntimeError::Raised(RaisedException {
            instance: Some(instance),
            ..
        }) => Value::Instance(Rc::clone(instance)),
        other => Value::Exception {
            kind: other.exception_kind(),
            message: other.message(),
        },
    }
}
