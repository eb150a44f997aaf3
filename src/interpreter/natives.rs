//! Built-in functions and methods of built-in types.

use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::ast::BinaryOperator;
use crate::builtins::BuiltinFunction;

use super::environment::Frame;
use super::error::{RuntimeError, expect_arity};
use super::ops;
use super::runtime::{Result, Runtime, iterate, normalize_index};
use super::value::{Dict, Value, range_len};

fn type_error(operation: &str, argument: &str, expected: &'static str, got: &Value) -> RuntimeError {
    RuntimeError::InvalidArgumentType {
        operation: operation.to_string(),
        argument: argument.to_string(),
        expected,
        got: got.type_name(),
    }
}

fn value_error(message: impl Into<String>) -> RuntimeError {
    RuntimeError::InvalidValue {
        message: message.into(),
    }
}

fn number(value: &Value, operation: &str, argument: &str) -> Result<f64> {
    value
        .as_float()
        .ok_or_else(|| type_error(operation, argument, "a number", value))
}

fn integer(value: &Value, operation: &str, argument: &str) -> Result<i64> {
    value
        .as_int()
        .ok_or_else(|| type_error(operation, argument, "an integer", value))
}

fn string<'v>(value: &'v Value, operation: &str, argument: &str) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| type_error(operation, argument, "str", value))
}

fn float_to_int(value: f64) -> Result<i64> {
    if value.is_nan() {
        return Err(value_error("cannot convert float NaN to integer"));
    }
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(truncated as i64)
}

fn parse_int(text: &str) -> Result<i64> {
    let cleaned: String = text.trim().chars().filter(|ch| *ch != '_').collect();
    cleaned.parse::<i64>().map_err(|_| {
        value_error(format!(
            "invalid literal for int() with base 10: {}",
            Value::from(text).repr()
        ))
    })
}

fn parse_float(text: &str) -> Result<f64> {
    text.trim().parse::<f64>().map_err(|_| {
        value_error(format!(
            "could not convert string to float: {}",
            Value::from(text).repr()
        ))
    })
}

fn single_or_iterable(args: Vec<Value>) -> Result<Vec<Value>> {
    match <[Value; 1]>::try_from(args) {
        Ok([iterable]) => Ok(iterate(&iterable)?.collect()),
        Err(args) => Ok(args),
    }
}

impl Runtime<'_> {
    pub(super) fn call_builtin(
        &mut self,
        builtin: BuiltinFunction,
        args: Vec<Value>,
        frame: &mut Frame<'_>,
    ) -> Result<Value> {
        let name = builtin.name();
        match builtin {
            BuiltinFunction::Print => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in &args {
                    parts.push(self.to_str(arg, frame)?);
                }
                self.output.write_line(&parts.join(" "));
                Ok(Value::None)
            }
            BuiltinFunction::Len => {
                expect_arity(name, &args, 1, 1)?;
                let len = match &args[0] {
                    Value::String(text) => text.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Dict(dict) => dict.borrow().len(),
                    range @ Value::Range { .. } => range_len(range),
                    other => return Err(type_error(name, "obj", "a sized object", other)),
                };
                i64::try_from(len)
                    .map(Value::Integer)
                    .map_err(|_| RuntimeError::IntegerOverflow)
            }
            BuiltinFunction::Range => {
                expect_arity(name, &args, 1, 3)?;
                let mut bounds = Vec::with_capacity(args.len());
                for (position, arg) in args.iter().enumerate() {
                    bounds.push(integer(arg, name, &(position + 1).to_string())?);
                }
                let (start, stop, step) = match *bounds.as_slice() {
                    [stop] => (0, stop, 1),
                    [start, stop] => (start, stop, 1),
                    [start, stop, step, ..] => (start, stop, step),
                    [] => (0, 0, 1),
                };
                if step == 0 {
                    return Err(value_error("range() arg 3 must not be zero"));
                }
                Ok(Value::Range { start, stop, step })
            }
            BuiltinFunction::Str => {
                expect_arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(value) => self.to_str(value, frame).map(Value::String),
                    None => Ok(Value::String(String::new())),
                }
            }
            BuiltinFunction::Int => {
                expect_arity(name, &args, 0, 1)?;
                let value = match args.first() {
                    None => 0,
                    Some(Value::Float(value)) => float_to_int(*value)?,
                    Some(Value::String(text)) => parse_int(text)?,
                    Some(other) => integer(other, name, "x")?,
                };
                Ok(Value::Integer(value))
            }
            BuiltinFunction::Float => {
                expect_arity(name, &args, 0, 1)?;
                let value = match args.first() {
                    None => 0.0,
                    Some(Value::String(text)) => parse_float(text)?,
                    Some(other) => number(other, name, "x")?,
                };
                Ok(Value::Float(value))
            }
            BuiltinFunction::Bool => {
                expect_arity(name, &args, 0, 1)?;
                Ok(Value::Boolean(args.first().is_some_and(Value::is_truthy)))
            }
            BuiltinFunction::List => {
                expect_arity(name, &args, 0, 1)?;
                match args.first() {
                    Some(iterable) => Ok(Value::list(iterate(iterable)?.collect())),
                    None => Ok(Value::list(Vec::new())),
                }
            }
            BuiltinFunction::Abs => {
                expect_arity(name, &args, 1, 1)?;
                match &args[0] {
                    Value::Float(value) => Ok(Value::Float(value.abs())),
                    other => integer(other, name, "x")?
                        .checked_abs()
                        .map(Value::Integer)
                        .ok_or(RuntimeError::IntegerOverflow),
                }
            }
            BuiltinFunction::Min | BuiltinFunction::Max => {
                if args.is_empty() {
                    return Err(RuntimeError::ArityMismatch {
                        name: name.to_string(),
                        expected: "at least 1".to_string(),
                        found: 0,
                    });
                }
                let mut values = single_or_iterable(args)?.into_iter();
                let Some(mut best) = values.next() else {
                    return Err(value_error(format!("{name}() arg is an empty sequence")));
                };
                for value in values {
                    let replace = if builtin == BuiltinFunction::Min {
                        ops::less_than(&value, &best)?
                    } else {
                        ops::less_than(&best, &value)?
                    };
                    if replace {
                        best = value;
                    }
                }
                Ok(best)
            }
            BuiltinFunction::Sum => {
                expect_arity(name, &args, 1, 2)?;
                let mut total = args.get(1).cloned().unwrap_or(Value::Integer(0));
                if total.as_str().is_some() {
                    return Err(type_error(name, "start", "a number", &total));
                }
                for value in iterate(&args[0])? {
                    total = ops::binary(BinaryOperator::Add, &total, &value)?;
                }
                Ok(total)
            }
            BuiltinFunction::Repr => {
                expect_arity(name, &args, 1, 1)?;
                self.to_repr(&args[0], frame).map(Value::String)
            }
            BuiltinFunction::Sorted => {
                expect_arity(name, &args, 1, 1)?;
                let items: Vec<Value> = iterate(&args[0])?.collect();
                Ok(Value::list(ops::sort_values(items)?))
            }
            BuiltinFunction::Isinstance => {
                expect_arity(name, &args, 2, 2)?;
                isinstance(&args[0], &args[1]).map(Value::Boolean)
            }
            BuiltinFunction::TimeSleep => {
                expect_arity(name, &args, 1, 1)?;
                let seconds = number(&args[0], name, "secs")?;
                if seconds.is_nan() || seconds < 0.0 {
                    return Err(value_error("sleep length must be non-negative"));
                }
                std::thread::sleep(
                    Duration::try_from_secs_f64(seconds).map_err(|_| RuntimeError::IntegerOverflow)?,
                );
                Ok(Value::None)
            }
            BuiltinFunction::TimeTime => {
                expect_arity(name, &args, 0, 0)?;
                let elapsed = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default();
                Ok(Value::Float(elapsed.as_secs_f64()))
            }
            BuiltinFunction::MathSqrt => {
                expect_arity(name, &args, 1, 1)?;
                let value = number(&args[0], name, "x")?;
                if value < 0.0 {
                    return Err(value_error("math domain error"));
                }
                Ok(Value::Float(value.sqrt()))
            }
            BuiltinFunction::MathFloor | BuiltinFunction::MathCeil => {
                expect_arity(name, &args, 1, 1)?;
                if let Some(value) = args[0].as_int() {
                    return Ok(Value::Integer(value));
                }
                let value = number(&args[0], name, "x")?;
                let rounded = if builtin == BuiltinFunction::MathFloor {
                    value.floor()
                } else {
                    value.ceil()
                };
                float_to_int(rounded).map(Value::Integer)
            }
        }
    }

    pub(super) fn call_method(
        &mut self,
        receiver: &Value,
        method: &'static str,
        args: Vec<Value>,
        frame: &mut Frame<'_>,
    ) -> Result<Value> {
        match receiver {
            Value::List(items) => match method {
                "append" => {
                    expect_arity(method, &args, 1, 1)?;
                    items.borrow_mut().extend(args);
                    Ok(Value::None)
                }
                "extend" => {
                    expect_arity(method, &args, 1, 1)?;
                    let extra: Vec<Value> = iterate(&args[0])?.collect();
                    items.borrow_mut().extend(extra);
                    Ok(Value::None)
                }
                "pop" => {
                    expect_arity(method, &args, 0, 1)?;
                    let mut items = items.borrow_mut();
                    if items.is_empty() {
                        return Err(RuntimeError::IndexOutOfRange { type_name: "pop" });
                    }
                    let position = match args.first() {
                        Some(index) => normalize_index(index, items.len(), "pop")?,
                        None => items.len() - 1,
                    };
                    Ok(items.remove(position))
                }
                "insert" => {
                    expect_arity(method, &args, 2, 2)?;
                    let index = integer(&args[0], method, "index")?;
                    let mut items = items.borrow_mut();
                    let len = items.len() as i64;
                    let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
                    items.insert(position as usize, args[1].clone());
                    Ok(Value::None)
                }
                "index" => {
                    expect_arity(method, &args, 1, 1)?;
                    items
                        .borrow()
                        .iter()
                        .position(|item| item.equals(&args[0]))
                        .map(|position| Value::Integer(position as i64))
                        .ok_or_else(|| value_error(format!("{} is not in list", args[0].repr())))
                }
                _ => Err(self.unknown_method(receiver, method)),
            },
            Value::String(text) => self.call_str_method(text, method, args),
            Value::Dict(dict) => {
                let dict = dict.borrow();
                match method {
                    "get" => {
                        expect_arity(method, &args, 1, 2)?;
                        args[0].ensure_hashable()?;
                        Ok(dict
                            .get(&args[0])
                            .cloned()
                            .or_else(|| args.get(1).cloned())
                            .unwrap_or(Value::None))
                    }
                    "keys" | "values" | "items" => {
                        expect_arity(method, &args, 0, 0)?;
                        let entries = dict.entries().iter();
                        let values = match method {
                            "keys" => entries.map(|(key, _)| key.clone()).collect(),
                            "values" => entries.map(|(_, value)| value.clone()).collect(),
                            _ => entries
                                .map(|(key, value)| Value::tuple(vec![key.clone(), value.clone()]))
                                .collect(),
                        };
                        Ok(Value::list(values))
                    }
                    _ => Err(self.unknown_method(receiver, method)),
                }
            }
            _ => Err(self.unknown_method(receiver, method)),
        }
    }

    fn call_str_method(
        &mut self,
        text: &str,
        method: &'static str,
        args: Vec<Value>,
    ) -> Result<Value> {
        match method {
            "upper" | "lower" | "strip" => {
                expect_arity(method, &args, 0, 0)?;
                Ok(Value::String(match method {
                    "upper" => text.to_uppercase(),
                    "lower" => text.to_lowercase(),
                    _ => text.trim().to_string(),
                }))
            }
            "split" => {
                expect_arity(method, &args, 0, 1)?;
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::None) => text.split_whitespace().map(Value::from).collect(),
                    Some(separator) => {
                        let separator = string(separator, method, "sep")?;
                        if separator.is_empty() {
                            return Err(value_error("empty separator"));
                        }
                        text.split(separator).map(Value::from).collect()
                    }
                };
                Ok(Value::list(parts))
            }
            "join" => {
                expect_arity(method, &args, 1, 1)?;
                let mut parts = Vec::new();
                for item in iterate(&args[0])? {
                    parts.push(string(&item, method, "iterable item")?.to_string());
                }
                Ok(Value::String(parts.join(text)))
            }
            "startswith" | "endswith" => {
                expect_arity(method, &args, 1, 1)?;
                let affix = string(&args[0], method, "prefix")?;
                Ok(Value::Boolean(if method == "startswith" {
                    text.starts_with(affix)
                } else {
                    text.ends_with(affix)
                }))
            }
            "replace" => {
                expect_arity(method, &args, 2, 2)?;
                let old = string(&args[0], method, "old")?;
                let new = string(&args[1], method, "new")?;
                Ok(Value::String(text.replace(old, new)))
            }
            _ => Err(self.unknown_method(&Value::from(text), method)),
        }
    }

    fn unknown_method(&self, receiver: &Value, method: &str) -> RuntimeError {
        RuntimeError::UnknownAttribute {
            attribute: method.to_string(),
            type_name: receiver.type_name().to_string(),
        }
    }

    /// `str(value)`, honouring script-defined `__str__` and `__repr__`.
    pub(super) fn to_str(&mut self, value: &Value, frame: &mut Frame<'_>) -> Result<String> {
        match value {
            Value::Instance(instance) => {
                if let Some(result) = self.call_dunder(instance, "__str__", frame)? {
                    return dunder_string("__str__", result);
                }
                if instance.class.exception_base().is_some() {
                    let args = instance.fields.borrow().get("args").cloned();
                    if let Some(Value::Tuple(args)) = args {
                        return self.message_from_args(&args, frame);
                    }
                }
                self.to_repr(value, frame)
            }
            Value::List(_) | Value::Tuple(_) | Value::Dict(_) => self.to_repr(value, frame),
            other => Ok(other.to_string()),
        }
    }

    /// `repr(value)`, honouring script-defined `__repr__`.
    pub(super) fn to_repr(&mut self, value: &Value, frame: &mut Frame<'_>) -> Result<String> {
        match value {
            Value::Instance(instance) => match self.call_dunder(instance, "__repr__", frame)? {
                Some(result) => dunder_string("__repr__", result),
                None => Ok(value.to_string()),
            },
            Value::List(items) => {
                let items = items.borrow().clone();
                Ok(format!("[{}]", self.join_repr(&items, frame)?))
            }
            Value::Tuple(items) if items.len() == 1 => {
                Ok(format!("({},)", self.to_repr(&items[0], frame)?))
            }
            Value::Tuple(items) => {
                let items = Rc::clone(items);
                Ok(format!("({})", self.join_repr(&items, frame)?))
            }
            Value::Dict(dict) => {
                let dict: Dict = dict.borrow().clone();
                let mut rendered = Vec::with_capacity(dict.len());
                for (key, value) in dict.entries() {
                    rendered.push(format!(
                        "{}: {}",
                        self.to_repr(key, frame)?,
                        self.to_repr(value, frame)?
                    ));
                }
                Ok(format!("{{{}}}", rendered.join(", ")))
            }
            other => Ok(other.repr()),
        }
    }

    fn join_repr(&mut self, items: &[Value], frame: &mut Frame<'_>) -> Result<String> {
        let mut rendered = Vec::with_capacity(items.len());
        for item in items {
            rendered.push(self.to_repr(item, frame)?);
        }
        Ok(rendered.join(", "))
    }
}

fn dunder_string(method: &str, result: Value) -> Result<String> {
    match result {
        Value::String(text) => Ok(text),
        other => Err(type_error(method, "return value", "str", &other)),
    }
}

/// `isinstance(value, class)`; `class` may be a tuple of classes.
fn isinstance(value: &Value, class: &Value) -> Result<bool> {
    match class {
        Value::Builtin(builtin) => match builtin.type_name() {
            Some("int") => Ok(matches!(value, Value::Integer(_) | Value::Boolean(_))),
            Some(type_name) => Ok(value.type_name() == type_name),
            None => Err(type_error("isinstance", "2", "a type or tuple of types", class)),
        },
        Value::Class(class) => Ok(match value {
            Value::Instance(instance) => instance.class.is_subclass_of(class),
            _ => false,
        }),
        Value::ExceptionClass(kind) => Ok(match value {
            Value::Exception { kind: raised, .. } => raised.is_subclass_of(*kind),
            Value::Instance(instance) => instance
                .class
                .exception_base()
                .is_some_and(|base| base.is_subclass_of(*kind)),
            _ => false,
        }),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if isinstance(value, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(type_error("isinstance", "2", "a type or tuple of types", other)),
    }
}
