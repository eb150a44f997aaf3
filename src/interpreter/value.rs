use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::Statement;
use crate::builtins::{BuiltinFunction, BuiltinModule};

use super::{ExceptionKind, RuntimeError};

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type DictRef = Rc<RefCell<Dict>>;

/// A script value. Lists, dicts, instances and classes are shared by
/// reference; everything else behaves as an immutable value.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(ListRef),
    Tuple(Rc<[Value]>),
    Dict(DictRef),
    Range { start: i64, stop: i64, step: i64 },
    Function(Rc<Function>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    BoundMethod {
        receiver: Box<Value>,
        function: Rc<Function>,
    },
    Builtin(BuiltinFunction),
    BuiltinMethod {
        receiver: Box<Value>,
        method: &'static str,
    },
    Module(BuiltinModule),
    ExceptionClass(ExceptionKind),
    Exception { kind: ExceptionKind, message: String },
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Statement>,
}

#[derive(Debug)]
pub struct Param {
    pub name: String,
    /// Evaluated once, when the `def` statement runs.
    pub default: Option<Value>,
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub bases: Vec<Value>,
    pub attributes: RefCell<FxHashMap<String, Value>>,
}

impl Class {
    /// Looks `name` up on the class, then depth-first through its bases.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attributes.borrow().get(name) {
            return Some(value.clone());
        }
        self.bases.iter().find_map(|base| match base {
            Value::Class(class) => class.lookup(name),
            _ => None,
        })
    }

    /// Built-in exception class this class derives from, if any.
    pub fn exception_base(&self) -> Option<ExceptionKind> {
        self.bases.iter().find_map(|base| match base {
            Value::ExceptionClass(kind) => Some(*kind),
            Value::Class(class) => class.exception_base(),
            _ => None,
        })
    }

    pub fn is_subclass_of(self: &Rc<Self>, other: &Rc<Class>) -> bool {
        Rc::ptr_eq(self, other)
            || self.bases.iter().any(|base| match base {
                Value::Class(class) => class.is_subclass_of(other),
                _ => false,
            })
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<FxHashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(FxHashMap::default()),
        }
    }
}

/// Insertion-ordered mapping. Keys are compared with script equality, so
/// lookups are linear.
#[derive(Debug, Default, Clone)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.equals(key))
            .map(|(_, value)| value)
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), RuntimeError> {
        key.ensure_hashable()?;
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.equals(&key))
        {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

impl Value {
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn tuple(values: Vec<Value>) -> Self {
        Value::Tuple(values.into())
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            Value::Boolean(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            other => other.as_int().map(|value| value as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range { .. } => "range",
            Value::Function(_) => "function",
            Value::Class(_) | Value::ExceptionClass(_) => "type",
            Value::Instance(_) => "object",
            Value::BoundMethod { .. } => "method",
            Value::Builtin(_) | Value::BuiltinMethod { .. } => "builtin_function_or_method",
            Value::Module(_) => "module",
            Value::Exception { .. } => "exception",
        }
    }

    /// Type name as the user sees it, including script-defined classes.
    pub fn class_name(&self) -> String {
        match self {
            Value::Instance(instance) => instance.class.name.clone(),
            Value::Exception { kind, .. } => kind.name().to_string(),
            other => other.type_name().to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Boolean(value) => *value,
            Value::Integer(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::String(value) => !value.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            Value::Range { .. } => range_len(self) > 0,
            Value::Function(_)
            | Value::Class(_)
            | Value::Instance(_)
            | Value::BoundMethod { .. }
            | Value::Builtin(_)
            | Value::BuiltinMethod { .. }
            | Value::Module(_)
            | Value::ExceptionClass(_)
            | Value::Exception { .. } => true,
        }
    }

    /// Script `==`.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::String(left), Value::String(right)) => left == right,
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                match (self.as_float(), other.as_float()) {
                    (Some(left), Some(right)) => left == right,
                    _ => false,
                }
            }
            (
                Value::Integer(_) | Value::Boolean(_),
                Value::Integer(_) | Value::Boolean(_),
            ) => self.as_int() == other.as_int(),
            (Value::List(left), Value::List(right)) => {
                Rc::ptr_eq(left, right) || sequences_equal(&left.borrow(), &right.borrow())
            }
            (Value::Tuple(left), Value::Tuple(right)) => sequences_equal(left, right),
            (Value::Dict(left), Value::Dict(right)) => {
                if Rc::ptr_eq(left, right) {
                    return true;
                }
                let left = left.borrow();
                let right = right.borrow();
                left.len() == right.len()
                    && left.entries().iter().all(|(key, value)| {
                        right.get(key).is_some_and(|other| value.equals(other))
                    })
            }
            (
                Value::Range { .. },
                Value::Range { .. },
            ) => ranges_equal(self, other),
            _ => self.is_same(other),
        }
    }

    /// Script `is`.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Boolean(left), Value::Boolean(right)) => left == right,
            (Value::Integer(left), Value::Integer(right)) => left == right,
            (Value::List(left), Value::List(right)) => Rc::ptr_eq(left, right),
            (Value::Tuple(left), Value::Tuple(right)) => Rc::ptr_eq(left, right),
            (Value::Dict(left), Value::Dict(right)) => Rc::ptr_eq(left, right),
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::Class(left), Value::Class(right)) => Rc::ptr_eq(left, right),
            (Value::Instance(left), Value::Instance(right)) => Rc::ptr_eq(left, right),
            (Value::Builtin(left), Value::Builtin(right)) => left == right,
            (Value::Module(left), Value::Module(right)) => left == right,
            (Value::ExceptionClass(left), Value::ExceptionClass(right)) => left == right,
            _ => false,
        }
    }

    pub fn ensure_hashable(&self) -> Result<(), RuntimeError> {
        match self {
            Value::List(_) | Value::Dict(_) => Err(RuntimeError::Unhashable {
                type_name: self.type_name(),
            }),
            Value::Tuple(items) => items.iter().try_for_each(Value::ensure_hashable),
            _ => Ok(()),
        }
    }

    /// `repr()` without consulting script-defined `__repr__` methods.
    pub fn repr(&self) -> String {
        match self {
            Value::String(value) => quote(value),
            Value::Exception { kind, message } => format!("{}({})", kind.name(), quote(message)),
            other => other.to_string(),
        }
    }
}

fn sequences_equal(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(left, right)| left.equals(right))
}

fn range_bounds(range: &Value) -> Option<(i128, i128, i128)> {
    match range {
        Value::Range { start, stop, step } => {
            Some((i128::from(*start), i128::from(*stop), i128::from(*step)))
        }
        _ => None,
    }
}

/// Number of values a range yields. Bounds are `i64`, so the length always
/// fits a 64-bit `usize`.
pub(super) fn range_len(range: &Value) -> usize {
    let Some((start, stop, step)) = range_bounds(range) else {
        return 0;
    };
    let span = if step > 0 { stop - start } else { start - stop };
    if span <= 0 || step == 0 {
        return 0;
    }
    usize::try_from((span + step.abs() - 1) / step.abs()).unwrap_or(usize::MAX)
}

/// Value at `offset`, or `None` past the end.
pub(super) fn range_item(range: &Value, offset: usize) -> Option<i64> {
    let (start, _, step) = range_bounds(range)?;
    if offset >= range_len(range) {
        return None;
    }
    i64::try_from(start + offset as i128 * step).ok()
}

pub(super) fn range_contains(range: &Value, value: i64) -> bool {
    let Some((start, stop, step)) = range_bounds(range) else {
        return false;
    };
    let value = i128::from(value);
    let within = if step > 0 {
        start <= value && value < stop
    } else {
        stop < value && value <= start
    };
    step != 0 && within && (value - start) % step == 0
}

/// Ranges compare by the values they yield.
fn ranges_equal(left: &Value, right: &Value) -> bool {
    let len = range_len(left);
    if len != range_len(right) {
        return false;
    }
    match (range_bounds(left), range_bounds(right)) {
        _ if len == 0 => true,
        (Some((left_start, _, left_step)), Some((right_start, _, right_step))) => {
            left_start == right_start && (len == 1 || left_step == right_step)
        }
        _ => false,
    }
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn quote(value: &str) -> String {
    let delimiter = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push(delimiter);
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            ch if ch == delimiter => {
                quoted.push('\\');
                quoted.push(ch);
            }
            ch => quoted.push(ch),
        }
    }
    quoted.push(delimiter);
    quoted
}

fn join_repr<'a>(items: impl IntoIterator<Item = &'a Value>) -> String {
    items
        .into_iter()
        .map(Value::repr)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `str()` without consulting script-defined `__str__` methods.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => f.write_str(&format_float(*value)),
            Value::String(value) => f.write_str(value),
            Value::List(items) => write!(f, "[{}]", join_repr(items.borrow().iter())),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Value::Tuple(items) => write!(f, "({})", join_repr(items.iter())),
            Value::Dict(dict) => {
                let rendered = dict
                    .borrow()
                    .entries()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.repr(), value.repr()))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{rendered}}}")
            }
            Value::Range { start, stop, step } if *step == 1 => {
                write!(f, "range({start}, {stop})")
            }
            Value::Range { start, stop, step } => write!(f, "range({start}, {stop}, {step})"),
            Value::Function(function) => write!(f, "<function {}>", function.name),
            Value::Class(class) => write!(f, "<class '{}'>", class.name),
            Value::Instance(instance) => write!(f, "<{} object>", instance.class.name),
            Value::BoundMethod { function, .. } => write!(f, "<bound method {}>", function.name),
            Value::Builtin(function) => write!(f, "<built-in function {}>", function.name()),
            Value::BuiltinMethod { receiver, method } => write!(
                f,
                "<built-in method {method} of {} object>",
                receiver.type_name()
            ),
            Value::Module(module) => write!(f, "<module '{}'>", module.name()),
            Value::ExceptionClass(kind) => write!(f, "<class '{}'>", kind.name()),
            Value::Exception { message, .. } => f.write_str(message),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_like_python() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::from("it's").repr(), "\"it's\"");
        assert_eq!(Value::from("a\nb").repr(), "'a\\nb'");
        assert_eq!(
            Value::list(vec![Value::from(1), Value::from("x"), Value::None]).to_string(),
            "[1, 'x', None]"
        );
        assert_eq!(Value::tuple(vec![Value::from(1)]).to_string(), "(1,)");
        assert_eq!(
            Value::Range {
                start: 0,
                stop: 10,
                step: 2
            }
            .to_string(),
            "range(0, 10, 2)"
        );
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(Value::from(1).equals(&Value::from(1.0)));
        assert!(Value::from(true).equals(&Value::from(1)));
        assert!(!Value::from(1).equals(&Value::from("1")));
    }

    #[test]
    fn lists_compare_by_contents_and_identity_separately() {
        let left = Value::list(vec![Value::from(1)]);
        let right = Value::list(vec![Value::from(1)]);
        assert!(left.equals(&right));
        assert!(!left.is_same(&right));
        assert!(left.is_same(&left.clone()));
    }

    #[test]
    fn dict_keys_must_be_hashable() {
        let mut dict = Dict::default();
        dict.insert(Value::from("a"), Value::from(1)).expect("str key");
        dict.insert(Value::from("a"), Value::from(2)).expect("overwrite");
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::from("a")).and_then(Value::as_int), Some(2));
        assert_eq!(
            dict.insert(Value::list(vec![]), Value::None),
            Err(RuntimeError::Unhashable { type_name: "list" })
        );
    }

    #[test]
    fn range_length_handles_negative_steps() {
        let range = |start, stop, step| Value::Range { start, stop, step };
        assert_eq!(range_len(&range(0, 5, 1)), 5);
        assert_eq!(range_len(&range(0, 5, 2)), 3);
        assert_eq!(range_len(&range(5, 0, -2)), 3);
        assert_eq!(range_len(&range(5, 5, 1)), 0);
        assert_eq!(range_item(&range(3, 0, -1), 2), Some(1));
        assert_eq!(range_item(&range(3, 0, -1), 3), None);
    }

    #[test]
    fn extreme_range_bounds_stay_exact() {
        let range = |start, stop, step| Value::Range { start, stop, step };
        let wide = range(i64::MIN, i64::MAX, 1 << 62);
        assert_eq!(range_len(&wide), 4);
        assert_eq!(range_item(&wide, 3), Some(1 << 62));
        assert_eq!(range_item(&wide, 4), None);
        assert!(range_contains(&wide, 0));
        assert!(!range_contains(&wide, 1));

        let full = range(i64::MIN, i64::MAX, 1);
        assert_eq!(range_len(&full), u64::MAX as usize);
        assert_eq!(range_item(&full, u64::MAX as usize - 1), Some(i64::MAX - 1));
        assert!(range_contains(&full, -5));
        assert!(!range_contains(&full, i64::MAX));

        let down = range(i64::MAX, i64::MIN, -(1 << 62));
        assert_eq!(range_len(&down), 4);
        assert!(range_contains(&down, i64::MAX - (1 << 62)));
    }

    #[test]
    fn ranges_compare_by_yielded_values() {
        let range = |start, stop, step| Value::Range { start, stop, step };
        assert!(range(0, 0, 1).equals(&range(5, 2, 1)));
        assert!(range(0, 3, 5).equals(&range(0, 1, 1)));
        assert!(range(0, 6, 2).equals(&range(0, 5, 2)));
        assert!(!range(0, 6, 2).equals(&range(0, 6, 3)));
    }
}
