use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use super::value::{Instance, Value};

/// Built-in exception classes, used both for `raise`/`except` in scripts and
/// to classify interpreter faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    BaseException,
    Exception,
    ArithmeticError,
    LookupError,
    ValueError,
    TypeError,
    NameError,
    ZeroDivisionError,
    OverflowError,
    IndexError,
    KeyError,
    AttributeError,
    AssertionError,
    ImportError,
    RuntimeError,
    RecursionError,
    SyntaxError,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 17] = [
        ExceptionKind::BaseException,
        ExceptionKind::Exception,
        ExceptionKind::ArithmeticError,
        ExceptionKind::LookupError,
        ExceptionKind::ValueError,
        ExceptionKind::TypeError,
        ExceptionKind::NameError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::OverflowError,
        ExceptionKind::IndexError,
        ExceptionKind::KeyError,
        ExceptionKind::AttributeError,
        ExceptionKind::AssertionError,
        ExceptionKind::ImportError,
        ExceptionKind::RuntimeError,
        ExceptionKind::RecursionError,
        ExceptionKind::SyntaxError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BaseException => "BaseException",
            Self::Exception => "Exception",
            Self::ArithmeticError => "ArithmeticError",
            Self::LookupError => "LookupError",
            Self::ValueError => "ValueError",
            Self::TypeError => "TypeError",
            Self::NameError => "NameError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::AttributeError => "AttributeError",
            Self::AssertionError => "AssertionError",
            Self::ImportError => "ImportError",
            Self::RuntimeError => "RuntimeError",
            Self::RecursionError => "RecursionError",
            Self::SyntaxError => "SyntaxError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn parent(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::Exception => Some(Self::BaseException),
            Self::ZeroDivisionError | Self::OverflowError => Some(Self::ArithmeticError),
            Self::IndexError | Self::KeyError => Some(Self::LookupError),
            Self::RecursionError => Some(Self::RuntimeError),
            Self::ArithmeticError
            | Self::LookupError
            | Self::ValueError
            | Self::TypeError
            | Self::NameError
            | Self::AttributeError
            | Self::AssertionError
            | Self::ImportError
            | Self::RuntimeError
            | Self::SyntaxError => Some(Self::Exception),
        }
    }

    pub fn is_subclass_of(self, other: Self) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exception raised by a script with `raise`.
#[derive(Debug, Clone)]
pub struct RaisedException {
    /// Nearest built-in ancestor.
    pub kind: ExceptionKind,
    pub class_name: String,
    pub message: String,
    /// Set when the raised object is an instance of a script-defined class.
    pub instance: Option<Rc<Instance>>,
}

impl RaisedException {
    pub fn builtin(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            class_name: kind.name().to_string(),
            message: message.into(),
            instance: None,
        }
    }
}

impl PartialEq for RaisedException {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.class_name == other.class_name
            && self.message == other.message
            && match (&self.instance, &other.instance) {
                (Some(left), Some(right)) => Rc::ptr_eq(left, right),
                (None, None) => true,
                _ => false,
            }
    }
}

impl fmt::Display for RaisedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.class_name)
        } else {
            write!(f, "{}: {}", self.class_name, self.message)
        }
    }
}

/// Typed faults produced while executing a statement.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("name '{name}' is not defined")]
    UndefinedVariable { name: String },
    #[error("unsupported operand type(s) for {operation}: '{left}' and '{right}'")]
    UnsupportedOperand {
        operation: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("bad operand type for unary {operation}: '{type_name}'")]
    UnsupportedUnaryOperand {
        operation: &'static str,
        type_name: &'static str,
    },
    #[error("'{operation}' not supported between instances of '{left}' and '{right}'")]
    UnorderableTypes {
        operation: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("'{type_name}' object is not callable")]
    ObjectNotCallable { type_name: &'static str },
    #[error("'{type_name}' object is not subscriptable")]
    NotSubscriptable { type_name: &'static str },
    #[error("'{type_name}' object does not support item assignment")]
    NotItemAssignable { type_name: &'static str },
    #[error("'{type_name}' object is not iterable")]
    NotIterable { type_name: &'static str },
    #[error("{type_name} indices must be integers, not '{got}'")]
    InvalidIndexType {
        type_name: &'static str,
        got: &'static str,
    },
    #[error("unhashable type: '{type_name}'")]
    Unhashable { type_name: &'static str },
    #[error("{name}() expected {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("{operation}() argument '{argument}' must be {expected}, not '{got}'")]
    InvalidArgumentType {
        operation: String,
        argument: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("{message}")]
    InvalidValue { message: String },
    #[error("'{type_name}' object has no attribute '{attribute}'")]
    UnknownAttribute {
        attribute: String,
        type_name: String,
    },
    #[error("{type_name} index out of range")]
    IndexOutOfRange { type_name: &'static str },
    #[error("{key}")]
    KeyNotFound { key: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("repeated {type_name} is too long")]
    SequenceTooLong { type_name: &'static str },
    #[error("cannot unpack {found} values into {expected} targets")]
    UnpackMismatch { expected: usize, found: usize },
    #[error("{}", .message.as_deref().unwrap_or(""))]
    AssertionFailed { message: Option<String> },
    #[error("No module named '{name}'")]
    ModuleNotFound { name: String },
    #[error("maximum recursion depth exceeded")]
    RecursionLimit,
    #[error("exceptions must derive from BaseException, not '{type_name}'")]
    NotAnException { type_name: &'static str },
    #[error("catching classes that do not inherit from BaseException is not allowed")]
    NotAnExceptionClass,
    #[error("No active exception to reraise")]
    NoActiveException,
    #[error("Nested definition of '{name}' is not supported")]
    NestedDefinitionUnsupported { name: String },
    #[error("'return' outside function")]
    ReturnOutsideFunction,
    #[error("'break' or 'continue' outside loop")]
    LoopControlOutsideLoop,
    #[error("{0}")]
    Raised(RaisedException),
}

impl RuntimeError {
    /// The built-in exception class an `except` clause sees this fault as.
    pub fn exception_kind(&self) -> ExceptionKind {
        match self {
            RuntimeError::UndefinedVariable { .. } => ExceptionKind::NameError,
            RuntimeError::UnsupportedOperand { .. }
            | RuntimeError::UnsupportedUnaryOperand { .. }
            | RuntimeError::UnorderableTypes { .. }
            | RuntimeError::ObjectNotCallable { .. }
            | RuntimeError::NotSubscriptable { .. }
            | RuntimeError::NotItemAssignable { .. }
            | RuntimeError::NotIterable { .. }
            | RuntimeError::InvalidIndexType { .. }
            | RuntimeError::Unhashable { .. }
            | RuntimeError::ArityMismatch { .. }
            | RuntimeError::InvalidArgumentType { .. }
            | RuntimeError::NotAnException { .. }
            | RuntimeError::NotAnExceptionClass => ExceptionKind::TypeError,
            RuntimeError::InvalidValue { .. } | RuntimeError::UnpackMismatch { .. } => {
                ExceptionKind::ValueError
            }
            RuntimeError::UnknownAttribute { .. } => ExceptionKind::AttributeError,
            RuntimeError::IndexOutOfRange { .. } => ExceptionKind::IndexError,
            RuntimeError::KeyNotFound { .. } => ExceptionKind::KeyError,
            RuntimeError::DivisionByZero => ExceptionKind::ZeroDivisionError,
            RuntimeError::IntegerOverflow | RuntimeError::SequenceTooLong { .. } => {
                ExceptionKind::OverflowError
            }
            RuntimeError::AssertionFailed { .. } => ExceptionKind::AssertionError,
            RuntimeError::ModuleNotFound { .. } => ExceptionKind::ImportError,
            RuntimeError::RecursionLimit => ExceptionKind::RecursionError,
            RuntimeError::NoActiveException => ExceptionKind::RuntimeError,
            RuntimeError::NestedDefinitionUnsupported { .. }
            | RuntimeError::ReturnOutsideFunction
            | RuntimeError::LoopControlOutsideLoop => ExceptionKind::SyntaxError,
            RuntimeError::Raised(exception) => exception.kind,
        }
    }

    /// Class name shown to the user, which for raised script exceptions may
    /// be a script-defined class.
    pub fn class_name(&self) -> &str {
        match self {
            RuntimeError::Raised(exception) => &exception.class_name,
            other => other.exception_kind().name(),
        }
    }

    /// Message part of the exception, without the class name.
    pub fn message(&self) -> String {
        match self {
            RuntimeError::Raised(exception) => exception.message.clone(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn expect_arity(
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<(), RuntimeError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    Err(RuntimeError::ArityMismatch {
        name: name.to_string(),
        expected,
        found: args.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_hierarchy_follows_parents() {
        assert!(ExceptionKind::ZeroDivisionError.is_subclass_of(ExceptionKind::ArithmeticError));
        assert!(ExceptionKind::KeyError.is_subclass_of(ExceptionKind::Exception));
        assert!(ExceptionKind::RecursionError.is_subclass_of(ExceptionKind::RuntimeError));
        assert!(!ExceptionKind::ValueError.is_subclass_of(ExceptionKind::TypeError));
        assert!(!ExceptionKind::BaseException.is_subclass_of(ExceptionKind::Exception));
    }

    #[test]
    fn names_round_trip() {
        for kind in ExceptionKind::ALL {
            assert_eq!(ExceptionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ExceptionKind::from_name("KeyboardInterrupt"), None);
    }

    #[test]
    fn faults_map_to_exception_classes() {
        let error = RuntimeError::UndefinedVariable {
            name: "x".to_string(),
        };
        assert_eq!(error.exception_kind(), ExceptionKind::NameError);
        assert_eq!(error.class_name(), "NameError");
        assert_eq!(error.message(), "name 'x' is not defined");

        let raised = RuntimeError::Raised(RaisedException::builtin(ExceptionKind::ValueError, "bad"));
        assert_eq!(raised.to_string(), "ValueError: bad");
        assert_eq!(raised.message(), "bad");
    }
}
