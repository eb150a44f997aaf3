use crate::interpreter::{ExceptionKind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    Print,
    Len,
    Range,
    Str,
    Int,
    Float,
    Bool,
    List,
    Abs,
    Min,
    Max,
    Sum,
    Repr,
    Sorted,
    Isinstance,
    TimeSleep,
    TimeTime,
    MathSqrt,
    MathFloor,
    MathCeil,
}

impl BuiltinFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "print" => Some(Self::Print),
            "len" => Some(Self::Len),
            "range" => Some(Self::Range),
            "str" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "list" => Some(Self::List),
            "abs" => Some(Self::Abs),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "sum" => Some(Self::Sum),
            "repr" => Some(Self::Repr),
            "sorted" => Some(Self::Sorted),
            "isinstance" => Some(Self::Isinstance),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
            Self::Len => "len",
            Self::Range => "range",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Repr => "repr",
            Self::Sorted => "sorted",
            Self::Isinstance => "isinstance",
            Self::TimeSleep => "sleep",
            Self::TimeTime => "time",
            Self::MathSqrt => "sqrt",
            Self::MathFloor => "floor",
            Self::MathCeil => "ceil",
        }
    }

    /// Type name checked by `isinstance` when the builtin doubles as a type.
    pub fn type_name(self) -> Option<&'static str> {
        match self {
            Self::Str => Some("str"),
            Self::Int => Some("int"),
            Self::Float => Some("float"),
            Self::Bool => Some("bool"),
            Self::List => Some("list"),
            _ => None,
        }
    }
}

/// Modules available to `import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModule {
    Time,
    Math,
}

impl BuiltinModule {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "time" => Some(Self::Time),
            "math" => Some(Self::Math),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Math => "math",
        }
    }

    pub fn attribute(self, name: &str) -> Option<Value> {
        let function = match (self, name) {
            (Self::Time, "sleep") => BuiltinFunction::TimeSleep,
            (Self::Time, "time") => BuiltinFunction::TimeTime,
            (Self::Math, "sqrt") => BuiltinFunction::MathSqrt,
            (Self::Math, "floor") => BuiltinFunction::MathFloor,
            (Self::Math, "ceil") => BuiltinFunction::MathCeil,
            (Self::Math, "pi") => return Some(Value::Float(std::f64::consts::PI)),
            (Self::Math, "e") => return Some(Value::Float(std::f64::consts::E)),
            _ => return None,
        };
        Some(Value::Builtin(function))
    }
}

/// Methods of built-in container and string types, by receiver type name.
pub fn method_name(type_name: &str, name: &str) -> Option<&'static str> {
    const LIST: &[&str] = &["append", "pop", "extend", "insert", "index"];
    const STR: &[&str] = &[
        "upper",
        "lower",
        "strip",
        "split",
        "join",
        "startswith",
        "endswith",
        "replace",
    ];
    const DICT: &[&str] = &["get", "keys", "values", "items"];

    let methods = match type_name {
        "list" => LIST,
        "str" => STR,
        "dict" => DICT,
        _ => return None,
    };
    methods.iter().copied().find(|method| *method == name)
}

/// Global names that resolve when neither locals nor the environment bind
/// them.
pub fn lookup(name: &str) -> Option<Value> {
    if let Some(function) = BuiltinFunction::from_name(name) {
        return Some(Value::Builtin(function));
    }
    ExceptionKind::from_name(name).map(Value::ExceptionClass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_functions_and_exception_classes() {
        assert!(matches!(
            lookup("print"),
            Some(Value::Builtin(BuiltinFunction::Print))
        ));
        assert!(matches!(
            lookup("ValueError"),
            Some(Value::ExceptionClass(ExceptionKind::ValueError))
        ));
        assert!(lookup("sleep").is_none());
        assert!(lookup("undefined_name").is_none());
    }

    #[test]
    fn module_functions_need_their_module() {
        assert!(matches!(
            BuiltinModule::Time.attribute("sleep"),
            Some(Value::Builtin(BuiltinFunction::TimeSleep))
        ));
        assert!(BuiltinModule::Math.attribute("sleep").is_none());
        assert!(BuiltinModule::from_name("os").is_none());
    }

    #[test]
    fn methods_are_scoped_by_type() {
        assert_eq!(method_name("list", "append"), Some("append"));
        assert_eq!(method_name("str", "append"), None);
        assert_eq!(method_name("dict", "items"), Some("items"));
        assert_eq!(method_name("int", "items"), None);
    }
}
