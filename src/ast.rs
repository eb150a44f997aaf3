//! Syntax tree shared by the incremental engine and the interpreter.
//!
//! Statements carry a [`LineSpan`] for run-state reporting. Expressions carry
//! no position at all, so structural identity only ever has to skip statement
//! spans (see `compare` and `diff::fingerprint`).

use serde::Serialize;

/// First and last source line (1-based, inclusive) covered by a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    None,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    List(Vec<Expression>),
    Tuple(Vec<Expression>),
    Dict(Vec<(Expression, Expression)>),
    Attribute {
        object: Box<Expression>,
        name: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// `a and b and c` / `a or b`, short-circuiting left to right.
    BoolOp {
        op: BoolOperator,
        values: Vec<Expression>,
    },
    /// Chained comparison `a < b <= c`.
    Compare {
        left: Box<Expression>,
        comparisons: Vec<(CompareOperator, Expression)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoolOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOperator::Equal => "==",
            CompareOperator::NotEqual => "!=",
            CompareOperator::Less => "<",
            CompareOperator::LessEqual => "<=",
            CompareOperator::Greater => ">",
            CompareOperator::GreaterEqual => ">=",
            CompareOperator::In => "in",
            CompareOperator::NotIn => "not in",
            CompareOperator::Is => "is",
            CompareOperator::IsNot => "is not",
        }
    }
}

/// Assignment target forms accepted by the parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Target {
    Name(String),
    Tuple(Vec<Target>),
    List(Vec<Target>),
    Attribute { object: Expression, name: String },
    Index { object: Expression, index: Expression },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub annotation: Option<Expression>,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExceptHandler {
    #[serde(skip)]
    pub span: LineSpan,
    pub exception: Option<Expression>,
    pub name: Option<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    #[serde(skip)]
    pub span: LineSpan,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(kind: StatementKind, span: LineSpan) -> Self {
        Self { span, kind }
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum StatementKind {
    Expr(Expression),
    /// `a = b = value`; targets in source order.
    Assign {
        targets: Vec<Target>,
        value: Expression,
    },
    AugAssign {
        target: Target,
        op: BinaryOperator,
        value: Expression,
    },
    AnnAssign {
        target: Target,
        annotation: Expression,
        value: Option<Expression>,
    },
    FunctionDef {
        name: String,
        params: Vec<Parameter>,
        returns: Option<Expression>,
        body: Vec<Statement>,
    },
    ClassDef {
        name: String,
        bases: Vec<Expression>,
        body: Vec<Statement>,
    },
    Return(Option<Expression>),
    Pass,
    Break,
    Continue,
    /// `elif` chains are nested `If` statements in `else_body`.
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        target: Target,
        iterable: Expression,
        body: Vec<Statement>,
    },
    Try {
        body: Vec<Statement>,
        handlers: Vec<ExceptHandler>,
        else_body: Vec<Statement>,
        finally_body: Vec<Statement>,
    },
    Raise(Option<Expression>),
    Assert {
        test: Expression,
        message: Option<Expression>,
    },
    Import {
        module: String,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub statements: Vec<Statement>,
}
