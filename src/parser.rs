use std::mem::discriminant;

use crate::ast::{
    BinaryOperator, BoolOperator, CompareOperator, ExceptHandler, Expression, LineSpan, Module,
    Parameter, Statement, StatementKind, Target, UnaryOperator,
};
use crate::lexer::{self, unescape};
use crate::token::{Token, TokenKind};

mod error;

pub use error::{ParseError, SyntaxError};

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
    /// Line of the last consumed token that belongs to a statement, used as
    /// the end of the statement span being built.
    last_line: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            position: 0,
            last_line: 1,
        }
    }

    pub fn parse_module(mut self) -> Result<Module, ParseError> {
        let mut statements = Vec::new();
        while !self.at(&TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            statements.extend(self.parse_statement()?);
        }
        Ok(Module { statements })
    }

    fn parse_statement(&mut self) -> Result<Vec<Statement>, ParseError> {
        let statement = match self.current().kind {
            TokenKind::Def => self.parse_function_def()?,
            TokenKind::Class => self.parse_class_def()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Try => self.parse_try()?,
            _ => return self.parse_simple_line(),
        };
        Ok(vec![statement])
    }

    /// One or more `;`-separated simple statements terminated by a newline.
    fn parse_simple_line(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = vec![self.parse_simple_statement()?];
        while self.at(&TokenKind::Semicolon) {
            self.advance();
            if self.at(&TokenKind::Newline) {
                break;
            }
            statements.push(self.parse_simple_statement()?);
        }
        self.expect(TokenKind::Newline, "newline")?;
        Ok(statements)
    }

    fn parse_simple_statement(&mut self) -> Result<Statement, ParseError> {
        let start = self.current().span.line;
        let kind = match self.current().kind {
            TokenKind::Pass => {
                self.advance();
                StatementKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                StatementKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StatementKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                if self.at_statement_end() {
                    StatementKind::Return(None)
                } else {
                    StatementKind::Return(Some(self.parse_expression_list()?))
                }
            }
            TokenKind::Raise => {
                self.advance();
                if self.at_statement_end() {
                    StatementKind::Raise(None)
                } else {
                    StatementKind::Raise(Some(self.parse_expression()?))
                }
            }
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_expression()?;
                let message = if self.at(&TokenKind::Comma) {
                    self.advance();
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                StatementKind::Assert { test, message }
            }
            TokenKind::Import => {
                self.advance();
                let module = self.expect_identifier()?;
                let alias = if self.at(&TokenKind::As) {
                    self.advance();
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                StatementKind::Import { module, alias }
            }
            _ => self.parse_expression_statement()?,
        };
        Ok(Statement::new(kind, LineSpan::new(start, self.last_line)))
    }

    fn parse_expression_statement(&mut self) -> Result<StatementKind, ParseError> {
        let first_token = self.current().clone();
        let first = self.parse_expression_list()?;

        match self.current().kind {
            TokenKind::Equal => {
                let mut targets = vec![self.to_target(first, &first_token)?];
                loop {
                    self.advance();
                    let next_token = self.current().clone();
                    let next = self.parse_expression_list()?;
                    if self.at(&TokenKind::Equal) {
                        targets.push(self.to_target(next, &next_token)?);
                    } else {
                        return Ok(StatementKind::Assign {
                            targets,
                            value: next,
                        });
                    }
                }
            }
            TokenKind::Colon => {
                let target = self.to_single_target(first, &first_token)?;
                self.advance();
                let annotation = self.parse_expression()?;
                let value = if self.at(&TokenKind::Equal) {
                    self.advance();
                    Some(self.parse_expression_list()?)
                } else {
                    None
                };
                Ok(StatementKind::AnnAssign {
                    target,
                    annotation,
                    value,
                })
            }
            kind => {
                if let Some(op) = augmented_operator(&kind) {
                    let target = self.to_single_target(first, &first_token)?;
                    self.advance();
                    let value = self.parse_expression_list()?;
                    Ok(StatementKind::AugAssign { target, op, value })
                } else {
                    Ok(StatementKind::Expr(first))
                }
            }
        }
    }

    fn parse_function_def(&mut self) -> Result<Statement, ParseError> {
        let start = self.current().span.line;
        self.expect(TokenKind::Def, "def")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LParen, "(")?;

        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let param_name = self.expect_identifier()?;
            let annotation = if self.at(&TokenKind::Colon) {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };
            let default = if self.at(&TokenKind::Equal) {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(Parameter {
                name: param_name,
                annotation,
                default,
            });
            if !self.at(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::RParen, ")")?;

        let returns = if self.at(&TokenKind::Arrow) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_block()?;

        Ok(Statement::new(
            StatementKind::FunctionDef {
                name,
                params,
                returns,
                body,
            },
            LineSpan::new(start, self.last_line),
        ))
    }

    fn parse_class_def(&mut self) -> Result<Statement, ParseError> {
        let start = self.current().span.line;
        self.expect(TokenKind::Class, "class")?;
        let name = self.expect_identifier()?;
        let mut bases = Vec::new();
        if self.at(&TokenKind::LParen) {
            self.advance();
            bases = self.parse_comma_separated(&TokenKind::RParen)?;
            self.expect(TokenKind::RParen, ")")?;
        }
        let body = self.parse_block()?;
        Ok(Statement::new(
            StatementKind::ClassDef { name, bases, body },
            LineSpan::new(start, self.last_line),
        ))
    }

    /// Parses `if` and `elif` alike; an `elif` becomes a nested `If`.
    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let start = self.current().span.line;
        self.advance(); // `if` or `elif`
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;

        let else_body = match self.current().kind {
            TokenKind::Elif => vec![self.parse_if()?],
            TokenKind::Else => {
                self.advance();
                self.parse_block()?
            }
            _ => Vec::new(),
        };

        Ok(Statement::new(
            StatementKind::If {
                condition,
                then_body,
                else_body,
            },
            LineSpan::new(start, self.last_line),
        ))
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        let start = self.current().span.line;
        self.expect(TokenKind::While, "while")?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Statement::new(
            StatementKind::While { condition, body },
            LineSpan::new(start, self.last_line),
        ))
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        let start = self.current().span.line;
        self.expect(TokenKind::For, "for")?;
        let target_token = self.current().clone();
        let mut items = vec![self.parse_arithmetic()?];
        while self.at(&TokenKind::Comma) {
            self.advance();
            if self.at(&TokenKind::In) {
                break;
            }
            items.push(self.parse_arithmetic()?);
        }
        let target_expression = if items.len() == 1 {
            items.pop().unwrap_or(Expression::None)
        } else {
            Expression::Tuple(items)
        };
        let target = self.to_target(target_expression, &target_token)?;
        self.expect(TokenKind::In, "in")?;
        let iterable = self.parse_expression_list()?;
        let body = self.parse_block()?;
        Ok(Statement::new(
            StatementKind::For {
                target,
                iterable,
                body,
            },
            LineSpan::new(start, self.last_line),
        ))
    }

    fn parse_try(&mut self) -> Result<Statement, ParseError> {
        let start = self.current().span.line;
        self.expect(TokenKind::Try, "try")?;
        let body = self.parse_block()?;

        let mut handlers = Vec::new();
        while self.at(&TokenKind::Except) {
            let handler_start = self.current().span.line;
            self.advance();
            let mut exception = None;
            let mut name = None;
            if !self.at(&TokenKind::Colon) {
                exception = Some(self.parse_expression()?);
                if self.at(&TokenKind::As) {
                    self.advance();
                    name = Some(self.expect_identifier()?);
                }
            }
            let handler_body = self.parse_block()?;
            handlers.push(ExceptHandler {
                span: LineSpan::new(handler_start, self.last_line),
                exception,
                name,
                body: handler_body,
            });
        }

        let mut else_body = Vec::new();
        if !handlers.is_empty() && self.at(&TokenKind::Else) {
            self.advance();
            else_body = self.parse_block()?;
        }

        let mut finally_body = Vec::new();
        if self.at(&TokenKind::Finally) {
            self.advance();
            finally_body = self.parse_block()?;
        } else if handlers.is_empty() {
            return Err(self.error("except or finally"));
        }

        Ok(Statement::new(
            StatementKind::Try {
                body,
                handlers,
                else_body,
                finally_body,
            },
            LineSpan::new(start, self.last_line),
        ))
    }

    /// `: NEWLINE INDENT statements DEDENT` or `: simple; statements NEWLINE`.
    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(TokenKind::Colon, ":")?;
        if !self.at(&TokenKind::Newline) {
            return self.parse_simple_line();
        }
        self.expect(TokenKind::Newline, "newline")?;
        self.expect(TokenKind::Indent, "indented block")?;

        let mut body = Vec::new();
        while !matches!(self.current().kind, TokenKind::Dedent | TokenKind::EOF) {
            if self.consume_newlines() {
                continue;
            }
            body.extend(self.parse_statement()?);
        }
        self.expect(TokenKind::Dedent, "dedent")?;
        Ok(body)
    }

    /// `expr` or `expr, expr[,]` (a tuple).
    fn parse_expression_list(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_expression()?;
        if !self.at(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.at(&TokenKind::Comma) {
            self.advance();
            if !starts_expression(&self.current().kind) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        Ok(Expression::Tuple(items))
    }

    fn parse_comma_separated(&mut self, closing: &TokenKind) -> Result<Vec<Expression>, ParseError> {
        let mut items = Vec::new();
        while !self.at(closing) {
            items.push(self.parse_expression()?);
            if !self.at(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_and()?;
        if !self.at(&TokenKind::Or) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at(&TokenKind::Or) {
            self.advance();
            values.push(self.parse_and()?);
        }
        Ok(Expression::BoolOp {
            op: BoolOperator::Or,
            values,
        })
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_not()?;
        if !self.at(&TokenKind::And) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at(&TokenKind::And) {
            self.advance();
            values.push(self.parse_not()?);
        }
        Ok(Expression::BoolOp {
            op: BoolOperator::And,
            values,
        })
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.at(&TokenKind::Not) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expression::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_arithmetic()?;
        let mut comparisons = Vec::new();
        while let Some(op) = self.comparison_operator() {
            comparisons.push((op, self.parse_arithmetic()?));
        }
        if comparisons.is_empty() {
            return Ok(left);
        }
        Ok(Expression::Compare {
            left: Box::new(left),
            comparisons,
        })
    }

    /// Consumes a comparison operator if one starts at the current token.
    fn comparison_operator(&mut self) -> Option<CompareOperator> {
        let op = match self.current().kind {
            TokenKind::EqualEqual => CompareOperator::Equal,
            TokenKind::NotEqual => CompareOperator::NotEqual,
            TokenKind::Less => CompareOperator::Less,
            TokenKind::LessEqual => CompareOperator::LessEqual,
            TokenKind::Greater => CompareOperator::Greater,
            TokenKind::GreaterEqual => CompareOperator::GreaterEqual,
            TokenKind::In => CompareOperator::In,
            TokenKind::Not if matches!(self.peek_kind(1), TokenKind::In) => {
                self.advance();
                CompareOperator::NotIn
            }
            TokenKind::Is if matches!(self.peek_kind(1), TokenKind::Not) => {
                self.advance();
                CompareOperator::IsNot
            }
            TokenKind::Is => CompareOperator::Is,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// Arithmetic level, the operand of comparisons and of `for` targets.
    fn parse_arithmetic(&mut self) -> Result<Expression, ParseError> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::DoubleSlash => BinaryOperator::FloorDiv,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expression, ParseError> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Plus => UnaryOperator::Plus,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_factor()?;
        Ok(Expression::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expression, ParseError> {
        let base = self.parse_postfix()?;
        if !self.at(&TokenKind::DoubleStar) {
            return Ok(base);
        }
        self.advance();
        let exponent = self.parse_factor()?;
        Ok(Expression::BinaryOp {
            left: Box::new(base),
            op: BinaryOperator::Pow,
            right: Box::new(exponent),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current().kind {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_comma_separated(&TokenKind::RParen)?;
                    self.expect(TokenKind::RParen, ")")?;
                    expr = Expression::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression_list()?;
                    self.expect(TokenKind::RBracket, "]")?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = Expression::Attribute {
                        object: Box::new(expr),
                        name,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let expr = match self.current().kind {
            TokenKind::Integer(value) => Expression::Integer(value),
            TokenKind::Float(value) => Expression::Float(value),
            TokenKind::True => Expression::Boolean(true),
            TokenKind::False => Expression::Boolean(false),
            TokenKind::None => Expression::None,
            TokenKind::Identifier(name) => Expression::Identifier(name.to_string()),
            TokenKind::String(_) => {
                let mut value = String::new();
                // Adjacent literals concatenate.
                while let TokenKind::String(raw) = self.current().kind {
                    value.push_str(&unescape(raw));
                    self.advance();
                }
                return Ok(Expression::String(value));
            }
            TokenKind::LParen => {
                self.advance();
                if self.at(&TokenKind::RParen) {
                    self.advance();
                    return Ok(Expression::Tuple(Vec::new()));
                }
                let inner = self.parse_expression_list()?;
                self.expect(TokenKind::RParen, ")")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_comma_separated(&TokenKind::RBracket)?;
                self.expect(TokenKind::RBracket, "]")?;
                return Ok(Expression::List(items));
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.at(&TokenKind::RBrace) {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::Colon, ":")?;
                    let value = self.parse_expression()?;
                    entries.push((key, value));
                    if !self.at(&TokenKind::Comma) {
                        break;
                    }
                    self.advance();
                }
                self.expect(TokenKind::RBrace, "}")?;
                return Ok(Expression::Dict(entries));
            }
            _ => return Err(self.error("expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn to_target(&self, expr: Expression, at: &Token<'_>) -> Result<Target, ParseError> {
        match expr {
            Expression::Identifier(name) => Ok(Target::Name(name)),
            Expression::Tuple(items) => Ok(Target::Tuple(
                items
                    .into_iter()
                    .map(|item| self.to_target(item, at))
                    .collect::<Result<_, _>>()?,
            )),
            Expression::List(items) => Ok(Target::List(
                items
                    .into_iter()
                    .map(|item| self.to_target(item, at))
                    .collect::<Result<_, _>>()?,
            )),
            Expression::Attribute { object, name } => Ok(Target::Attribute {
                object: *object,
                name,
            }),
            Expression::Index { object, index } => Ok(Target::Index {
                object: *object,
                index: *index,
            }),
            _ => Err(ParseError {
                expected: "assignment target".to_string(),
                found: "expression".to_string(),
                line: at.span.line,
                column: at.span.column,
            }),
        }
    }

    /// Targets of augmented and annotated assignment cannot destructure.
    fn to_single_target(&self, expr: Expression, at: &Token<'_>) -> Result<Target, ParseError> {
        match self.to_target(expr, at)? {
            Target::Tuple(_) | Target::List(_) => Err(ParseError {
                expected: "single assignment target".to_string(),
                found: "tuple".to_string(),
                line: at.span.line,
                column: at.span.column,
            }),
            target => Ok(target),
        }
    }

    fn consume_newlines(&mut self) -> bool {
        let mut consumed = false;
        while self.at(&TokenKind::Newline) {
            consumed = true;
            self.advance();
        }
        consumed
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::EOF
        )
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Identifier(name) = self.current().kind {
            self.advance();
            Ok(name.to_string())
        } else {
            Err(self.error("identifier"))
        }
    }

    fn expect(&mut self, kind: TokenKind<'_>, expected: &str) -> Result<(), ParseError> {
        if self.at(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn at(&self, kind: &TokenKind<'_>) -> bool {
        discriminant(&self.current().kind) == discriminant(kind)
    }

    fn current(&self) -> &Token<'a> {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind<'a> {
        self.tokens
            .get(self.position + offset)
            .map(|token| token.kind)
            .unwrap_or(TokenKind::EOF)
    }

    fn advance(&mut self) {
        let token = self.current();
        if !matches!(
            token.kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::EOF
        ) {
            self.last_line = token.span.line;
        }
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError {
            expected: expected.to_string(),
            found: token.kind.describe(),
            line: token.span.line,
            column: token.span.column,
        }
    }
}

fn augmented_operator(kind: &TokenKind<'_>) -> Option<BinaryOperator> {
    match kind {
        TokenKind::PlusEqual => Some(BinaryOperator::Add),
        TokenKind::MinusEqual => Some(BinaryOperator::Sub),
        TokenKind::StarEqual => Some(BinaryOperator::Mul),
        TokenKind::SlashEqual => Some(BinaryOperator::Div),
        TokenKind::DoubleSlashEqual => Some(BinaryOperator::FloorDiv),
        TokenKind::PercentEqual => Some(BinaryOperator::Mod),
        _ => None,
    }
}

fn starts_expression(kind: &TokenKind<'_>) -> bool {
    matches!(
        kind,
        TokenKind::Identifier(_)
            | TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::String(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::None
            | TokenKind::Not
            | TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
    )
}

pub fn parse_tokens(tokens: Vec<Token<'_>>) -> Result<Module, ParseError> {
    Parser::new(tokens).parse_module()
}

/// Lexes and parses a whole source file.
pub fn parse(source: &str) -> Result<Module, SyntaxError> {
    let tokens = lexer::tokenize(source)?;
    Ok(parse_tokens(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Structural;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn statements(source: &str) -> Vec<Statement> {
        parse(source).expect("parse failed").statements
    }

    fn spans(source: &str) -> Vec<(usize, usize)> {
        statements(source)
            .iter()
            .map(|statement| (statement.span.start, statement.span.end))
            .collect()
    }

    #[test]
    fn parses_simple_program() {
        let input = indoc! {"
            def fn():
                n = 4 + 4
                print(n)
            fn()
        "};
        let parsed = statements(input);

        let expected = vec![
            Statement::new(
                StatementKind::FunctionDef {
                    name: "fn".to_string(),
                    params: vec![],
                    returns: None,
                    body: vec![
                        Statement::new(
                            StatementKind::Assign {
                                targets: vec![Target::Name("n".to_string())],
                                value: Expression::BinaryOp {
                                    left: Box::new(Expression::Integer(4)),
                                    op: BinaryOperator::Add,
                                    right: Box::new(Expression::Integer(4)),
                                },
                            },
                            LineSpan::default(),
                        ),
                        Statement::new(
                            StatementKind::Expr(Expression::Call {
                                callee: Box::new(Expression::Identifier("print".to_string())),
                                args: vec![Expression::Identifier("n".to_string())],
                            }),
                            LineSpan::default(),
                        ),
                    ],
                },
                LineSpan::default(),
            ),
            Statement::new(
                StatementKind::Expr(Expression::Call {
                    callee: Box::new(Expression::Identifier("fn".to_string())),
                    args: vec![],
                }),
                LineSpan::default(),
            ),
        ];

        assert!(parsed.structurally_eq(&expected), "{parsed:#?}");
        assert_eq!(spans(input), vec![(1, 3), (4, 4)]);
    }

    #[test]
    fn records_spans_of_compound_and_bracketed_statements() {
        let input = indoc! {"
            a = [
                1,
                2,
            ]

            if a:
                b = 1
            elif len(a) > 3:
                b = 2
            else:
                b = 3
            c = 1; d = 2
        "};
        assert_eq!(spans(input), vec![(1, 4), (6, 11), (12, 12), (12, 12)]);
    }

    #[test]
    fn parses_every_assignment_form() {
        let parsed = statements(indoc! {"
            a = b = 1
            (x, [y, z]) = (2, [3, 4])
            a += 2
            total: int = 0
            obj.attr = 5
            items[0] = 6
        "});
        let kinds: Vec<&StatementKind> = parsed.iter().map(|statement| &statement.kind).collect();

        let StatementKind::Assign { targets, .. } = kinds[0] else {
            panic!("expected chained assign, got {:?}", kinds[0]);
        };
        assert_eq!(
            targets,
            &vec![Target::Name("a".to_string()), Target::Name("b".to_string())]
        );

        let StatementKind::Assign { targets, .. } = kinds[1] else {
            panic!("expected destructuring assign");
        };
        assert_eq!(
            targets,
            &vec![Target::Tuple(vec![
                Target::Name("x".to_string()),
                Target::List(vec![
                    Target::Name("y".to_string()),
                    Target::Name("z".to_string()),
                ]),
            ])]
        );

        assert!(matches!(
            kinds[2],
            StatementKind::AugAssign {
                op: BinaryOperator::Add,
                ..
            }
        ));
        assert!(matches!(
            kinds[3],
            StatementKind::AnnAssign { value: Some(_), .. }
        ));
        assert!(matches!(
            kinds[4],
            StatementKind::Assign { targets, .. } if matches!(targets[0], Target::Attribute { .. })
        ));
        assert!(matches!(
            kinds[5],
            StatementKind::Assign { targets, .. } if matches!(targets[0], Target::Index { .. })
        ));
    }

    #[test]
    fn respects_operator_precedence() {
        let parsed = statements("x = -2 ** 2 + 3 * 4 < 20 and not done\n");
        let StatementKind::Assign { value, .. } = &parsed[0].kind else {
            panic!("expected assignment");
        };
        let Expression::BoolOp { op, values } = value else {
            panic!("expected boolean operation, got {value:?}");
        };
        assert_eq!(*op, BoolOperator::And);
        assert!(matches!(values[0], Expression::Compare { .. }));
        assert_eq!(
            values[1],
            Expression::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(Expression::Identifier("done".to_string())),
            }
        );
    }

    #[test]
    fn parses_try_and_class_definitions() {
        let parsed = statements(indoc! {"
            class Counter(Base):
                start = 0
                def bump(self, by=1):
                    return self.start + by

            try:
                risky()
            except ValueError as err:
                print(err)
            finally:
                done = True
        "});
        assert_eq!(parsed.len(), 2);
        let StatementKind::ClassDef { name, bases, body } = &parsed[0].kind else {
            panic!("expected class");
        };
        assert_eq!(name, "Counter");
        assert_eq!(bases, &vec![Expression::Identifier("Base".to_string())]);
        assert_eq!(body.len(), 2);

        let StatementKind::Try {
            handlers,
            finally_body,
            ..
        } = &parsed[1].kind
        else {
            panic!("expected try");
        };
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].name.as_deref(), Some("err"));
        assert_eq!(finally_body.len(), 1);
        assert_eq!((parsed[1].span.start, parsed[1].span.end), (6, 11));
    }

    #[test]
    fn reports_location_of_syntax_errors() {
        let error = parse("a = 'hello'\nb = # missing\n").expect_err("expected syntax error");
        assert_eq!(error.line(), 2);
        assert!(error.to_string().contains("Expected expression"));

        let error = parse("1 = a\n").expect_err("expected invalid target");
        assert!(error.to_string().contains("assignment target"));
    }
}
