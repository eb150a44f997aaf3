use std::{iter::Peekable, str::CharIndices};

use crate::token::{Span, Token, TokenKind};

mod error;

pub use error::{LexError, LexResult};

/// Operator and delimiter spellings, longest first so that prefixes lose.
const OPERATORS: [(&str, TokenKind<'static>); 31] = [
    ("//=", TokenKind::DoubleSlashEqual),
    ("**", TokenKind::DoubleStar),
    ("//", TokenKind::DoubleSlash),
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::NotEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("+=", TokenKind::PlusEqual),
    ("-=", TokenKind::MinusEqual),
    ("*=", TokenKind::StarEqual),
    ("/=", TokenKind::SlashEqual),
    ("%=", TokenKind::PercentEqual),
    ("->", TokenKind::Arrow),
    ("=", TokenKind::Equal),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (".", TokenKind::Dot),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
];

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    indent_stack: Vec<usize>,
    pending_tokens: Vec<Token<'a>>,
    open_brackets: Vec<(char, usize, usize)>,
    at_line_start: bool,
    eof_reached: bool,
    /// A logical line has produced tokens but no Newline yet.
    line_open: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            indent_stack: vec![0],
            pending_tokens: Vec::new(),
            open_brackets: Vec::new(),
            at_line_start: true,
            eof_reached: false,
            line_open: false,
            line: 1,
            column: 1,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        if let Some(token) = self.pending_tokens.pop() {
            return Ok(token);
        }

        if self.eof_reached {
            return Ok(self.marker(TokenKind::EOF));
        }

        if self.at_line_start && self.open_brackets.is_empty() {
            self.at_line_start = false;
            if let Some(indent_level) = self.count_indentation()? {
                let current_indent = self.indent_stack.last().copied().unwrap_or(0);
                if indent_level > current_indent {
                    self.indent_stack.push(indent_level);
                    return Ok(self.marker(TokenKind::Indent));
                } else if indent_level < current_indent {
                    while let Some(&top) = self.indent_stack.last() {
                        if top > indent_level {
                            self.indent_stack.pop();
                            let dedent = self.marker(TokenKind::Dedent);
                            self.pending_tokens.push(dedent);
                        } else {
                            break;
                        }
                    }
                    if self.indent_stack.last().copied().unwrap_or(0) != indent_level {
                        return Err(LexError::InvalidDedent {
                            indent_level,
                            line: self.line,
                        });
                    }
                    if let Some(token) = self.pending_tokens.pop() {
                        return Ok(token);
                    }
                }
            }
        }

        self.skip_trivia();

        let Some(&(start_idx, ch)) = self.chars.peek() else {
            return self.finish();
        };

        let start_line = self.line;
        let start_column = self.column;
        let token = match ch {
            '\n' => {
                self.advance_char();
                self.at_line_start = true;
                self.line_open = false;
                return Ok(Token::new(
                    TokenKind::Newline,
                    Span {
                        start: start_idx,
                        end: start_idx + 1,
                        line: start_line,
                        column: start_column,
                    },
                ));
            }
            '"' | '\'' => self.read_string(ch, start_idx, start_line, start_column)?,
            c if c.is_alphabetic() || c == '_' => {
                self.read_identifier(start_idx, start_line, start_column)
            }
            c if c.is_ascii_digit() => self.read_number(start_idx, start_line, start_column)?,
            _ => self.read_operator(ch, start_idx, start_line, start_column)?,
        };
        self.line_open = true;
        Ok(token)
    }

    /// Emits the closing Newline, pending dedents, then EOF.
    fn finish(&mut self) -> LexResult<Token<'a>> {
        if let Some(&(character, line, column)) = self.open_brackets.last() {
            return Err(LexError::UnmatchedBracket {
                character,
                line,
                column,
            });
        }
        if self.line_open {
            self.line_open = false;
            return Ok(self.marker(TokenKind::Newline));
        }
        self.eof_reached = true;
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            let dedent = self.marker(TokenKind::Dedent);
            self.pending_tokens.push(dedent);
        }
        if let Some(token) = self.pending_tokens.pop() {
            return Ok(token);
        }
        Ok(self.marker(TokenKind::EOF))
    }

    /// Measures the indentation of the next non-blank line, consuming blank and
    /// comment-only lines entirely. Returns `None` at end of input.
    fn count_indentation(&mut self) -> LexResult<Option<usize>> {
        loop {
            let mut count = 0;
            while let Some(&(_, c)) = self.chars.peek() {
                match c {
                    ' ' => {
                        self.advance_char();
                        count += 1;
                    }
                    '\t' => return Err(LexError::TabIndentation { line: self.line }),
                    _ => break,
                }
            }
            match self.chars.peek() {
                None => return Ok(None),
                Some(&(_, '\n')) | Some(&(_, '\r')) => {
                    self.advance_char();
                }
                Some(&(_, '#')) => self.skip_comment(),
                Some(_) => return Ok(Some(count)),
            }
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance_char();
                }
                '#' => self.skip_comment(),
                '\n' if !self.open_brackets.is_empty() => {
                    self.advance_char();
                }
                '\\' => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if matches!(lookahead.peek(), Some(&(_, '\n'))) {
                        self.advance_char();
                        self.advance_char();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.advance_char();
        }
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        let kind = match ident {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "def" => TokenKind::Def,
            "class" => TokenKind::Class,
            "return" => TokenKind::Return,
            "pass" => TokenKind::Pass,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "raise" => TokenKind::Raise,
            "try" => TokenKind::Try,
            "except" => TokenKind::Except,
            "finally" => TokenKind::Finally,
            "assert" => TokenKind::Assert,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "is" => TokenKind::Is,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => TokenKind::Identifier(ident),
        };
        Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_number(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        self.consume_digits();
        let mut is_float = false;

        if matches!(self.chars.peek(), Some(&(_, '.'))) && self.nth_is_digit(1) {
            is_float = true;
            self.advance_char(); // Consume '.'
            self.consume_digits();
        }

        if matches!(self.chars.peek(), Some(&(_, 'e' | 'E'))) {
            let signed = matches!(self.nth_char(1), Some('+' | '-'));
            let digit_offset = if signed { 2 } else { 1 };
            if self.nth_is_digit(digit_offset) {
                is_float = true;
                for _ in 0..digit_offset {
                    self.advance_char();
                }
                self.consume_digits();
            }
        }

        let end_idx = self.current_index();
        let literal = &self.input[start..end_idx];
        let invalid = || LexError::InvalidNumberLiteral {
            literal: literal.to_string(),
            line,
            column,
        };
        let kind = if is_float {
            TokenKind::Float(literal.parse::<f64>().map_err(|_| invalid())?)
        } else {
            TokenKind::Integer(literal.parse::<i64>().map_err(|_| invalid())?)
        };
        Ok(Token::new(
            kind,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        ))
    }

    fn read_string(
        &mut self,
        quote: char,
        start: usize,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        self.advance_char(); // Consume opening quote
        let content_start = start + quote.len_utf8();
        while let Some(&(idx, c)) = self.chars.peek() {
            if c == quote {
                self.advance_char(); // Consume closing quote
                return Ok(Token::new(
                    TokenKind::String(&self.input[content_start..idx]),
                    Span {
                        start,
                        end: idx + 1,
                        line,
                        column,
                    },
                ));
            }
            if c == '\n' {
                break;
            }
            if c == '\\' {
                self.advance_char();
                if matches!(self.chars.peek(), None | Some(&(_, '\n'))) {
                    break;
                }
            }
            self.advance_char();
        }
        Err(LexError::UnterminatedString { line, column })
    }

    fn read_operator(
        &mut self,
        ch: char,
        start: usize,
        line: usize,
        column: usize,
    ) -> LexResult<Token<'a>> {
        let rest = &self.input[start..];
        let Some((spelling, kind)) = OPERATORS
            .iter()
            .find(|(spelling, _)| rest.starts_with(spelling))
        else {
            return Err(LexError::UnexpectedCharacter {
                character: ch,
                line,
                column,
            });
        };

        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                self.open_brackets.push((ch, line, column));
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                let expected_open = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match self.open_brackets.pop() {
                    Some((open, _, _)) if open == expected_open => {}
                    _ => {
                        return Err(LexError::UnmatchedBracket {
                            character: ch,
                            line,
                            column,
                        });
                    }
                }
            }
            _ => {}
        }

        for _ in 0..spelling.len() {
            self.advance_char();
        }
        Ok(Token::new(
            *kind,
            Span {
                start,
                end: start + spelling.len(),
                line,
                column,
            },
        ))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_token())
    }
}

impl<'a> Lexer<'a> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn consume_digits(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn nth_char(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n).map(|(_, c)| c)
    }

    fn nth_is_digit(&self, n: usize) -> bool {
        self.nth_char(n).is_some_and(|c| c.is_ascii_digit())
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }

    fn marker(&mut self, kind: TokenKind<'a>) -> Token<'a> {
        let index = self.current_index();
        Token::new(
            kind,
            Span {
                start: index,
                end: index,
                line: self.line,
                column: self.column,
            },
        )
    }
}

pub fn tokenize<'a>(input: &'a str) -> LexResult<Vec<Token<'a>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

/// Resolves backslash escapes in a raw string literal body.
pub fn unescape(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some('0') => output.push('\0'),
            Some('\\') => output.push('\\'),
            Some('\'') => output.push('\''),
            Some('"') => output.push('"'),
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_simple_program() {
        let input = indoc! {"
            def fn():
                n = 4 + 4
                print(n)
            fn()
        "};
        let expected_tokens = vec![
            TokenKind::Def,
            TokenKind::Identifier("fn"),
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Identifier("n"),
            TokenKind::Equal,
            TokenKind::Integer(4),
            TokenKind::Plus,
            TokenKind::Integer(4),
            TokenKind::Newline,
            TokenKind::Identifier("print"),
            TokenKind::LParen,
            TokenKind::Identifier("n"),
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::Identifier("fn"),
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::Newline,
            TokenKind::EOF,
        ];
        assert_eq!(kinds(input), expected_tokens);
    }

    #[test]
    fn closes_last_line_and_blocks_without_trailing_newline() {
        let expected = vec![
            TokenKind::If,
            TokenKind::True,
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Indent,
            TokenKind::Identifier("a"),
            TokenKind::PlusEqual,
            TokenKind::Integer(2),
            TokenKind::Newline,
            TokenKind::Dedent,
            TokenKind::EOF,
        ];
        assert_eq!(kinds("if True:\n    a += 2"), expected);
    }

    #[test]
    fn skips_blank_and_comment_lines_without_indentation_changes() {
        let input = indoc! {"
            a = 1  # trailing

                # indented comment
            b = 'x'
        "};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Equal,
                TokenKind::Integer(1),
                TokenKind::Newline,
                TokenKind::Identifier("b"),
                TokenKind::Equal,
                TokenKind::String("x"),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn joins_lines_inside_brackets() {
        let tokens = tokenize("values = [\n    1,\n    2,\n]\n").expect("tokenize");
        let newlines = tokens
            .iter()
            .filter(|token| matches!(token.kind, TokenKind::Newline))
            .count();
        assert_eq!(newlines, 1);
        let closing = tokens
            .iter()
            .find(|token| matches!(token.kind, TokenKind::RBracket))
            .expect("closing bracket");
        assert_eq!(closing.span.line, 4);
    }

    #[test]
    fn lexes_multi_character_operators_and_floats() {
        assert_eq!(
            kinds("x //= 2 ** 1.5e2 != y\n"),
            vec![
                TokenKind::Identifier("x"),
                TokenKind::DoubleSlashEqual,
                TokenKind::Integer(2),
                TokenKind::DoubleStar,
                TokenKind::Float(150.0),
                TokenKind::NotEqual,
                TokenKind::Identifier("y"),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn keeps_escapes_raw_until_unescaped() {
        let tokens = kinds(r#"s = 'it\'s'"#);
        assert_eq!(tokens[2], TokenKind::String(r"it\'s"));
        assert_eq!(unescape(r"it\'s\n"), "it's\n");
    }

    #[test]
    fn errors_on_invalid_character() {
        let err = tokenize("x = 1 @ 2\n").expect_err("expected lexing failure");
        assert!(err.to_string().contains("Unexpected character '@'"));
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("n = 99999999999999999999999999\n").expect_err("expected overflow");
        assert!(err.to_string().contains("Invalid number literal"));
    }

    #[test]
    fn errors_on_unterminated_string_and_bracket() {
        let err = tokenize("s = 'open\n").expect_err("expected unterminated string");
        assert_eq!(err, LexError::UnterminatedString { line: 1, column: 5 });

        let err = tokenize("f(1,\n").expect_err("expected unmatched bracket");
        assert!(matches!(err, LexError::UnmatchedBracket { character: '(', .. }));
    }

    #[test]
    fn errors_on_inconsistent_dedent() {
        let input = "if x:\n    a = 1\n  b = 2\n";
        let err = tokenize(input).expect_err("expected invalid dedent");
        assert_eq!(
            err,
            LexError::InvalidDedent {
                indent_level: 2,
                line: 3
            }
        );
    }
}
