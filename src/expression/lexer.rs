use super::parser::{CompareOp, PredicateOp};
use super::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    True,
    False,
    Null,
    Undefined,
    Compare(CompareOp),
    Predicate(PredicateOp),
    And,
    Or,
    LParen,
    RParen,
}

impl TokenKind {
    /// 能作为比较左右值的 token
    fn is_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Str(_)
                | TokenKind::Number(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Undefined
                | TokenKind::RParen
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 在原表达式中的字节偏移
    pub position: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    cursor: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            cursor: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.cursor).map(|&(_, c)| c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.cursor + offset).map(|&(_, c)| c)
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.cursor)
            .map(|&(pos, _)| pos)
            .unwrap_or(self.source.len())
    }

    fn error(&self, position: usize, message: impl Into<String>) -> ExpressionError {
        ExpressionError::new(self.source, position, message)
    }

    fn push(&mut self, kind: TokenKind, position: usize) {
        self.tokens.push(Token { kind, position });
    }

    fn previous_is_operand(&self) -> bool {
        self.tokens
            .last()
            .map(|t| t.kind.is_operand())
            .unwrap_or(false)
    }

    fn run(mut self) -> Result<Vec<Token>, ExpressionError> {
        while let Some(c) = self.peek() {
            let start = self.position();
            match c {
                c if c.is_whitespace() => self.cursor += 1,
                '(' => {
                    self.cursor += 1;
                    self.push(TokenKind::LParen, start);
                }
                ')' => {
                    self.cursor += 1;
                    self.push(TokenKind::RParen, start);
                }
                '"' | '\'' => self.string(c, start)?,
                c if c.is_ascii_digit() => self.number(start)?,
                '-' if !self.previous_is_operand()
                    && self.peek_at(1).map(|n| n.is_ascii_digit()).unwrap_or(false) =>
                {
                    self.number(start)?
                }
                c if c.is_alphabetic() || c == '_' || c == '$' => self.identifier(start)?,
                _ => self.operator(start)?,
            }
        }
        Ok(self.tokens)
    }

    fn string(&mut self, quote: char, start: usize) -> Result<(), ExpressionError> {
        self.cursor += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated string literal")),
                Some(c) if c == quote => {
                    self.cursor += 1;
                    break;
                }
                Some('\\') => {
                    let escaped = self
                        .peek_at(1)
                        .ok_or_else(|| self.error(start, "unterminated string literal"))?;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.cursor += 2;
                }
                Some(c) => {
                    value.push(c);
                    self.cursor += 1;
                }
            }
        }
        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<(), ExpressionError> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.cursor += 1;
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
                self.cursor += 1;
            } else {
                break;
            }
        }
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error(start, format!("invalid number `{}`", text)))?;
        self.push(TokenKind::Number(value), start);
        Ok(())
    }

    fn identifier(&mut self, start: usize) -> Result<(), ExpressionError> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' || c == '.' {
                text.push(c);
                self.cursor += 1;
            } else {
                break;
            }
        }
        if text.ends_with('.') || text.contains("..") {
            return Err(self.error(start, format!("malformed path `{}`", text)));
        }

        let kind = match text.as_str() {
            "AND" | "and" => TokenKind::And,
            "OR" | "or" => TokenKind::Or,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            "includes" => TokenKind::Predicate(PredicateOp::Includes),
            "startsWith" => TokenKind::Predicate(PredicateOp::StartsWith),
            "endsWith" => TokenKind::Predicate(PredicateOp::EndsWith),
            _ => TokenKind::Ident(text),
        };
        self.push(kind, start);
        Ok(())
    }

    fn operator(&mut self, start: usize) -> Result<(), ExpressionError> {
        const SYMBOLS: [&str; 10] = ["===", "!==", "==", "!=", ">=", "<=", ">", "<", "&&", "||"];

        let rest = &self.source[start..];
        let symbol = SYMBOLS.iter().find(|symbol| rest.starts_with(**symbol));
        let Some(symbol) = symbol else {
            let found = self.peek().unwrap_or(' ');
            return Err(self.error(start, format!("unexpected character `{}`", found)));
        };

        let kind = match *symbol {
            "===" | "==" => TokenKind::Compare(CompareOp::Eq),
            "!==" | "!=" => TokenKind::Compare(CompareOp::Ne),
            ">=" => TokenKind::Compare(CompareOp::Ge),
            "<=" => TokenKind::Compare(CompareOp::Le),
            ">" => TokenKind::Compare(CompareOp::Gt),
            "<" => TokenKind::Compare(CompareOp::Lt),
            "&&" => TokenKind::And,
            _ => TokenKind::Or,
        };
        self.cursor += symbol.chars().count();
        self.push(kind, start);
        Ok(())
    }
}
