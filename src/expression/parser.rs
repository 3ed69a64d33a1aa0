use std::fmt;

use super::lexer::{tokenize, Token, TokenKind};
use super::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Includes,
    StartsWith,
    EndsWith,
}

impl PredicateOp {
    fn method_name(&self) -> &'static str {
        match self {
            PredicateOp::Includes => "includes",
            PredicateOp::StartsWith => "startsWith",
            PredicateOp::EndsWith => "endsWith",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(f64),
    Bool(bool),
    Null,
    Undefined,
}

/// 表达式语法树
///
/// AND / OR 不区分优先级，按书写顺序从左到右结合：`a AND b OR c` 即 `(a AND b) OR c`。
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Path(String),
    Compare {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Predicate {
        op: PredicateOp,
        subject: Box<Expression>,
        argument: Box<Expression>,
    },
    Logic {
        op: LogicOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    /// 解析表达式；空白输入返回 `None`
    pub fn parse(source: &str) -> Result<Option<Expression>, ExpressionError> {
        if source.trim().is_empty() {
            return Ok(None);
        }
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            cursor: 0,
            depth: 0,
            clauses: 0,
        };
        let expression = parser.sequence()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error_at(token.position, "unexpected trailing token"));
        }
        Ok(Some(expression))
    }
}

/// 括号嵌套上限
pub const MAX_NESTING: usize = 64;
/// 单个表达式的比较子句上限，语法树深度因此有界
pub const MAX_CLAUSES: usize = 256;

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
    clauses: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> ExpressionError {
        ExpressionError::new(self.source, position, message)
    }

    fn end_error(&self, message: &str) -> ExpressionError {
        self.error_at(self.source.len(), message)
    }

    fn sequence(&mut self) -> Result<Expression, ExpressionError> {
        let mut left = self.clause()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::And) => LogicOp::And,
                Some(TokenKind::Or) => LogicOp::Or,
                _ => break,
            };
            self.cursor += 1;
            let right = self.clause()?;
            left = Expression::Logic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn clause(&mut self) -> Result<Expression, ExpressionError> {
        if let Some(Token {
            kind: TokenKind::LParen,
            position,
        }) = self.peek()
        {
            if self.depth >= MAX_NESTING {
                return Err(self.error_at(
                    *position,
                    format!("parentheses nested deeper than {}", MAX_NESTING),
                ));
            }
            self.cursor += 1;
            self.depth += 1;
            let inner = self.sequence()?;
            self.depth -= 1;
            self.expect_rparen()?;
            return Ok(inner);
        }

        self.clauses += 1;
        if self.clauses > MAX_CLAUSES {
            let position = self.peek().map(|t| t.position).unwrap_or(self.source.len());
            return Err(self.error_at(
                position,
                format!("expression has more than {} clauses", MAX_CLAUSES),
            ));
        }

        let subject = self.operand()?;

        if let Expression::Path(path) = &subject {
            if let Some(call) = self.method_call(path)? {
                return Ok(call);
            }
        }

        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Compare(op)) => {
                self.cursor += 1;
                let right = self.operand()?;
                Ok(Expression::Compare {
                    op,
                    left: Box::new(subject),
                    right: Box::new(right),
                })
            }
            Some(TokenKind::Predicate(op)) => {
                self.cursor += 1;
                let argument = self.operand()?;
                Ok(Expression::Predicate {
                    op,
                    subject: Box::new(subject),
                    argument: Box::new(argument),
                })
            }
            _ => Ok(subject),
        }
    }

    /// `path.includes("x")` 形式的方法调用
    fn method_call(&mut self, path: &str) -> Result<Option<Expression>, ExpressionError> {
        if !matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen)) {
            return Ok(None);
        }
        let op = [
            PredicateOp::Includes,
            PredicateOp::StartsWith,
            PredicateOp::EndsWith,
        ]
        .into_iter()
        .find(|op| path.ends_with(&format!(".{}", op.method_name())));

        let position = self.peek().map(|t| t.position).unwrap_or(0);
        let Some(op) = op else {
            return Err(self.error_at(position, format!("`{}` is not a callable predicate", path)));
        };

        self.cursor += 1;
        let argument = self.operand()?;
        self.expect_rparen()?;
        let subject = &path[..path.len() - op.method_name().len() - 1];
        Ok(Some(Expression::Predicate {
            op,
            subject: Box::new(Expression::Path(subject.to_string())),
            argument: Box::new(argument),
        }))
    }

    fn operand(&mut self) -> Result<Expression, ExpressionError> {
        let token = self
            .next()
            .ok_or_else(|| self.end_error("expected a value or context path"))?;
        let expression = match token.kind {
            TokenKind::Ident(path) => Expression::Path(path),
            TokenKind::Str(value) => Expression::Literal(Literal::Str(value)),
            TokenKind::Number(value) => Expression::Literal(Literal::Number(value)),
            TokenKind::True => Expression::Literal(Literal::Bool(true)),
            TokenKind::False => Expression::Literal(Literal::Bool(false)),
            TokenKind::Null => Expression::Literal(Literal::Null),
            TokenKind::Undefined => Expression::Literal(Literal::Undefined),
            _ => {
                return Err(self.error_at(token.position, "expected a value or context path"));
            }
        };
        Ok(expression)
    }

    fn expect_rparen(&mut self) -> Result<(), ExpressionError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => Ok(()),
            Some(token) => Err(self.error_at(token.position, "expected `)`")),
            None => Err(self.end_error("expected `)`")),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(Literal::Str(value)) => write!(f, "{:?}", value),
            Expression::Literal(Literal::Number(value)) => write!(f, "{}", value),
            Expression::Literal(Literal::Bool(value)) => write!(f, "{}", value),
            Expression::Literal(Literal::Null) => f.write_str("null"),
            Expression::Literal(Literal::Undefined) => f.write_str("undefined"),
            Expression::Path(path) => f.write_str(path),
            Expression::Compare { op, left, right } => {
                let symbol = match op {
                    CompareOp::Eq => "==",
                    CompareOp::Ne => "!=",
                    CompareOp::Gt => ">",
                    CompareOp::Ge => ">=",
                    CompareOp::Lt => "<",
                    CompareOp::Le => "<=",
                };
                write!(f, "({} {} {})", left, symbol, right)
            }
            Expression::Predicate {
                op,
                subject,
                argument,
            } => write!(f, "({} {} {})", subject, op.method_name(), argument),
            Expression::Logic { op, left, right } => {
                let symbol = match op {
                    LogicOp::And => "AND",
                    LogicOp::Or => "OR",
                };
                write!(f, "({} {} {})", left, symbol, right)
            }
        }
    }
}
