// 条件表达式 - 受限语法的解释器
//
// 只支持上下文路径、字面量、比较运算、字符串谓词与 AND/OR 组合，
// 不会把表达式当作代码执行。

mod eval;
mod lexer;
mod parser;

use thiserror::Error;

use crate::graph::FlowContext;

pub use eval::Operand;
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{CompareOp, Expression, Literal, LogicOp, PredicateOp, MAX_CLAUSES, MAX_NESTING};

/// 表达式解析或求值错误
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid expression `{expression}` at {position}: {message}")]
pub struct ExpressionError {
    pub expression: String,
    pub position: usize,
    pub message: String,
}

impl ExpressionError {
    pub fn new(expression: &str, position: usize, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            position,
            message: message.into(),
        }
    }
}

/// 对上下文求值；空白表达式恒为 `true`
pub fn evaluate(expression: &str, context: &FlowContext) -> Result<bool, ExpressionError> {
    match Expression::parse(expression)? {
        Some(parsed) => Ok(parsed.evaluate(context)),
        None => Ok(true),
    }
}

/// 只检查语法，不求值
pub fn check(expression: &str) -> Result<(), ExpressionError> {
    Expression::parse(expression).map(|_| ())
}
