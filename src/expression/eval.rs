use std::cmp::Ordering;

use serde_json::Value;

use super::parser::{CompareOp, Expression, Literal, LogicOp, PredicateOp};
use crate::graph::FlowContext;

/// 求值时的操作数；上下文中不存在的路径为 `Undefined`
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Undefined,
    Value(Value),
}

impl Operand {
    fn truthy(&self) -> bool {
        match self {
            Operand::Undefined => false,
            Operand::Value(value) => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
                Value::String(s) => !s.is_empty(),
                Value::Array(_) | Value::Object(_) => true,
            },
        }
    }
}

impl Expression {
    pub fn evaluate(&self, context: &FlowContext) -> bool {
        match self {
            Expression::Logic { op, left, right } => match op {
                LogicOp::And => left.evaluate(context) && right.evaluate(context),
                LogicOp::Or => left.evaluate(context) || right.evaluate(context),
            },
            Expression::Compare { op, left, right } => {
                compare(*op, &left.resolve(context), &right.resolve(context))
            }
            Expression::Predicate {
                op,
                subject,
                argument,
            } => predicate(*op, &subject.resolve(context), &argument.resolve(context)),
            Expression::Literal(_) | Expression::Path(_) => self.resolve(context).truthy(),
        }
    }

    pub fn resolve(&self, context: &FlowContext) -> Operand {
        match self {
            Expression::Literal(literal) => match literal {
                Literal::Str(value) => Operand::Value(Value::String(value.clone())),
                Literal::Number(value) => Operand::Value(number_value(*value)),
                Literal::Bool(value) => Operand::Value(Value::Bool(*value)),
                Literal::Null => Operand::Value(Value::Null),
                Literal::Undefined => Operand::Undefined,
            },
            Expression::Path(path) => context
                .lookup(path)
                .cloned()
                .map(Operand::Value)
                .unwrap_or(Operand::Undefined),
            other => Operand::Value(Value::Bool(other.evaluate(context))),
        }
    }
}

fn number_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 宽松相等：数字与数字字符串、布尔与 "true"/"false" 视为相等
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => match (as_number(left), as_number(right)) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s == if *b { "true" } else { "false" }
        }
        _ => left == right,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Value::String(l), Value::String(r)) = (left, right) {
        if let (Ok(l), Ok(r)) = (l.trim().parse::<f64>(), r.trim().parse::<f64>()) {
            return l.partial_cmp(&r);
        }
        return Some(l.cmp(r));
    }
    if left.is_null() || right.is_null() {
        return None;
    }
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => None,
    }
}

fn compare(op: CompareOp, left: &Operand, right: &Operand) -> bool {
    let (left, right) = match (left, right) {
        (Operand::Value(l), Operand::Value(r)) => (l, r),
        _ => return op == CompareOp::Ne,
    };
    match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
    }
}

fn predicate(op: PredicateOp, subject: &Operand, argument: &Operand) -> bool {
    let (subject, argument) = match (subject, argument) {
        (Operand::Value(s), Operand::Value(a)) => (s, a),
        _ => return false,
    };
    if let (PredicateOp::Includes, Value::Array(items)) = (op, subject) {
        return items.iter().any(|item| loose_eq(item, argument));
    }
    let (Value::String(text), Some(needle)) = (subject, as_text(argument)) else {
        return false;
    };
    match op {
        PredicateOp::Includes => text.contains(&needle),
        PredicateOp::StartsWith => text.starts_with(&needle),
        PredicateOp::EndsWith => text.ends_with(&needle),
    }
}
