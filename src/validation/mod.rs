// 发布前的静态校验

mod result;
mod rules;

pub use result::{checks, Severity, ValidationIssue, ValidationResult};
pub use rules::{validate, validate_graph};
