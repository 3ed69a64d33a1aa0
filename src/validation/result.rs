use serde::{Deserialize, Serialize};

/// 校验项 ID
///
/// 全局检查使用固定 ID；针对单个节点或边的检查 ID 为 `<check>-<nodeId|edgeId>`。
pub mod checks {
    pub const EMPTY_FLOW: &str = "empty-flow";
    pub const NO_START: &str = "no-start";
    pub const MULTIPLE_STARTS: &str = "multiple-starts";
    pub const NO_END: &str = "no-end";
    pub const DUPLICATE_NODE: &str = "duplicate-node";
    pub const DUPLICATE_EDGE: &str = "duplicate-edge";
    pub const MISSING_LABEL: &str = "missing-label";
    pub const PAGE_MISSING_REF: &str = "page-missing-ref";
    pub const CONDITION_NO_BRANCHES: &str = "condition-no-branches";
    pub const BRANCH_MISSING_LABEL: &str = "branch-missing-label";
    pub const INVALID_EXPRESSION: &str = "invalid-expression";
    pub const API_MISSING_METHOD: &str = "api-missing-method";
    pub const API_MISSING_URL: &str = "api-missing-url";
    pub const EDGE_MISSING_SOURCE: &str = "edge-missing-source";
    pub const EDGE_MISSING_TARGET: &str = "edge-missing-target";
    pub const AMBIGUOUS_EDGE: &str = "ambiguous-edge";
    pub const START_EDGES: &str = "start-edges";
    pub const ORPHANED: &str = "orphaned";
    pub const UNREACHABLE: &str = "unreachable";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub id: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub message: String,
    #[serde(rename = "nodeId", default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(rename = "edgeId", default, skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
}

impl ValidationIssue {
    pub fn new(id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }
}

/// 校验结果；`is_valid` 当且仅当没有 error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub(crate) fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn has_error(&self, id: &str) -> bool {
        self.errors.iter().any(|issue| issue.id == id)
    }

    pub fn has_warning(&self, id: &str) -> bool {
        self.warnings.iter().any(|issue| issue.id == id)
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().chain(self.warnings.iter())
    }
}
