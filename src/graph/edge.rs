use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// apiCondition 节点保留的成功出口标识
pub const SUCCESS_HANDLE: &str = "success";
/// apiCondition 节点保留的失败出口标识
pub const FAILURE_HANDLE: &str = "failure";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 有向边
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "sourceHandle", default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(rename = "targetHandle", default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EdgeData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            data: None,
            extra: Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.data.get_or_insert_with(EdgeData::default).label = Some(label.into());
        self
    }

    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.label.as_deref())
    }

    /// `data.label` 或 `sourceHandle` 与给定标签完全一致（区分大小写）
    pub fn matches(&self, label: &str) -> bool {
        self.label() == Some(label) || self.source_handle.as_deref() == Some(label)
    }

    pub fn is_labeled(&self) -> bool {
        self.label().map(|l| !l.is_empty()).unwrap_or(false)
            || self
                .source_handle
                .as_deref()
                .map(|h| !h.is_empty())
                .unwrap_or(false)
    }

    pub fn is_failure(&self) -> bool {
        self.matches(FAILURE_HANDLE)
    }
}
