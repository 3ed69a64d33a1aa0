use serde::Serialize;

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// 一次推进的结果
///
/// 失败不在这里表示，而是以 `Err(FlowError)` 返回。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExecutionResult {
    /// 停在 page 节点，等待调用方提交表单或跳转
    #[serde(rename_all = "camelCase")]
    Navigate {
        node_id: String,
        page_ref: Option<String>,
        navigation_url: String,
    },
    /// 到达 end 节点，或所在节点没有后续出边
    #[serde(rename_all = "camelCase")]
    Completed { node_id: Option<String> },
}

impl ExecutionResult {
    pub fn should_navigate(&self) -> bool {
        matches!(self, ExecutionResult::Navigate { .. })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionResult::Completed { .. })
    }

    pub fn navigation_url(&self) -> Option<&str> {
        match self {
            ExecutionResult::Navigate { navigation_url, .. } => Some(navigation_url),
            ExecutionResult::Completed { .. } => None,
        }
    }

    /// 运行停下时所在的节点
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ExecutionResult::Navigate { node_id, .. } => Some(node_id),
            ExecutionResult::Completed { node_id } => node_id.as_deref(),
        }
    }

    /// 下一个等待处理的节点；运行结束时为 `None`
    pub fn next_node_id(&self) -> Option<&str> {
        match self {
            ExecutionResult::Navigate { node_id, .. } => Some(node_id),
            ExecutionResult::Completed { .. } => None,
        }
    }
}
