// Flow 文档存储能力与发布编排

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FlowError, Result};
use crate::graph::{FlowContext, FlowDocument};
use crate::validation::{validate, ValidationResult};

/// 调用方身份，对引擎不透明
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    #[default]
    Draft,
    Approved,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFlow {
    pub graph: FlowDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<FlowContext>,
    #[serde(default)]
    pub status: FlowStatus,
}

/// Flow 文档存储
///
/// 运行器与校验器不直接使用它，只有发布编排会调用。
#[async_trait]
pub trait FlowStore: Send + Sync {
    async fn get(&self, id: &str, principal: &Principal) -> Result<Option<StoredFlow>>;
    async fn save(
        &self,
        id: &str,
        graph: FlowDocument,
        context: Option<FlowContext>,
        principal: &Principal,
    ) -> Result<bool>;
    async fn set_status(&self, id: &str, status: FlowStatus, principal: &Principal)
        -> Result<bool>;
}

/// 内存存储实现
#[derive(Default)]
pub struct MemoryFlowStore {
    inner: RwLock<HashMap<String, StoredFlow>>,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStore for MemoryFlowStore {
    async fn get(&self, id: &str, _principal: &Principal) -> Result<Option<StoredFlow>> {
        Ok(self.inner.read().get(id).cloned())
    }

    async fn save(
        &self,
        id: &str,
        graph: FlowDocument,
        context: Option<FlowContext>,
        _principal: &Principal,
    ) -> Result<bool> {
        let mut flows = self.inner.write();
        let status = flows.get(id).map(|f| f.status).unwrap_or_default();
        flows.insert(
            id.to_string(),
            StoredFlow {
                graph,
                context,
                status,
            },
        );
        Ok(true)
    }

    async fn set_status(
        &self,
        id: &str,
        status: FlowStatus,
        _principal: &Principal,
    ) -> Result<bool> {
        match self.inner.write().get_mut(id) {
            Some(flow) => {
                flow.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// 发布结果，两种情况都带上校验结果
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published(ValidationResult),
    Rejected(ValidationResult),
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published(_))
    }

    pub fn validation(&self) -> &ValidationResult {
        match self {
            PublishOutcome::Published(result) | PublishOutcome::Rejected(result) => result,
        }
    }
}

/// 校验通过后才把状态从 draft 切换为 approved
pub async fn publish_flow(
    store: &dyn FlowStore,
    id: &str,
    principal: &Principal,
) -> Result<PublishOutcome> {
    let flow = store
        .get(id, principal)
        .await?
        .ok_or_else(|| FlowError::Store(format!("flow `{}` not found", id)))?;

    let result = validate(&flow.graph);
    if !result.is_valid {
        warn!(flow_id = %id, errors = result.errors.len(), "publish rejected by validation");
        return Ok(PublishOutcome::Rejected(result));
    }

    if !store.set_status(id, FlowStatus::Approved, principal).await? {
        return Err(FlowError::Store(format!(
            "failed to update status of flow `{}`",
            id
        )));
    }
    info!(flow_id = %id, principal = %principal, warnings = result.warnings.len(), "flow published");
    Ok(PublishOutcome::Published(result))
}
