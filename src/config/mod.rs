// 引擎配置

mod env;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

pub use env::{
    EnvConfig, CONNECT_TIMEOUT_ENV, DEBUG_ENV, FLOW_ID_ENV, HTTP_TIMEOUT_ENV, MAX_STEPS_ENV,
};

/// 引擎运行参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 单次 API 调用的整体超时（秒）
    pub http_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// 一次推进中最多连续执行的节点数，防止无暂停点的环路
    pub max_steps: u32,
    /// 生成页面跳转地址 `/flow/{flow_id}/{node_id}` 时使用
    pub flow_id: String,
    /// 每个 API 请求都会带上的请求头
    pub default_headers: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_steps: 256,
            flow_id: "flow".to_string(),
            default_headers: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FlowError::Other(anyhow!("failed to parse engine config: {}", e)))
    }

    /// 默认配置叠加环境变量
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    pub fn overlay_env(mut self) -> Result<Self> {
        if let Some(secs) = EnvConfig::get_parsed(HTTP_TIMEOUT_ENV)? {
            self.http_timeout_secs = secs;
        }
        if let Some(secs) = EnvConfig::get_parsed(CONNECT_TIMEOUT_ENV)? {
            self.connect_timeout_secs = secs;
        }
        if let Some(steps) = EnvConfig::get_parsed(MAX_STEPS_ENV)? {
            self.max_steps = steps;
        }
        if let Some(flow_id) = EnvConfig::get_env_optional(FLOW_ID_ENV) {
            self.flow_id = flow_id;
        }
        Ok(self)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}
