use std::env;
use std::str::FromStr;

use anyhow::anyhow;

use crate::error::{FlowError, Result};

pub const DEBUG_ENV: &str = "FLOWPILOT_DEBUG";
pub const HTTP_TIMEOUT_ENV: &str = "FLOWPILOT_HTTP_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_ENV: &str = "FLOWPILOT_CONNECT_TIMEOUT_SECS";
pub const MAX_STEPS_ENV: &str = "FLOWPILOT_MAX_STEPS";
pub const FLOW_ID_ENV: &str = "FLOWPILOT_FLOW_ID";

/// 环境变量配置管理
pub struct EnvConfig;

impl EnvConfig {
    /// 从环境变量获取值
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key)
            .map_err(|_| FlowError::Other(anyhow!("environment variable `{}` is not set", key)))
    }

    /// 获取可选的环境变量
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// 解析可选的环境变量；存在但无法解析时返回错误
    pub fn get_parsed<T>(key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match Self::get_env_optional(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
                FlowError::Other(anyhow!(
                    "environment variable `{}` has invalid value `{}`: {}",
                    key,
                    raw,
                    e
                ))
            }),
        }
    }

    /// 检查是否启用调试模式
    pub fn is_debug_mode() -> bool {
        env::var(DEBUG_ENV).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_present_variable() {
        env::set_var("FLOWPILOT_TEST_PARSE_OK", "42");
        let value: Option<u32> = EnvConfig::get_parsed("FLOWPILOT_TEST_PARSE_OK").unwrap();
        assert_eq!(value, Some(42));
        env::remove_var("FLOWPILOT_TEST_PARSE_OK");
    }

    #[test]
    fn invalid_variable_is_an_error() {
        env::set_var("FLOWPILOT_TEST_PARSE_BAD", "many");
        assert!(EnvConfig::get_parsed::<u32>("FLOWPILOT_TEST_PARSE_BAD").is_err());
        env::remove_var("FLOWPILOT_TEST_PARSE_BAD");
    }

    #[test]
    fn missing_variable_reports_name() {
        let err = EnvConfig::get_env("FLOWPILOT_TEST_DEFINITELY_MISSING").unwrap_err();
        assert!(err.to_string().contains("FLOWPILOT_TEST_DEFINITELY_MISSING"));
    }
}
