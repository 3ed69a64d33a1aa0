use std::collections::BTreeMap;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlowError, Result};

/// 上下文路径前缀，表达式和占位符里的 `context.x` 等价于 `x`
pub const CONTEXT_PREFIX: &str = "context.";

/// Flow 上下文
///
/// 扁平的 key -> value 映射，key 为点分路径（如 `user.email`）。
/// 更新通过 [`FlowContext::merge`] 返回新的上下文，不做原地修改。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowContext {
    values: BTreeMap<String, Value>,
}

impl FlowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// 返回追加了一个键值后的新上下文
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// 合并补丁，补丁中的键覆盖已有值（last-write-wins）
    pub fn merge(&self, patch: &FlowContext) -> FlowContext {
        let mut values = self.values.clone();
        for (key, value) in &patch.values {
            values.insert(key.clone(), value.clone());
        }
        FlowContext { values }
    }

    /// 按点分路径解析值
    ///
    /// 先按完整 key 查找，再去掉 `context.` 前缀查找，最后从最长的已存在前缀
    /// 开始向对象内部逐段下钻。找不到时返回 `None`（即 undefined）。
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }
        let path = path.strip_prefix(CONTEXT_PREFIX).unwrap_or(path);
        if let Some(value) = self.values.get(path) {
            return Some(value);
        }

        let segments: Vec<&str> = path.split('.').collect();
        for split in (1..segments.len()).rev() {
            let head = segments[..split].join(".");
            if let Some(root) = self.values.get(&head) {
                if let Some(found) = lookup_in_value(root, &segments[split..]) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values.into_iter().collect()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.clone().into_map())
    }
}

/// 在 JSON 值内部按路径段查找，数组支持数字下标
pub fn lookup_in_value<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

impl From<Map<String, Value>> for FlowContext {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            values: map.into_iter().collect(),
        }
    }
}

impl TryFrom<Value> for FlowContext {
    type Error = FlowError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(map.into()),
            Value::Null => Ok(Self::default()),
            other => Err(FlowError::Other(anyhow!(
                "context must be a JSON object, got {}",
                other
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FlowContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
