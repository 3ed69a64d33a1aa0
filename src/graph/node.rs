use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::FlowError;

/// 节点类型，对应 JSON 中的 `type` 字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Start,
    Page,
    Condition,
    Api,
    ApiCondition,
    End,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::Page => "page",
            NodeType::Condition => "condition",
            NodeType::Api => "api",
            NodeType::ApiCondition => "apiCondition",
            NodeType::End => "end",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(NodeType::Start),
            "page" => Some(NodeType::Page),
            "condition" => Some(NodeType::Condition),
            "api" => Some(NodeType::Api),
            "apiCondition" => Some(NodeType::ApiCondition),
            "end" => Some(NodeType::End),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "delete")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// 不区分大小写解析请求方法
    pub fn parse(value: &str) -> Option<Self> {
        [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
        ]
        .into_iter()
        .find(|method| method.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// GET / DELETE 请求不携带请求体
    pub fn carries_body(&self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条件分支
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub label: String,
    #[serde(default)]
    pub expression: String,
}

impl Branch {
    pub fn new(label: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            expression: expression.into(),
        }
    }
}

/// 响应映射：从响应体的 `responsePath` 读取，写入上下文的 `contextKey`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMapping {
    #[serde(rename = "contextKey")]
    pub context_key: String,
    #[serde(rename = "responsePath")]
    pub response_path: String,
}

/// API 副作用配置，page / api / apiCondition 节点共用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(rename = "apiEnabled", default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "blank_method_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// 请求体字段 -> 上下文路径
    #[serde(rename = "keyMapping", default, skip_serializing_if = "Option::is_none")]
    pub key_mapping: Option<BTreeMap<String, String>>,
    #[serde(rename = "responseMappings", default, skip_serializing_if = "Vec::is_empty")]
    pub response_mappings: Vec<ResponseMapping>,
}

/// 编辑器草稿里未选择的方法是空字符串，按缺失处理，交给校验器报告
fn blank_method_as_none<'de, D>(deserializer: D) -> Result<Option<HttpMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => HttpMethod::parse(text).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown HTTP method `{}`", text))
        }),
    }
}

impl ApiSettings {
    pub fn is_enabled(&self, default: bool) -> bool {
        self.enabled.unwrap_or(default)
    }
}

/// 条件配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<Branch>,
    #[serde(rename = "defaultBranchLabel", default, skip_serializing_if = "Option::is_none")]
    pub default_branch_label: Option<String>,
    /// 旧版单表达式写法
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

pub const LEGACY_TRUE_LABEL: &str = "true";
pub const LEGACY_FALSE_LABEL: &str = "false";

impl ConditionSettings {
    fn is_legacy(&self) -> bool {
        self.branches.is_empty()
            && self
                .conditions
                .as_deref()
                .map(|c| !c.trim().is_empty())
                .unwrap_or(false)
    }

    /// 实际参与求值的分支；旧版写法视为单个 `true` 分支
    pub fn effective_branches(&self) -> Cow<'_, [Branch]> {
        if self.is_legacy() {
            let expression = self.conditions.clone().unwrap_or_default();
            Cow::Owned(vec![Branch::new(LEGACY_TRUE_LABEL, expression)])
        } else {
            Cow::Borrowed(&self.branches)
        }
    }

    pub fn default_label(&self) -> Option<&str> {
        match self.default_branch_label.as_deref() {
            Some(label) if !label.trim().is_empty() => Some(label),
            Some(_) => None,
            None if self.is_legacy() => Some(LEGACY_FALSE_LABEL),
            None => None,
        }
    }

    /// 所有声明过的分支标签（含默认标签）
    pub fn declared_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .effective_branches()
            .iter()
            .map(|b| b.label.clone())
            .collect();
        if let Some(default) = self.default_label() {
            labels.push(default.to_string());
        }
        labels
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "pageRef", default, skip_serializing_if = "Option::is_none")]
    pub page_ref: Option<String>,
    #[serde(rename = "pagePath", default, skip_serializing_if = "Option::is_none")]
    pub page_path: Option<String>,
    #[serde(flatten)]
    pub api: ApiSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub condition: ConditionSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub api: ApiSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConditionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub api: ApiSettings,
    #[serde(flatten)]
    pub condition: ConditionSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 节点类型及其专属数据
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Start(StartData),
    Page(PageData),
    Condition(ConditionData),
    Api(ApiData),
    ApiCondition(ApiConditionData),
    End(EndData),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Start(_) => NodeType::Start,
            NodeKind::Page(_) => NodeType::Page,
            NodeKind::Condition(_) => NodeType::Condition,
            NodeKind::Api(_) => NodeType::Api,
            NodeKind::ApiCondition(_) => NodeType::ApiCondition,
            NodeKind::End(_) => NodeType::End,
        }
    }
}

/// Flow 节点
///
/// 序列化形状与编辑器一致：`{id, type, data, ...}`，其余字段（如 `position`）原样保留。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            extra: Map::new(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn label(&self) -> Option<&str> {
        let label = match &self.kind {
            NodeKind::Start(data) => data.label.as_deref(),
            NodeKind::Page(data) => data.label.as_deref(),
            NodeKind::Condition(data) => data.label.as_deref(),
            NodeKind::Api(data) => data.label.as_deref(),
            NodeKind::ApiCondition(data) => data.label.as_deref(),
            NodeKind::End(data) => data.label.as_deref(),
        };
        label.filter(|l| !l.trim().is_empty())
    }

    /// 缺少标签时合成一个默认标签
    pub fn display_label(&self) -> String {
        match self.label() {
            Some(label) => label.to_string(),
            None => format!("{} {}", self.node_type(), self.id),
        }
    }

    /// 启用时返回 API 配置；page 默认关闭，api / apiCondition 默认开启
    pub fn api(&self) -> Option<&ApiSettings> {
        let (settings, default) = match &self.kind {
            NodeKind::Page(data) => (&data.api, false),
            NodeKind::Api(data) => (&data.api, true),
            NodeKind::ApiCondition(data) => (&data.api, true),
            _ => return None,
        };
        settings.is_enabled(default).then_some(settings)
    }

    pub fn condition(&self) -> Option<&ConditionSettings> {
        match &self.kind {
            NodeKind::Condition(data) => Some(&data.condition),
            NodeKind::ApiCondition(data) => Some(&data.condition),
            _ => None,
        }
    }

    pub fn page_ref(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Page(data) => data.page_ref.as_deref().filter(|r| !r.trim().is_empty()),
            _ => None,
        }
    }

    pub fn page_path(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Page(data) => data.page_path.as_deref().filter(|p| !p.trim().is_empty()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    data: Value,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn parse_data<T: serde::de::DeserializeOwned>(
    id: &str,
    node_type: &str,
    data: Value,
) -> Result<T, FlowError> {
    let data = if data.is_null() {
        Value::Object(Map::new())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|e| {
        FlowError::GraphIntegrity(format!(
            "node `{}` has invalid `{}` data: {}",
            id, node_type, e
        ))
    })
}

impl TryFrom<RawNode> for Node {
    type Error = FlowError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let node_type = NodeType::parse(&raw.node_type).ok_or_else(|| {
            FlowError::GraphIntegrity(format!(
                "node `{}` has unknown type `{}`",
                raw.id, raw.node_type
            ))
        })?;
        let id = raw.id;
        let kind = match node_type {
            NodeType::Start => NodeKind::Start(parse_data(&id, &raw.node_type, raw.data)?),
            NodeType::Page => NodeKind::Page(parse_data(&id, &raw.node_type, raw.data)?),
            NodeType::Condition => {
                NodeKind::Condition(parse_data(&id, &raw.node_type, raw.data)?)
            }
            NodeType::Api => NodeKind::Api(parse_data(&id, &raw.node_type, raw.data)?),
            NodeType::ApiCondition => {
                NodeKind::ApiCondition(parse_data(&id, &raw.node_type, raw.data)?)
            }
            NodeType::End => NodeKind::End(parse_data(&id, &raw.node_type, raw.data)?),
        };
        Ok(Node {
            id,
            kind,
            extra: raw.extra,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let node_type = node.node_type().as_str().to_string();
        let data = match &node.kind {
            NodeKind::Start(data) => serde_json::to_value(data),
            NodeKind::Page(data) => serde_json::to_value(data),
            NodeKind::Condition(data) => serde_json::to_value(data),
            NodeKind::Api(data) => serde_json::to_value(data),
            NodeKind::ApiCondition(data) => serde_json::to_value(data),
            NodeKind::End(data) => serde_json::to_value(data),
        }
        .unwrap_or_default();
        RawNode {
            id: node.id,
            node_type,
            data,
            extra: node.extra,
        }
    }
}
