use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::graph::{lookup_in_value, ApiSettings, FlowContext};

use super::template::{render_template, render_value};
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

pub const RESPONSE_STATUS_KEY: &str = "api.response.status";
pub const RESPONSE_OK_KEY: &str = "api.response.ok";

/// 一次 API 调用的结果
///
/// 调用本身从不返回错误：网络失败、非 2xx、响应非 JSON 都以 `success: false` 报告，
/// 由调用方决定走 failure 出口还是终止。
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCallOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub response_body: Option<Value>,
    pub error: Option<String>,
    /// 需要合并进上下文的补丁（响应映射 + 响应元数据）
    pub context_patch: FlowContext,
}

impl ApiCallOutcome {
    fn failed(status: Option<u16>, response_body: Option<Value>, error: String) -> Self {
        let patch = FlowContext::new()
            .with(
                RESPONSE_STATUS_KEY,
                status.map(Value::from).unwrap_or(Value::Null),
            )
            .with(RESPONSE_OK_KEY, false);
        Self {
            success: false,
            status,
            response_body,
            error: Some(error),
            context_patch: patch,
        }
    }
}

/// API 副作用执行器
#[derive(Clone)]
pub struct ApiExecutor {
    transport: Arc<dyn HttpTransport>,
    default_headers: BTreeMap<String, String>,
    timeout: Duration,
}

impl ApiExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            default_headers: BTreeMap::new(),
            timeout: EngineConfig::default().http_timeout(),
        }
    }

    /// 根据配置创建执行器；启用 `http-client` 时使用 reqwest
    pub fn from_config(config: &EngineConfig) -> Self {
        #[cfg(feature = "http-client")]
        let transport: Arc<dyn HttpTransport> = Arc::new(super::transport::ReqwestTransport::new(
            config.http_timeout(),
            config.connect_timeout(),
        ));
        #[cfg(not(feature = "http-client"))]
        let transport: Arc<dyn HttpTransport> = Arc::new(super::transport::DisabledTransport);

        Self::new(transport)
            .with_default_headers(config.default_headers.clone())
            .with_timeout(config.http_timeout())
    }

    pub fn with_default_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 构建请求
    ///
    /// 请求体按优先级从低到高合并：表单数据、静态 `body` 模板、`keyMapping`。
    /// GET / DELETE 不携带请求体。
    pub fn build_request(
        &self,
        settings: &ApiSettings,
        context: &FlowContext,
        form_data: Option<&FlowContext>,
    ) -> Result<HttpRequest, String> {
        let method = settings
            .method
            .ok_or_else(|| "api settings have no method".to_string())?;
        let url_template = settings
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| "api settings have no url".to_string())?;
        let url = render_template(url_template, context);

        let mut headers = self.default_headers.clone();
        if let Some(extra) = &settings.headers {
            for (name, value) in extra {
                headers.insert(name.clone(), render_template(value, context));
            }
        }

        let body = if method.carries_body() {
            build_body(settings, context, form_data)
        } else {
            None
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    #[instrument(
        name = "api_call",
        skip_all,
        fields(method = tracing::field::Empty, url = tracing::field::Empty)
    )]
    pub async fn call(
        &self,
        settings: &ApiSettings,
        context: &FlowContext,
        form_data: Option<&FlowContext>,
    ) -> ApiCallOutcome {
        let request = match self.build_request(settings, context, form_data) {
            Ok(request) => request,
            Err(message) => return ApiCallOutcome::failed(None, None, message),
        };
        let span = tracing::Span::current();
        span.record("method", request.method.as_str());
        span.record("url", request.url.as_str());

        let response = match tokio::time::timeout(self.timeout, self.transport.send(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                warn!(error = %error, "api transport failed");
                return ApiCallOutcome::failed(None, None, error.to_string());
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "api call timed out");
                return ApiCallOutcome::failed(
                    None,
                    None,
                    format!("request timed out after {:?}", self.timeout),
                );
            }
        };

        let outcome = interpret_response(settings, response);
        debug!(success = outcome.success, status = ?outcome.status, "api call finished");
        outcome
    }
}

fn build_body(
    settings: &ApiSettings,
    context: &FlowContext,
    form_data: Option<&FlowContext>,
) -> Option<Value> {
    let mut contributed = false;
    let mut body = Map::new();

    if let Some(form) = form_data.filter(|f| !f.is_empty()) {
        body.extend(form.clone().into_map());
        contributed = true;
    }

    if let Some(template) = &settings.body {
        // 字符串模板先解析成 JSON 再渲染，占位符只会替换字符串叶子
        let parsed = match template {
            Value::String(text) => serde_json::from_str::<Value>(text).ok(),
            _ => None,
        };
        let rendered = render_value(parsed.as_ref().unwrap_or(template), context);
        match rendered {
            Value::Object(map) => {
                body.extend(map);
                contributed = true;
            }
            Value::Null => {}
            other => {
                // 非对象模板整体替换请求体，keyMapping 不再适用
                return Some(other);
            }
        }
    }

    if let Some(mapping) = &settings.key_mapping {
        for (field, path) in mapping {
            let value = context.lookup(path).cloned().unwrap_or(Value::Null);
            body.insert(field.clone(), value);
            contributed = true;
        }
    }

    contributed.then_some(Value::Object(body))
}

fn interpret_response(settings: &ApiSettings, response: HttpResponse) -> ApiCallOutcome {
    let status = response.status;
    let trimmed = response.body.trim();

    if !response.is_success() {
        let parsed = serde_json::from_str::<Value>(trimmed).ok();
        let error = if trimmed.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, trimmed)
        };
        return ApiCallOutcome::failed(Some(status), parsed, error);
    }

    let body = if trimmed.is_empty() {
        Value::Null
    } else {
        match serde_json::from_str::<Value>(trimmed) {
            Ok(body) => body,
            Err(e) => {
                return ApiCallOutcome::failed(
                    Some(status),
                    None,
                    format!("response is not valid JSON: {}", e),
                );
            }
        }
    };

    let mut patch = FlowContext::new()
        .with(RESPONSE_STATUS_KEY, status)
        .with(RESPONSE_OK_KEY, true);
    for mapping in &settings.response_mappings {
        let value = read_response_path(&body, &mapping.response_path);
        patch = patch.with(mapping.context_key.clone(), value);
    }

    ApiCallOutcome {
        success: true,
        status: Some(status),
        response_body: Some(body),
        error: None,
        context_patch: patch,
    }
}

/// 按点分路径读取响应字段，缺失时为 `null`；空路径返回整个响应体
fn read_response_path(body: &Value, path: &str) -> Value {
    let path = path.trim().trim_matches('.');
    if path.is_empty() {
        return body.clone();
    }
    let segments: Vec<&str> = path.split('.').collect();
    lookup_in_value(body, &segments)
        .cloned()
        .unwrap_or(Value::Null)
}
