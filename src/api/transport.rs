use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::graph::HttpMethod;

/// 已渲染完成、可直接发送的请求
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP 传输层
///
/// 网络层错误返回 `Err`；非 2xx 状态码属于正常响应，由执行器判定成败。
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(feature = "http-client")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http-client")]
mod reqwest_transport {
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use once_cell::sync::Lazy;

    use super::{HttpRequest, HttpResponse, HttpTransport};
    use crate::error::{FlowError, Result};
    use crate::graph::HttpMethod;

    static SHARED_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
        ReqwestTransport::build_client(Duration::from_secs(30), Duration::from_secs(10))
    });

    /// 基于 reqwest 的传输实现
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// 创建带超时配置的客户端
        ///
        /// 超时到期时请求以错误返回，不会一直挂起。
        pub fn new(timeout: Duration, connect_timeout: Duration) -> Self {
            Self {
                client: Self::build_client(timeout, connect_timeout),
            }
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }

        fn build_client(timeout: Duration, connect_timeout: Duration) -> reqwest::Client {
            reqwest::Client::builder()
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .connect_timeout(connect_timeout)
                .timeout(timeout)
                .build()
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "falling back to default HTTP client");
                    reqwest::Client::new()
                })
        }

        fn method(method: HttpMethod) -> reqwest::Method {
            match method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
                HttpMethod::Patch => reqwest::Method::PATCH,
                HttpMethod::Delete => reqwest::Method::DELETE,
            }
        }
    }

    impl Default for ReqwestTransport {
        fn default() -> Self {
            Self {
                client: SHARED_CLIENT.clone(),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            let mut builder = self
                .client
                .request(Self::method(request.method), &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| FlowError::Other(anyhow!("request to {} failed: {}", request.url, e)))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| FlowError::Other(anyhow!("failed to read response body: {}", e)))?;
            Ok(HttpResponse { status, body })
        }
    }
}

/// 未启用 `http-client` 特性时的占位传输，所有请求都以失败返回
#[derive(Debug, Clone, Default)]
pub struct DisabledTransport;

#[async_trait]
impl HttpTransport for DisabledTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Err(crate::error::FlowError::Other(anyhow::anyhow!(
            "no HTTP transport configured for {} {}",
            request.method,
            request.url
        )))
    }
}
