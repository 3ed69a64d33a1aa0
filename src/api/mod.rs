// API 副作用执行 - 请求构建、发送与响应映射

mod executor;
mod template;
mod transport;

pub use executor::{ApiCallOutcome, ApiExecutor, RESPONSE_OK_KEY, RESPONSE_STATUS_KEY};
pub use template::{render_template, render_value};
#[cfg(feature = "http-client")]
pub use transport::ReqwestTransport;
pub use transport::{DisabledTransport, HttpRequest, HttpResponse, HttpTransport};
