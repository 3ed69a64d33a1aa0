pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod expression;
pub mod graph;
pub mod runner;
pub mod store;
pub mod utils;
pub mod validation;

#[cfg(feature = "http-client")]
pub use api::ReqwestTransport;
pub use api::{
    ApiCallOutcome, ApiExecutor, DisabledTransport, HttpRequest, HttpResponse, HttpTransport,
};
pub use config::{EngineConfig, EnvConfig};
pub use error::{FlowError, Result};
pub use expression::{evaluate, ExpressionError};
pub use graph::{
    ApiSettings, Branch, ConditionSettings, Edge, FlowContext, FlowDocument, FlowGraph,
    HttpMethod, Node, NodeKind, NodeType, ResponseMapping,
};
pub use runner::{ExecutionResult, FlowRunner, RunState};
pub use store::{
    publish_flow, FlowStatus, FlowStore, MemoryFlowStore, Principal, PublishOutcome, StoredFlow,
};
pub use utils::logging;
pub use validation::{validate, Severity, ValidationIssue, ValidationResult};
