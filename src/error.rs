use thiserror::Error;

use crate::expression::ExpressionError;

pub type Result<T> = std::result::Result<T, FlowError>;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("graph integrity error: {0}")]
    GraphIntegrity(String),
    #[error("flow requires exactly one start node, found {found}")]
    NoStartNode { found: usize },
    #[error("unknown node `{0}` in flow")]
    NodeNotFound(String),
    #[error("no valid outgoing path from node `{node_id}`")]
    NoValidPath { node_id: String },
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error("api call from node `{node_id}` failed: {message}")]
    ApiCall { node_id: String, message: String },
    #[error("runner has no current node")]
    NoCurrentNode,
    #[error("maximum steps {0} exceeded without reaching a page or end node")]
    MaxStepsExceeded(u32),
    #[error("store error: {0}")]
    Store(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
