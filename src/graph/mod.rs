// Flow 图模型 - 节点、边与上下文

mod context;
mod edge;
mod model;
mod node;

pub use context::{lookup_in_value, FlowContext, CONTEXT_PREFIX};
pub use edge::{Edge, EdgeData, FAILURE_HANDLE, SUCCESS_HANDLE};
pub use model::{FlowDocument, FlowGraph};
pub use node::{
    ApiConditionData, ApiData, ApiSettings, Branch, ConditionData, ConditionSettings, EndData,
    HttpMethod, Node, NodeKind, NodeType, PageData, ResponseMapping, StartData,
    LEGACY_FALSE_LABEL, LEGACY_TRUE_LABEL,
};
