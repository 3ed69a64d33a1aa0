// 运行器 - 逐节点解释执行 Flow 图

mod engine;
mod result;

pub use engine::FlowRunner;
pub use result::{ExecutionResult, RunState};
