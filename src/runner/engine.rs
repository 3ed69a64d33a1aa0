use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiCallOutcome, ApiExecutor};
use crate::config::EngineConfig;
use crate::error::{FlowError, Result};
use crate::expression;
use crate::graph::{
    ConditionSettings, Edge, FlowContext, FlowGraph, Node, NodeKind, NodeType, SUCCESS_HANDLE,
};

use super::result::{ExecutionResult, RunState};

/// 单个节点执行后的去向
enum Step {
    Goto(String),
    Done(ExecutionResult),
}

/// Flow 运行器
///
/// 一个实例对应一次执行：持有游标与上下文。所有推进方法都需要 `&mut self`，
/// 同一实例不能被并发驱动。
pub struct FlowRunner {
    graph: Arc<FlowGraph>,
    executor: ApiExecutor,
    context: FlowContext,
    current: Option<String>,
    state: RunState,
    flow_id: String,
    max_steps: u32,
    history: Vec<String>,
}

impl FlowRunner {
    pub fn new(graph: Arc<FlowGraph>) -> Self {
        Self::with_config(graph, &EngineConfig::default())
    }

    pub fn with_config(graph: Arc<FlowGraph>, config: &EngineConfig) -> Self {
        Self {
            graph,
            executor: ApiExecutor::from_config(config),
            context: FlowContext::new(),
            current: None,
            state: RunState::NotStarted,
            flow_id: config.flow_id.clone(),
            max_steps: config.max_steps.max(1),
            history: Vec::new(),
        }
    }

    pub fn with_executor(mut self, executor: ApiExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_context(mut self, context: FlowContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = flow_id.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn context(&self) -> &FlowContext {
        &self.context
    }

    /// 合并补丁到上下文（last-write-wins）
    pub fn update_context(&mut self, patch: FlowContext) {
        self.context = self.context.merge(&patch);
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_node(&self) -> Option<&Node> {
        self.current
            .as_deref()
            .and_then(|id| self.graph.get_node(id))
    }

    /// 已执行过的节点，按执行顺序
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// 回到未启动状态，保留上下文
    pub fn reset(&mut self) {
        self.current = None;
        self.state = RunState::NotStarted;
        self.history.clear();
    }

    #[instrument(skip(self), fields(flow_id = %self.flow_id))]
    pub async fn start(&mut self) -> Result<ExecutionResult> {
        self.history.clear();
        let start = self.graph.start_node().map(|node| node.id.clone());
        let start_id = match start {
            Ok(id) => id,
            Err(error) => return self.settle(Err(error)),
        };
        info!(start = %start_id, "flow started");
        self.current = Some(start_id);
        self.state = RunState::Running;
        let result = self.drive().await;
        self.settle(result)
    }

    #[instrument(skip(self), fields(flow_id = %self.flow_id, node_id = ?self.current))]
    pub async fn execute_current_node(&mut self) -> Result<ExecutionResult> {
        if self.current.is_none() {
            return Err(FlowError::NoCurrentNode);
        }
        let result = self.drive().await;
        self.settle(result)
    }

    /// 调用方主动跳转（如向导中的“返回”）
    #[instrument(skip(self), fields(flow_id = %self.flow_id))]
    pub async fn navigate_to_node(&mut self, node_id: &str) -> Result<ExecutionResult> {
        if self.graph.get_node(node_id).is_none() {
            return self.settle(Err(FlowError::NodeNotFound(node_id.to_string())));
        }
        self.current = Some(node_id.to_string());
        self.state = RunState::Running;
        let result = self.drive().await;
        self.settle(result)
    }

    /// 提交当前页面并继续
    ///
    /// 表单数据先合并进上下文，再执行当前节点声明的 API 调用，最后沿出边推进。
    /// API 失败时已合并的表单数据不会回滚。
    #[instrument(skip(self, form_data), fields(flow_id = %self.flow_id, node_id = ?self.current))]
    pub async fn process_form_submission(
        &mut self,
        form_data: FlowContext,
    ) -> Result<ExecutionResult> {
        if self.current.is_none() {
            return Err(FlowError::NoCurrentNode);
        }
        let result = self.submit(form_data).await;
        self.settle(result)
    }

    async fn submit(&mut self, form_data: FlowContext) -> Result<ExecutionResult> {
        let graph = Arc::clone(&self.graph);
        let node_id = self.current.clone().ok_or(FlowError::NoCurrentNode)?;
        let node = graph
            .get_node(&node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.clone()))?;

        self.context = self.context.merge(&form_data);
        debug!(keys = form_data.len(), "form data merged into context");

        if node.node_type() != NodeType::Page {
            // 非页面节点（例如之前失败的节点）直接重新执行
            return self.drive().await;
        }

        let step = match node.api() {
            Some(api) => {
                let outcome = self
                    .executor
                    .call(api, &self.context, Some(&form_data))
                    .await;
                self.route_after_api(&graph, node, outcome, None)?
            }
            None => self.follow(node, next_edge(&graph, node)),
        };

        match step {
            Step::Goto(next) => {
                self.current = Some(next);
                self.drive().await
            }
            Step::Done(result) => Ok(result),
        }
    }

    /// 从游标处连续执行，直到停在页面、结束或出错
    async fn drive(&mut self) -> Result<ExecutionResult> {
        let graph = Arc::clone(&self.graph);
        for _ in 0..self.max_steps {
            let node_id = self.current.clone().ok_or(FlowError::NoCurrentNode)?;
            let node = graph
                .get_node(&node_id)
                .ok_or_else(|| FlowError::NodeNotFound(node_id.clone()))?;
            self.history.push(node_id);
            debug!(node_id = %node.id, node_type = %node.node_type(), label = %node.display_label(), "executing node");

            match self.step(&graph, node).await? {
                Step::Goto(next) => self.current = Some(next),
                Step::Done(result) => return Ok(result),
            }
        }
        Err(FlowError::MaxStepsExceeded(self.max_steps))
    }

    async fn step(&mut self, graph: &FlowGraph, node: &Node) -> Result<Step> {
        match &node.kind {
            NodeKind::Start(_) => Ok(self.follow(node, next_edge(graph, node))),
            NodeKind::Page(_) => Ok(Step::Done(ExecutionResult::Navigate {
                node_id: node.id.clone(),
                page_ref: node.page_ref().map(str::to_string),
                navigation_url: self.navigation_url(node),
            })),
            NodeKind::Condition(data) => {
                let edge = select_branch(graph, node, &data.condition, &self.context)?;
                Ok(Step::Goto(edge.target.clone()))
            }
            NodeKind::Api(_) => match node.api() {
                Some(api) => {
                    let outcome = self.executor.call(api, &self.context, None).await;
                    self.route_after_api(graph, node, outcome, None)
                }
                None => Ok(self.follow(node, next_edge(graph, node))),
            },
            NodeKind::ApiCondition(data) => match node.api() {
                Some(api) => {
                    let outcome = self.executor.call(api, &self.context, None).await;
                    self.route_after_api(graph, node, outcome, Some(&data.condition))
                }
                None => {
                    let edge = select_branch(graph, node, &data.condition, &self.context)?;
                    Ok(Step::Goto(edge.target.clone()))
                }
            },
            NodeKind::End(_) => {
                self.current = None;
                Ok(Step::Done(ExecutionResult::Completed {
                    node_id: Some(node.id.clone()),
                }))
            }
        }
    }

    /// API 调用之后的路由
    ///
    /// 失败时走 `failure` 出边，没有则整个运行失败；成功时若节点带条件则按分支选择，
    /// 否则走 `success` 出边或第一条非 failure 出边。
    fn route_after_api(
        &mut self,
        graph: &FlowGraph,
        node: &Node,
        outcome: ApiCallOutcome,
        condition: Option<&ConditionSettings>,
    ) -> Result<Step> {
        self.context = self.context.merge(&outcome.context_patch);

        if !outcome.success {
            let message = outcome
                .error
                .unwrap_or_else(|| "api call failed".to_string());
            return match graph.outgoing_edges(&node.id).find(|e| e.is_failure()) {
                Some(edge) => {
                    warn!(node_id = %node.id, error = %message, target = %edge.target, "api call failed, taking failure edge");
                    Ok(Step::Goto(edge.target.clone()))
                }
                None => Err(FlowError::ApiCall {
                    node_id: node.id.clone(),
                    message,
                }),
            };
        }

        if let Some(condition) = condition.filter(|c| has_rules(c)) {
            match select_branch(graph, node, condition, &self.context) {
                Ok(edge) => return Ok(Step::Goto(edge.target.clone())),
                Err(FlowError::NoValidPath { .. }) => {
                    if let Some(edge) = graph
                        .outgoing_edges(&node.id)
                        .find(|e| e.matches(SUCCESS_HANDLE))
                    {
                        warn!(node_id = %node.id, "no branch matched, taking success edge");
                        return Ok(Step::Goto(edge.target.clone()));
                    }
                    return Err(FlowError::NoValidPath {
                        node_id: node.id.clone(),
                    });
                }
                Err(other) => return Err(other),
            }
        }

        Ok(self.follow(node, next_edge(graph, node)))
    }

    /// 沿出边前进；没有出边时运行结束
    fn follow(&mut self, node: &Node, edge: Option<&Edge>) -> Step {
        match edge {
            Some(edge) => Step::Goto(edge.target.clone()),
            None => {
                debug!(node_id = %node.id, "no outgoing edge, flow completes");
                self.current = None;
                Step::Done(ExecutionResult::Completed {
                    node_id: Some(node.id.clone()),
                })
            }
        }
    }

    fn navigation_url(&self, node: &Node) -> String {
        match node.page_path() {
            Some(path) => path.to_string(),
            None => format!("/flow/{}/{}", self.flow_id, node.id),
        }
    }

    fn settle(&mut self, result: Result<ExecutionResult>) -> Result<ExecutionResult> {
        match &result {
            Ok(ExecutionResult::Completed { node_id }) => {
                self.state = RunState::Completed;
                self.current = None;
                info!(last_node = ?node_id, steps = self.history.len(), "flow completed");
            }
            Ok(ExecutionResult::Navigate { node_id, .. }) => {
                self.state = RunState::Running;
                debug!(node_id = %node_id, "flow paused on page");
            }
            Err(FlowError::NoCurrentNode) => {}
            Err(err) => {
                self.state = RunState::Failed;
                error!(error = %err, node_id = ?self.current, "flow failed");
            }
        }
        result
    }
}

fn has_rules(condition: &ConditionSettings) -> bool {
    !condition.effective_branches().is_empty() || condition.default_label().is_some()
}

/// 非分支推进使用的出边：优先 `success`，否则第一条非 `failure` 出边
fn next_edge<'g>(graph: &'g FlowGraph, node: &Node) -> Option<&'g Edge> {
    graph
        .outgoing_edges(&node.id)
        .find(|e| e.matches(SUCCESS_HANDLE))
        .or_else(|| graph.outgoing_edges(&node.id).find(|e| !e.is_failure()))
}

/// 按声明顺序求值分支，第一个为真且有对应出边的分支胜出；都不满足时走默认标签
fn select_branch<'g>(
    graph: &'g FlowGraph,
    node: &Node,
    condition: &ConditionSettings,
    context: &FlowContext,
) -> Result<&'g Edge> {
    for branch in condition.effective_branches().iter() {
        if !expression::evaluate(&branch.expression, context)? {
            continue;
        }
        match graph
            .outgoing_edges(&node.id)
            .find(|e| e.matches(&branch.label))
        {
            Some(edge) => {
                debug!(node_id = %node.id, branch = %branch.label, target = %edge.target, "branch selected");
                return Ok(edge);
            }
            None => {
                warn!(node_id = %node.id, branch = %branch.label, "branch matched but has no edge");
            }
        }
    }

    if let Some(default) = condition.default_label() {
        if let Some(edge) = graph.outgoing_edges(&node.id).find(|e| e.matches(default)) {
            debug!(node_id = %node.id, branch = %default, target = %edge.target, "default branch selected");
            return Ok(edge);
        }
    }

    Err(FlowError::NoValidPath {
        node_id: node.id.clone(),
    })
}
