use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::expression;
use crate::graph::{FlowDocument, FlowGraph, Node, NodeType, FAILURE_HANDLE, SUCCESS_HANDLE};

use super::result::{checks, Severity, ValidationIssue, ValidationResult};

fn scoped(check: &str, id: &str) -> String {
    format!("{}-{}", check, id)
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn error(&mut self, id: impl Into<String>, message: impl Into<String>) -> &mut ValidationIssue {
        self.push(id.into(), Severity::Error, message.into())
    }

    fn warning(&mut self, id: impl Into<String>, message: impl Into<String>) -> &mut ValidationIssue {
        self.push(id.into(), Severity::Warning, message.into())
    }

    fn push(&mut self, id: String, severity: Severity, message: String) -> &mut ValidationIssue {
        self.0.push(ValidationIssue::new(id, severity, message));
        let last = self.0.len() - 1;
        &mut self.0[last]
    }
}

/// 静态校验 Flow 文档
///
/// 纯函数，可在编辑时反复调用；error 阻止发布，warning 仅作提示。
pub fn validate(document: &FlowDocument) -> ValidationResult {
    let mut issues = Issues::default();

    if document.nodes.is_empty() {
        issues.error(checks::EMPTY_FLOW, "Flow has no nodes");
        return ValidationResult::from_issues(issues.0);
    }

    let nodes = index_nodes(document, &mut issues);
    check_duplicate_edges(document, &mut issues);
    check_start_and_end(document, &mut issues);
    for node in &document.nodes {
        check_node_fields(node, &mut issues);
    }
    check_edges(document, &nodes, &mut issues);
    check_connectivity(document, &nodes, &mut issues);

    let result = ValidationResult::from_issues(issues.0);
    debug!(
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "flow validated"
    );
    result
}

pub fn validate_graph(graph: &FlowGraph) -> ValidationResult {
    validate(graph.document())
}

fn index_nodes<'a>(document: &'a FlowDocument, issues: &mut Issues) -> HashMap<&'a str, &'a Node> {
    let mut nodes = HashMap::with_capacity(document.nodes.len());
    for node in &document.nodes {
        if nodes.insert(node.id.as_str(), node).is_some() {
            issues
                .error(
                    scoped(checks::DUPLICATE_NODE, &node.id),
                    format!("Node id `{}` is used more than once", node.id),
                )
                .node_id = Some(node.id.clone());
        }
    }
    nodes
}

fn check_duplicate_edges(document: &FlowDocument, issues: &mut Issues) {
    let mut seen = HashSet::new();
    for edge in &document.edges {
        if !seen.insert(edge.id.as_str()) {
            issues
                .error(
                    scoped(checks::DUPLICATE_EDGE, &edge.id),
                    format!("Edge id `{}` is used more than once", edge.id),
                )
                .edge_id = Some(edge.id.clone());
        }
    }
}

fn check_start_and_end(document: &FlowDocument, issues: &mut Issues) {
    let starts: Vec<&Node> = document
        .nodes
        .iter()
        .filter(|n| n.node_type() == NodeType::Start)
        .collect();
    match starts.len() {
        0 => {
            issues.error(checks::NO_START, "Flow must have a start node");
        }
        1 => {}
        count => {
            let ids: Vec<&str> = starts.iter().map(|n| n.id.as_str()).collect();
            issues.error(
                checks::MULTIPLE_STARTS,
                format!(
                    "Flow must have exactly one start node, found {} ({})",
                    count,
                    ids.join(", ")
                ),
            );
        }
    }

    for start in &starts {
        let outgoing = document
            .edges
            .iter()
            .filter(|e| e.source == start.id)
            .count();
        if outgoing != 1 {
            issues
                .error(
                    scoped(checks::START_EDGES, &start.id),
                    format!(
                        "Start node `{}` must have exactly one outgoing edge, found {}",
                        start.id, outgoing
                    ),
                )
                .node_id = Some(start.id.clone());
        }
    }

    if !document.nodes.iter().any(|n| n.node_type() == NodeType::End) {
        issues.warning(checks::NO_END, "Flow has no end node");
    }
}

fn check_node_fields(node: &Node, issues: &mut Issues) {
    let id = node.id.as_str();

    if node.label().is_none() {
        issues
            .warning(
                scoped(checks::MISSING_LABEL, id),
                format!("Node `{}` has no label", id),
            )
            .node_id = Some(id.to_string());
    }

    if node.node_type() == NodeType::Page && node.page_ref().is_none() {
        issues
            .error(
                scoped(checks::PAGE_MISSING_REF, id),
                format!("Page node `{}` has no page selected", id),
            )
            .node_id = Some(id.to_string());
    }

    if let Some(condition) = node.condition() {
        let branches = condition.effective_branches();
        let has_expression = branches.iter().any(|b| !b.expression.trim().is_empty());
        if !has_expression && condition.default_label().is_none() {
            issues
                .error(
                    scoped(checks::CONDITION_NO_BRANCHES, id),
                    format!(
                        "Condition node `{}` needs a branch with an expression or a default branch",
                        id
                    ),
                )
                .node_id = Some(id.to_string());
        }

        for (index, branch) in branches.iter().enumerate() {
            let branch_id = format!("{}-{}", id, index);
            if branch.label.trim().is_empty() {
                issues
                    .warning(
                        scoped(checks::BRANCH_MISSING_LABEL, &branch_id),
                        format!("Branch {} of node `{}` has no label", index, id),
                    )
                    .node_id = Some(id.to_string());
            }
            if let Err(err) = expression::check(&branch.expression) {
                issues
                    .error(
                        scoped(checks::INVALID_EXPRESSION, &branch_id),
                        format!(
                            "Branch `{}` of node `{}` has an invalid expression: {}",
                            branch.label, id, err.message
                        ),
                    )
                    .node_id = Some(id.to_string());
            }
        }
    }

    if let Some(api) = node.api() {
        if api.method.is_none() {
            issues
                .error(
                    scoped(checks::API_MISSING_METHOD, id),
                    format!("Node `{}` has an API call without a method", id),
                )
                .node_id = Some(id.to_string());
        }
        if api.url.as_deref().map(|u| u.trim().is_empty()).unwrap_or(true) {
            issues
                .error(
                    scoped(checks::API_MISSING_URL, id),
                    format!("Node `{}` has an API call without a URL", id),
                )
                .node_id = Some(id.to_string());
        }
    }
}

fn check_edges(document: &FlowDocument, nodes: &HashMap<&str, &Node>, issues: &mut Issues) {
    for edge in &document.edges {
        if !nodes.contains_key(edge.source.as_str()) {
            issues
                .error(
                    scoped(checks::EDGE_MISSING_SOURCE, &edge.id),
                    format!(
                        "Edge `{}` starts at unknown node `{}`",
                        edge.id, edge.source
                    ),
                )
                .edge_id = Some(edge.id.clone());
        }
        if !nodes.contains_key(edge.target.as_str()) {
            issues
                .error(
                    scoped(checks::EDGE_MISSING_TARGET, &edge.id),
                    format!(
                        "Edge `{}` points to unknown node `{}`",
                        edge.id, edge.target
                    ),
                )
                .edge_id = Some(edge.id.clone());
        }

        let Some(source) = nodes.get(edge.source.as_str()) else {
            continue;
        };
        let Some(condition) = source.condition() else {
            continue;
        };
        let mut allowed = condition.declared_labels();
        if source.api().is_some() {
            allowed.push(SUCCESS_HANDLE.to_string());
            allowed.push(FAILURE_HANDLE.to_string());
        }
        if !allowed.iter().any(|label| edge.matches(label)) {
            let issue = issues.warning(
                scoped(checks::AMBIGUOUS_EDGE, &edge.id),
                format!(
                    "Edge `{}` leaving condition node `{}` does not match any branch label",
                    edge.id, source.id
                ),
            );
            issue.node_id = Some(source.id.clone());
            issue.edge_id = Some(edge.id.clone());
        }
    }
}

fn check_connectivity(document: &FlowDocument, nodes: &HashMap<&str, &Node>, issues: &mut Issues) {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_incoming: HashSet<&str> = HashSet::new();
    for edge in &document.edges {
        if nodes.contains_key(edge.source.as_str()) && nodes.contains_key(edge.target.as_str()) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
            has_incoming.insert(edge.target.as_str());
        }
    }

    let mut orphaned: HashSet<&str> = HashSet::new();
    for node in &document.nodes {
        let id = node.id.as_str();
        if node.node_type() == NodeType::Start {
            continue;
        }
        if !has_incoming.contains(id) && !adjacency.contains_key(id) && orphaned.insert(id) {
            issues
                .warning(
                    scoped(checks::ORPHANED, id),
                    format!("Node `{}` is not connected to any other node", id),
                )
                .node_id = Some(id.to_string());
        }
    }

    let starts: Vec<&Node> = document
        .nodes
        .iter()
        .filter(|n| n.node_type() == NodeType::Start)
        .collect();
    let [start] = starts.as_slice() else {
        return;
    };

    let mut reachable: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    reachable.insert(start.id.as_str());
    queue.push_back(start.id.as_str());
    while let Some(current) = queue.pop_front() {
        for &next in adjacency.get(current).into_iter().flatten() {
            if reachable.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let mut reported: HashSet<&str> = HashSet::new();
    for node in &document.nodes {
        let id = node.id.as_str();
        if reachable.contains(id) || orphaned.contains(id) || !reported.insert(id) {
            continue;
        }
        issues
            .warning(
                scoped(checks::UNREACHABLE, id),
                format!("Node `{}` cannot be reached from the start node", id),
            )
            .node_id = Some(id.to_string());
    }
}
