use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlowError, Result};

use super::edge::Edge;
use super::node::{Node, NodeType};

/// 编辑器产出的原始图文档 `{ nodes, edges }`
///
/// 不做完整性检查，校验器直接在这一层工作。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDocument {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowDocument {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            extra: Map::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FlowError::GraphIntegrity(format!("failed to parse graph JSON: {}", e)))
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| FlowError::GraphIntegrity(format!("failed to parse graph value: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| FlowError::Other(e.into()))
    }
}

/// 经过完整性检查的 Flow 图
#[derive(Debug, Clone)]
pub struct FlowGraph {
    document: FlowDocument,
    node_index: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl FlowGraph {
    /// 构建图；节点或边 ID 重复、边引用不存在的节点时返回 `GraphIntegrity`
    pub fn new(document: FlowDocument) -> Result<Self> {
        let mut node_index = HashMap::with_capacity(document.nodes.len());
        for (idx, node) in document.nodes.iter().enumerate() {
            if node_index.insert(node.id.clone(), idx).is_some() {
                return Err(FlowError::GraphIntegrity(format!(
                    "duplicate node id `{}`",
                    node.id
                )));
            }
        }

        let mut edge_ids = HashSet::with_capacity(document.edges.len());
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, edge) in document.edges.iter().enumerate() {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(FlowError::GraphIntegrity(format!(
                    "duplicate edge id `{}`",
                    edge.id
                )));
            }
            for endpoint in [&edge.source, &edge.target] {
                if !node_index.contains_key(endpoint) {
                    return Err(FlowError::GraphIntegrity(format!(
                        "edge `{}` references unknown node `{}`",
                        edge.id, endpoint
                    )));
                }
            }
            outgoing.entry(edge.source.clone()).or_default().push(idx);
            incoming.entry(edge.target.clone()).or_default().push(idx);
        }

        Ok(Self {
            document,
            node_index,
            outgoing,
            incoming,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(FlowDocument::from_json(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Self::new(FlowDocument::from_value(value)?)
    }

    pub fn document(&self) -> &FlowDocument {
        &self.document
    }

    pub fn nodes(&self) -> &[Node] {
        &self.document.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.document.edges
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&idx| &self.document.nodes[idx])
    }

    /// 按声明顺序返回出边
    pub fn outgoing_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.outgoing
            .get(node_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.document.edges[idx])
    }

    pub fn incoming_edges<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.incoming
            .get(node_id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.document.edges[idx])
    }

    pub fn find_nodes_by_type(&self, node_type: NodeType) -> Vec<&Node> {
        self.document
            .nodes
            .iter()
            .filter(|n| n.node_type() == node_type)
            .collect()
    }

    /// 唯一的 start 节点；数量不为 1 时返回 `NoStartNode`
    pub fn start_node(&self) -> Result<&Node> {
        let starts = self.find_nodes_by_type(NodeType::Start);
        match starts.as_slice() {
            [start] => Ok(start),
            _ => Err(FlowError::NoStartNode {
                found: starts.len(),
            }),
        }
    }

    pub fn into_document(self) -> FlowDocument {
        self.document
    }
}

impl TryFrom<FlowDocument> for FlowGraph {
    type Error = FlowError;

    fn try_from(document: FlowDocument) -> Result<Self> {
        Self::new(document)
    }
}
