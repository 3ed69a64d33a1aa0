use flowpilot::validation::checks;
use flowpilot::{validate, FlowDocument, Severity, ValidationResult};
use serde_json::{json, Value};

fn document(value: Value) -> FlowDocument {
    FlowDocument::from_value(value).expect("valid document shape")
}

fn linear_flow() -> Value {
    json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {"label": "Start"}},
            {"id": "name", "type": "page", "data": {"label": "Name", "pageRef": "p-name"}},
            {"id": "check", "type": "condition", "data": {
                "label": "Check",
                "branches": [{"label": "GT10", "expression": "context.value > 10"}],
                "defaultBranchLabel": "Default"
            }},
            {"id": "big", "type": "page", "data": {"label": "Big", "pageRef": "p-big"}},
            {"id": "end", "type": "end", "data": {"label": "End"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "name"},
            {"id": "e2", "source": "name", "target": "check"},
            {"id": "e3", "source": "check", "target": "big", "sourceHandle": "GT10"},
            {"id": "e4", "source": "check", "target": "end", "sourceHandle": "Default"},
            {"id": "e5", "source": "big", "target": "end"}
        ]
    })
}

#[test]
fn well_formed_flow_is_valid_without_findings() {
    let result = validate(&document(linear_flow()));
    assert!(result.is_valid, "{:?}", result.errors);
    assert!(result.errors.is_empty());
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
}

#[test]
fn validation_is_pure() {
    let doc = document(linear_flow());
    assert_eq!(validate(&doc), validate(&doc));
}

#[test]
fn empty_flow_is_an_error() {
    let result = validate(&document(json!({"nodes": [], "edges": []})));
    assert!(!result.is_valid);
    assert!(result.has_error(checks::EMPTY_FLOW));
}

#[test]
fn missing_start_is_an_error() {
    let mut flow = linear_flow();
    flow["nodes"][0]["type"] = json!("page");
    flow["nodes"][0]["data"]["pageRef"] = json!("p-start");
    let result = validate(&document(flow));
    assert!(!result.is_valid);
    assert!(result.has_error(checks::NO_START));
}

#[test]
fn multiple_starts_are_an_error() {
    let mut flow = linear_flow();
    flow["nodes"]
        .as_array_mut()
        .unwrap()
        .push(json!({"id": "start2", "type": "start", "data": {"label": "Again"}}));
    flow["edges"]
        .as_array_mut()
        .unwrap()
        .push(json!({"id": "e6", "source": "start2", "target": "name"}));
    let result = validate(&document(flow));
    assert!(!result.is_valid);
    assert!(result.has_error(checks::MULTIPLE_STARTS));
}

#[test]
fn orphaned_node_is_only_a_warning() {
    let mut flow = linear_flow();
    flow["nodes"]
        .as_array_mut()
        .unwrap()
        .push(json!({"id": "lonely", "type": "page", "data": {"label": "Lonely", "pageRef": "p"}}));
    let result = validate(&document(flow));
    assert!(result.is_valid);
    assert!(result.has_warning("orphaned-lonely"));
    assert!(!result.has_warning("unreachable-lonely"));
    let issue = result.warnings.iter().find(|w| w.id == "orphaned-lonely").unwrap();
    assert_eq!(issue.severity, Severity::Warning);
    assert_eq!(issue.node_id.as_deref(), Some("lonely"));
}

#[test]
fn unreachable_island_is_a_warning() {
    let mut flow = linear_flow();
    let nodes = flow["nodes"].as_array_mut().unwrap();
    nodes.push(json!({"id": "a", "type": "page", "data": {"label": "A", "pageRef": "p"}}));
    nodes.push(json!({"id": "b", "type": "page", "data": {"label": "B", "pageRef": "p"}}));
    flow["edges"]
        .as_array_mut()
        .unwrap()
        .push(json!({"id": "ab", "source": "a", "target": "b"}));
    let result = validate(&document(flow));
    assert!(result.is_valid);
    assert!(result.has_warning("unreachable-a"));
    assert!(result.has_warning("unreachable-b"));
}

#[test]
fn missing_end_and_labels_are_warnings() {
    let result = validate(&document(json!({
        "nodes": [
            {"id": "s", "type": "start"},
            {"id": "p", "type": "page", "data": {"pageRef": "x"}}
        ],
        "edges": [{"id": "e", "source": "s", "target": "p"}]
    })));
    assert!(result.is_valid);
    assert!(result.has_warning(checks::NO_END));
    assert!(result.has_warning("missing-label-s"));
    assert!(result.has_warning("missing-label-p"));
}

#[test]
fn page_without_ref_is_an_error() {
    let mut flow = linear_flow();
    flow["nodes"][1]["data"]
        .as_object_mut()
        .unwrap()
        .remove("pageRef");
    let result = validate(&document(flow));
    assert!(!result.is_valid);
    assert!(result.has_error("page-missing-ref-name"));
}

#[test]
fn condition_without_rules_is_an_error() {
    let mut flow = linear_flow();
    flow["nodes"][2]["data"] = json!({"label": "Check", "branches": [{"label": "x", "expression": "  "}]});
    let result = validate(&document(flow));
    assert!(result.has_error("condition-no-branches-check"));
}

#[test]
fn invalid_branch_expression_is_an_error() {
    let mut flow = linear_flow();
    flow["nodes"][2]["data"]["branches"][0]["expression"] = json!("context.value >");
    let result = validate(&document(flow));
    assert!(!result.is_valid);
    assert!(result.has_error("invalid-expression-check-0"));
}

#[test]
fn unlabelled_branch_is_a_warning() {
    let mut flow = linear_flow();
    flow["nodes"][2]["data"]["branches"]
        .as_array_mut()
        .unwrap()
        .push(json!({"label": "", "expression": "context.value < 0"}));
    let result = validate(&document(flow));
    assert!(result.has_warning("branch-missing-label-check-1"));
}

#[test]
fn edge_not_matching_a_branch_is_a_warning() {
    let mut flow = linear_flow();
    flow["edges"][2]["sourceHandle"] = json!("gt10");
    let result = validate(&document(flow));
    assert!(result.has_warning("ambiguous-edge-e3"));
}

#[test]
fn enabled_api_requires_method_and_url() {
    let result = validate(&document(json!({
        "nodes": [
            {"id": "s", "type": "start", "data": {"label": "S"}},
            {"id": "call", "type": "api", "data": {"label": "Call"}},
            {"id": "end", "type": "end", "data": {"label": "E"}}
        ],
        "edges": [
            {"id": "e1", "source": "s", "target": "call"},
            {"id": "e2", "source": "call", "target": "end"}
        ]
    })));
    assert!(result.has_error("api-missing-method-call"));
    assert!(result.has_error("api-missing-url-call"));
}

#[test]
fn blank_method_in_draft_is_reported_not_rejected() {
    let doc = FlowDocument::from_value(json!({
        "nodes": [
            {"id": "s", "type": "start", "data": {"label": "S"}},
            {"id": "draft", "type": "api", "data": {"label": "Draft", "method": "", "url": ""}},
            {"id": "end", "type": "end", "data": {"label": "E"}}
        ],
        "edges": [
            {"id": "e1", "source": "s", "target": "draft"},
            {"id": "e2", "source": "draft", "target": "end"}
        ]
    }))
    .expect("blank method still parses");
    let result = validate(&doc);
    assert!(!result.is_valid);
    assert!(result.has_error("api-missing-method-draft"));
    assert!(result.has_error("api-missing-url-draft"));
}

#[test]
fn unknown_method_is_still_a_parse_error() {
    let parsed = FlowDocument::from_value(json!({
        "nodes": [{"id": "a", "type": "api", "data": {"method": "FETCH", "url": "https://a"}}],
        "edges": []
    }));
    assert!(parsed.is_err());
}

#[test]
fn dangling_and_duplicate_references_are_errors() {
    let mut flow = linear_flow();
    let edges = flow["edges"].as_array_mut().unwrap();
    edges.push(json!({"id": "e1", "source": "ghost", "target": "nowhere"}));
    let result = validate(&document(flow));
    assert!(result.has_error("duplicate-edge-e1"));
    assert!(result.has_error("edge-missing-source-e1"));
    assert!(result.has_error("edge-missing-target-e1"));
}

#[test]
fn start_must_have_one_outgoing_edge() {
    let mut flow = linear_flow();
    flow["edges"]
        .as_array_mut()
        .unwrap()
        .push(json!({"id": "e6", "source": "start", "target": "end"}));
    let result = validate(&document(flow));
    assert!(result.has_error("start-edges-start"));
}

#[test]
fn result_serializes_in_editor_shape() -> anyhow::Result<()> {
    let result = validate(&document(json!({"nodes": [], "edges": []})));
    let value = serde_json::to_value(&result)?;
    assert_eq!(value["isValid"], json!(false));
    assert_eq!(value["errors"][0]["type"], json!("error"));
    assert_eq!(value["errors"][0]["id"], json!("empty-flow"));
    let back: ValidationResult = serde_json::from_value(value)?;
    assert_eq!(back, result);
    Ok(())
}
