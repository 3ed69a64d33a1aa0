use flowpilot::graph::{NodeKind, LEGACY_FALSE_LABEL, LEGACY_TRUE_LABEL};
use flowpilot::{Edge, FlowContext, FlowDocument, FlowError, FlowGraph, HttpMethod, NodeType};
use serde_json::json;

fn editor_document() -> serde_json::Value {
    json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {"label": "Start"}, "position": {"x": 0, "y": 0}},
            {"id": "form", "type": "page", "data": {
                "label": "Form",
                "pageRef": "page-1",
                "apiEnabled": true,
                "method": "post",
                "url": "https://api.test/users",
                "keyMapping": {"email": "context.user.email"},
                "responseMappings": [{"contextKey": "user.id", "responsePath": "data.id"}],
                "color": "blue"
            }},
            {"id": "check", "type": "condition", "data": {
                "label": "Check",
                "branches": [{"label": "Adult", "expression": "context.age >= 18"}],
                "defaultBranchLabel": "Minor"
            }},
            {"id": "legacy", "type": "condition", "data": {"conditions": "context.ok == true"}},
            {"id": "lookup", "type": "apiCondition", "data": {
                "method": "GET",
                "url": "https://api.test/lookup",
                "branches": [{"label": "found", "expression": "context.user.id != null"}]
            }},
            {"id": "end", "type": "end", "data": {"label": "Done"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "form"},
            {"id": "e2", "source": "form", "target": "check"},
            {"id": "e3", "source": "check", "target": "legacy", "sourceHandle": "Adult"},
            {"id": "e4", "source": "check", "target": "end", "data": {"label": "Minor"}, "animated": true},
            {"id": "e5", "source": "legacy", "target": "lookup", "sourceHandle": "true"},
            {"id": "e6", "source": "legacy", "target": "end", "sourceHandle": "false"},
            {"id": "e7", "source": "lookup", "target": "end", "sourceHandle": "found"},
            {"id": "e8", "source": "lookup", "target": "end", "sourceHandle": "failure"}
        ],
        "viewport": {"zoom": 1}
    })
}

#[test]
fn parses_editor_document_into_typed_nodes() -> anyhow::Result<()> {
    let graph = FlowGraph::from_value(editor_document())?;

    assert_eq!(graph.nodes().len(), 6);
    assert_eq!(graph.start_node()?.id, "start");

    let form = graph.get_node("form").unwrap();
    assert_eq!(form.node_type(), NodeType::Page);
    assert_eq!(form.page_ref(), Some("page-1"));
    let api = form.api().expect("page api enabled");
    assert_eq!(api.method, Some(HttpMethod::Post));
    assert_eq!(api.response_mappings[0].context_key, "user.id");
    match &form.kind {
        NodeKind::Page(data) => assert_eq!(data.extra.get("color"), Some(&json!("blue"))),
        other => panic!("unexpected kind {:?}", other),
    }

    let check = graph.get_node("check").unwrap();
    let condition = check.condition().unwrap();
    assert_eq!(condition.default_label(), Some("Minor"));
    assert_eq!(condition.declared_labels(), vec!["Adult", "Minor"]);

    let lookup = graph.get_node("lookup").unwrap();
    assert!(lookup.api().is_some());
    assert!(lookup.page_ref().is_none());
    Ok(())
}

#[test]
fn legacy_condition_string_becomes_true_false_branches() -> anyhow::Result<()> {
    let graph = FlowGraph::from_value(editor_document())?;
    let legacy = graph.get_node("legacy").unwrap().condition().unwrap();

    let branches = legacy.effective_branches();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].label, LEGACY_TRUE_LABEL);
    assert_eq!(branches[0].expression, "context.ok == true");
    assert_eq!(legacy.default_label(), Some(LEGACY_FALSE_LABEL));
    Ok(())
}

#[test]
fn page_api_is_disabled_unless_enabled() -> anyhow::Result<()> {
    let graph = FlowGraph::from_value(json!({
        "nodes": [
            {"id": "p", "type": "page", "data": {"pageRef": "x", "method": "POST", "url": "https://a"}},
            {"id": "a", "type": "api", "data": {"method": "POST", "url": "https://a"}},
            {"id": "off", "type": "api", "data": {"apiEnabled": false, "method": "POST", "url": "https://a"}}
        ],
        "edges": []
    }))?;
    assert!(graph.get_node("p").unwrap().api().is_none());
    assert!(graph.get_node("a").unwrap().api().is_some());
    assert!(graph.get_node("off").unwrap().api().is_none());
    Ok(())
}

#[test]
fn outgoing_edges_keep_declaration_order() -> anyhow::Result<()> {
    let graph = FlowGraph::from_value(editor_document())?;
    let ids: Vec<&str> = graph.outgoing_edges("lookup").map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e7", "e8"]);
    let incoming: Vec<&str> = graph.incoming_edges("end").map(|e| e.id.as_str()).collect();
    assert_eq!(incoming, vec!["e4", "e6", "e7", "e8"]);
    assert_eq!(graph.outgoing_edges("end").count(), 0);
    assert_eq!(graph.outgoing_edges("nope").count(), 0);
    Ok(())
}

#[test]
fn edge_matching_uses_label_or_source_handle() -> anyhow::Result<()> {
    let graph = FlowGraph::from_value(editor_document())?;
    let by_handle = graph.outgoing_edges("check").find(|e| e.matches("Adult"));
    let by_label = graph.outgoing_edges("check").find(|e| e.matches("Minor"));
    assert_eq!(by_handle.map(|e| e.id.as_str()), Some("e3"));
    assert_eq!(by_label.map(|e| e.id.as_str()), Some("e4"));
    assert!(graph.outgoing_edges("check").all(|e| !e.matches("adult")));
    assert!(graph.outgoing_edges("lookup").any(Edge::is_failure));
    Ok(())
}

#[test]
fn document_round_trips_unknown_fields() -> anyhow::Result<()> {
    let document = FlowDocument::from_value(editor_document())?;
    let json = document.to_json()?;
    let reparsed = FlowDocument::from_json(&json)?;
    assert_eq!(document, reparsed);

    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(value["viewport"], json!({"zoom": 1}));
    assert_eq!(value["nodes"][0]["position"], json!({"x": 0, "y": 0}));
    assert_eq!(value["nodes"][1]["data"]["color"], json!("blue"));
    assert_eq!(value["edges"][3]["animated"], json!(true));
    Ok(())
}

#[test]
fn rejects_duplicate_ids_and_dangling_edges() {
    let duplicate_node = json!({
        "nodes": [{"id": "a", "type": "start"}, {"id": "a", "type": "end"}],
        "edges": []
    });
    assert!(matches!(
        FlowGraph::from_value(duplicate_node),
        Err(FlowError::GraphIntegrity(_))
    ));

    let duplicate_edge = json!({
        "nodes": [{"id": "a", "type": "start"}, {"id": "b", "type": "end"}],
        "edges": [{"id": "e", "source": "a", "target": "b"}, {"id": "e", "source": "a", "target": "b"}]
    });
    assert!(matches!(
        FlowGraph::from_value(duplicate_edge),
        Err(FlowError::GraphIntegrity(_))
    ));

    let dangling = json!({
        "nodes": [{"id": "a", "type": "start"}],
        "edges": [{"id": "e", "source": "a", "target": "ghost"}]
    });
    let err = FlowGraph::from_value(dangling).unwrap_err();
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn unknown_node_type_is_rejected() {
    let result = FlowDocument::from_value(json!({
        "nodes": [{"id": "x", "type": "webhook", "data": {}}],
        "edges": []
    }));
    assert!(result.is_err());
}

#[test]
fn start_node_requires_exactly_one() -> anyhow::Result<()> {
    let none = FlowGraph::from_value(json!({"nodes": [{"id": "e", "type": "end"}], "edges": []}))?;
    assert!(matches!(none.start_node(), Err(FlowError::NoStartNode { found: 0 })));

    let two = FlowGraph::from_value(json!({
        "nodes": [{"id": "s1", "type": "start"}, {"id": "s2", "type": "start"}],
        "edges": []
    }))?;
    assert!(matches!(two.start_node(), Err(FlowError::NoStartNode { found: 2 })));
    Ok(())
}

#[test]
fn context_lookup_accepts_prefix_and_nested_values() {
    let context = FlowContext::new()
        .with("user.email", "ana@example.com")
        .with("profile", json!({"address": {"city": "Lisbon"}}));

    assert_eq!(context.lookup("user.email"), Some(&json!("ana@example.com")));
    assert_eq!(context.lookup("context.user.email"), Some(&json!("ana@example.com")));
    assert_eq!(context.lookup("context.profile.address.city"), Some(&json!("Lisbon")));
    assert_eq!(context.lookup("profile.address.zip"), None);
}
