use flowpilot::validation::checks;
use flowpilot::{
    publish_flow, FlowContext, FlowDocument, FlowError, FlowStatus, FlowStore, MemoryFlowStore,
    Principal, PublishOutcome,
};
use serde_json::json;

fn valid_document() -> FlowDocument {
    FlowDocument::from_value(json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {"label": "Start"}},
            {"id": "page", "type": "page", "data": {"label": "Page", "pageRef": "p"}},
            {"id": "end", "type": "end", "data": {"label": "End"}},
            {"id": "stray", "type": "page", "data": {"label": "Stray", "pageRef": "s"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "page"},
            {"id": "e2", "source": "page", "target": "end"}
        ]
    }))
    .expect("document")
}

fn invalid_document() -> FlowDocument {
    FlowDocument::from_value(json!({
        "nodes": [{"id": "page", "type": "page", "data": {"label": "Page", "pageRef": "p"}}],
        "edges": []
    }))
    .expect("document")
}

#[tokio::test]
async fn valid_flow_is_approved_with_warnings() -> anyhow::Result<()> {
    let store = MemoryFlowStore::new();
    let owner = Principal::new("owner-1");
    store
        .save("signup", valid_document(), Some(FlowContext::new().with("plan", "free")), &owner)
        .await?;

    let outcome = publish_flow(&store, "signup", &owner).await?;
    assert!(outcome.is_published());
    assert!(outcome.validation().has_warning("orphaned-stray"));

    let stored = store.get("signup", &owner).await?.expect("stored flow");
    assert_eq!(stored.status, FlowStatus::Approved);
    assert_eq!(stored.context.unwrap().get("plan"), Some(&json!("free")));
    Ok(())
}

#[tokio::test]
async fn invalid_flow_stays_draft() -> anyhow::Result<()> {
    let store = MemoryFlowStore::new();
    let owner = Principal::new("owner-1");
    store.save("broken", invalid_document(), None, &owner).await?;

    let outcome = publish_flow(&store, "broken", &owner).await?;
    match &outcome {
        PublishOutcome::Rejected(result) => assert!(result.has_error(checks::NO_START)),
        PublishOutcome::Published(_) => panic!("invalid flow must not publish"),
    }
    let stored = store.get("broken", &owner).await?.expect("stored flow");
    assert_eq!(stored.status, FlowStatus::Draft);
    Ok(())
}

#[tokio::test]
async fn resaving_keeps_status() -> anyhow::Result<()> {
    let store = MemoryFlowStore::new();
    let owner = Principal::new("owner-1");
    store.save("signup", valid_document(), None, &owner).await?;
    publish_flow(&store, "signup", &owner).await?;
    store.save("signup", valid_document(), None, &owner).await?;
    let stored = store.get("signup", &owner).await?.expect("stored flow");
    assert_eq!(stored.status, FlowStatus::Approved);
    Ok(())
}

#[tokio::test]
async fn publishing_unknown_flow_is_a_store_error() {
    let store = MemoryFlowStore::new();
    let err = publish_flow(&store, "missing", &Principal::new("p"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Store(_)));
}

#[tokio::test]
async fn status_update_on_unknown_flow_returns_false() -> anyhow::Result<()> {
    let store = MemoryFlowStore::new();
    let updated = store
        .set_status("missing", FlowStatus::Archived, &Principal::new("p"))
        .await?;
    assert!(!updated);
    Ok(())
}
