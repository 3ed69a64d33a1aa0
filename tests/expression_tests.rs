use flowpilot::expression::{check, evaluate, Expression, MAX_CLAUSES, MAX_NESTING};
use flowpilot::FlowContext;
use serde_json::json;

fn context() -> FlowContext {
    FlowContext::new()
        .with("value", 15)
        .with("age", "21")
        .with("user.name", "Ana Lima")
        .with("user.email", "ana@example.com")
        .with("flags", json!({"beta": true, "tier": "gold"}))
        .with("tags", json!(["vip", "early"]))
        .with("subscribed", true)
        .with("empty", "")
}

fn eval(expression: &str) -> bool {
    evaluate(expression, &context()).unwrap()
}

#[test]
fn blank_expression_is_true() {
    assert!(eval(""));
    assert!(eval("   "));
}

#[test]
fn numeric_comparisons() {
    assert!(eval("context.value > 10"));
    assert!(eval("value >= 15"));
    assert!(!eval("context.value < 15"));
    assert!(eval("context.value <= 15.0"));
    assert!(eval("context.age >= 18"));
    assert!(!eval("context.value > -3 AND context.value > 100"));
}

#[test]
fn loose_equality() {
    assert!(eval("context.value == '15'"));
    assert!(eval("context.subscribed == 'true'"));
    assert!(eval("context.subscribed === true"));
    assert!(eval("context.user.name != \"Bea\""));
    assert!(!eval("context.user.name !== 'Ana Lima'"));
}

#[test]
fn nested_paths_are_traversed() {
    assert!(eval("context.flags.beta == true"));
    assert!(eval("context.flags.tier == 'gold'"));
    assert!(eval("context.tags.0 == 'vip'"));
}

#[test]
fn undefined_paths_only_satisfy_not_equal() {
    assert!(!eval("context.missing == 'x'"));
    assert!(!eval("context.missing > 1"));
    assert!(!eval("context.missing < 1"));
    assert!(!eval("context.missing includes 'a'"));
    assert!(eval("context.missing != 'x'"));
    assert!(!eval("context.missing"));
}

#[test]
fn string_predicates_infix_and_method_forms() {
    assert!(eval("context.user.email endsWith '@example.com'"));
    assert!(eval("context.user.name startsWith 'Ana'"));
    assert!(eval("context.user.name includes 'Lim'"));
    assert!(eval("context.user.email.endsWith(\"example.com\")"));
    assert!(eval("context.user.name.includes('na L')"));
    assert!(!eval("context.user.name.startsWith('Bea')"));
    assert!(eval("context.tags.includes('early')"));
}

#[test]
fn logic_combines_left_to_right() {
    // (false AND true) OR true
    assert!(eval("context.value < 0 AND context.value > 0 OR context.subscribed"));
    // (true OR false) AND false
    assert!(!eval("context.subscribed OR context.value < 0 AND context.value < 0"));
    assert!(eval("context.subscribed && context.value > 1"));
    assert!(eval("context.value < 0 || context.subscribed"));
    assert!(eval("context.value < 0 or context.subscribed and context.value > 1"));
}

#[test]
fn parentheses_group() {
    assert!(!eval("context.value < 0 AND (context.value > 0 OR context.subscribed)"));
    assert!(eval("(context.value > 0 AND context.value < 20) OR context.value == 100"));
}

#[test]
fn bare_operands_use_truthiness() {
    assert!(eval("context.subscribed"));
    assert!(!eval("context.empty"));
    assert!(eval("true"));
    assert!(!eval("null"));
}

#[test]
fn malformed_expressions_are_rejected() {
    for source in [
        "context.value >",
        "(context.value > 1",
        "context.value > 1)",
        "context.value > 1 AND",
        "alert('x')",
        "context.value = 1",
        "context.value > 1; drop()",
    ] {
        assert!(check(source).is_err(), "expected `{}` to be rejected", source);
        assert!(evaluate(source, &context()).is_err());
    }
}

#[test]
fn error_reports_position() {
    let err = check("context.value > > 1").unwrap_err();
    assert_eq!(err.position, 16);
    assert_eq!(err.expression, "context.value > > 1");
}

#[test]
fn parse_is_pure_and_reusable() {
    let parsed = Expression::parse("context.value > 10").unwrap().unwrap();
    let low = FlowContext::new().with("value", 3);
    assert!(parsed.evaluate(&context()));
    assert!(!parsed.evaluate(&low));
    assert!(Expression::parse("  ").unwrap().is_none());
}

#[test]
fn deeply_nested_parentheses_are_rejected() {
    let deep = format!("{}a{}", "(".repeat(20_000), ")".repeat(20_000));
    let err = check(&deep).unwrap_err();
    assert!(err.message.contains("nested"));
    assert_eq!(err.position, MAX_NESTING);

    let at_limit = format!(
        "{}context.value > 10{}",
        "(".repeat(MAX_NESTING),
        ")".repeat(MAX_NESTING)
    );
    assert!(evaluate(&at_limit, &context()).unwrap());
    let over = format!("({})", at_limit);
    assert!(check(&over).is_err());
}

#[test]
fn long_clause_chains_are_rejected() {
    let long = vec!["context.subscribed"; 50_000].join(" AND ");
    let err = evaluate(&long, &context()).unwrap_err();
    assert!(err.message.contains("clauses"));

    let at_limit = vec!["context.subscribed"; MAX_CLAUSES].join(" AND ");
    assert!(evaluate(&at_limit, &context()).unwrap());
}
