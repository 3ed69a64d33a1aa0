use serde_json::{Map, Value};

use crate::graph::FlowContext;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

fn placeholder_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// 替换字符串中的 `{{context.path}}` 占位符，无法解析的占位符替换为空串
pub fn render_template(template: &str, context: &FlowContext) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        output.push_str(&rest[..start]);
        let path = after_open[..end].trim();
        output.push_str(&placeholder_text(context.lookup(path)));
        rest = &after_open[end + CLOSE.len()..];
    }
    output.push_str(rest);
    output
}

/// 整个字符串恰好是一个占位符时返回其路径
fn sole_placeholder(text: &str) -> Option<&str> {
    let inner = text.trim().strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains(OPEN) || inner.contains(CLOSE) {
        return None;
    }
    Some(inner.trim())
}

/// 递归渲染 JSON 模板
///
/// 字符串整体是单个占位符时保留原始 JSON 类型，否则按文本替换。
pub fn render_value(template: &Value, context: &FlowContext) -> Value {
    match template {
        Value::String(text) => match sole_placeholder(text) {
            Some(path) => match context.lookup(path) {
                Some(value) => value.clone(),
                None => Value::String(String::new()),
            },
            None => Value::String(render_template(text, context)),
        },
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, context)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> FlowContext {
        FlowContext::new()
            .with("user.id", 42)
            .with("user.name", "Ana")
            .with("tags", json!(["a", "b"]))
    }

    #[test]
    fn renders_placeholders_in_text() {
        assert_eq!(
            render_template("/users/{{context.user.id}}?n={{ user.name }}", &ctx()),
            "/users/42?n=Ana"
        );
    }

    #[test]
    fn unresolved_placeholders_become_empty() {
        assert_eq!(render_template("/x/{{context.missing}}/y", &ctx()), "/x//y");
    }

    #[test]
    fn unterminated_placeholder_is_left_alone() {
        assert_eq!(render_template("/x/{{user.id", &ctx()), "/x/{{user.id");
    }

    #[test]
    fn sole_placeholders_keep_json_type() {
        let rendered = render_value(
            &json!({"id": "{{context.user.id}}", "tags": "{{tags}}", "msg": "hi {{user.name}}"}),
            &ctx(),
        );
        assert_eq!(rendered, json!({"id": 42, "tags": ["a", "b"], "msg": "hi Ana"}));
    }
}
