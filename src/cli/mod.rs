use std::fs;
use std::path::Path;

use anyhow::anyhow;
use serde_json::Value;

use crate::error::{FlowError, Result};
use crate::graph::{FlowContext, FlowDocument};
use crate::runner::{ExecutionResult, FlowRunner};

/// 从文件读取的 Flow：图文档以及可选的初始上下文
#[derive(Debug, Clone)]
pub struct FlowFile {
    pub graph: FlowDocument,
    pub context: Option<FlowContext>,
}

/// 读取 Flow 文件
///
/// 支持裸图 `{nodes, edges}`，也支持存储格式 `{graph, context}`。
pub fn load_flow_file(path: &Path) -> Result<FlowFile> {
    let content = fs::read_to_string(path).map_err(|e| {
        FlowError::Other(anyhow!("failed to read `{}`: {}", path.display(), e))
    })?;
    parse_flow_file(&content)
}

pub fn parse_flow_file(content: &str) -> Result<FlowFile> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| FlowError::GraphIntegrity(format!("failed to parse flow file: {}", e)))?;

    match value {
        Value::Object(mut map) if map.contains_key("graph") => {
            let graph = map.remove("graph").unwrap_or(Value::Null);
            let context = match map.remove("context") {
                Some(ctx) if !ctx.is_null() => Some(FlowContext::try_from(ctx)?),
                _ => None,
            };
            Ok(FlowFile {
                graph: FlowDocument::from_value(graph)?,
                context,
            })
        }
        other => Ok(FlowFile {
            graph: FlowDocument::from_value(other)?,
            context: None,
        }),
    }
}

/// 启动 Flow，并依次把提交数据喂给停住的页面节点
///
/// 提交数据用完或运行结束时返回全部结果。
pub async fn drive_flow(
    runner: &mut FlowRunner,
    submissions: Vec<FlowContext>,
) -> Result<Vec<ExecutionResult>> {
    let mut transcript = Vec::new();
    let mut result = runner.start().await?;
    let mut pending = submissions.into_iter();

    loop {
        let paused = result.should_navigate();
        transcript.push(result);
        if !paused {
            break;
        }
        let Some(form) = pending.next() else {
            break;
        };
        result = runner.process_form_submission(form).await?;
    }
    Ok(transcript)
}
