use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flowpilot::cli::{drive_flow, load_flow_file};
use flowpilot::utils::LoggingConfig;
use flowpilot::{validate, EngineConfig, FlowContext, FlowGraph, FlowRunner};

#[derive(Parser)]
#[command(name = "flowpilot", version, about = "Flow graph validator and runner", author)]
struct Cli {
    /// 引擎配置 JSON 文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 校验 Flow 文件，存在 error 时以非零状态退出
    Validate {
        file: PathBuf,
        /// 单行输出
        #[arg(long)]
        compact: bool,
    },
    /// 运行 Flow，依次提交 `--submit` 的表单数据
    Run {
        file: PathBuf,
        #[arg(long)]
        context: Option<String>,
        #[arg(long = "submit")]
        submissions: Vec<String>,
        #[arg(long)]
        flow_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    LoggingConfig::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Validate { file, compact } => handle_validate(file, compact),
        Command::Run {
            file,
            context,
            submissions,
            flow_id,
        } => handle_run(config, file, context, submissions, flow_id).await,
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let base = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config `{}`", path.display()))?;
            EngineConfig::from_json(&content)?
        }
        None => EngineConfig::default(),
    };
    Ok(base.overlay_env()?)
}

fn parse_context(raw: &str) -> anyhow::Result<FlowContext> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("invalid JSON `{}`", raw))?;
    Ok(FlowContext::try_from(value)?)
}

fn handle_validate(file: PathBuf, compact: bool) -> anyhow::Result<ExitCode> {
    let flow = load_flow_file(&file)?;
    let result = validate(&flow.graph);
    let content = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{content}");
    Ok(if result.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn handle_run(
    mut config: EngineConfig,
    file: PathBuf,
    context: Option<String>,
    submissions: Vec<String>,
    flow_id: Option<String>,
) -> anyhow::Result<ExitCode> {
    let flow = load_flow_file(&file)?;
    if let Some(flow_id) = flow_id {
        config.flow_id = flow_id;
    }

    let mut initial = flow.context.unwrap_or_default();
    if let Some(raw) = context {
        initial = initial.merge(&parse_context(&raw)?);
    }
    let forms = submissions
        .iter()
        .map(|raw| parse_context(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let graph = Arc::new(FlowGraph::new(flow.graph)?);
    let mut runner = FlowRunner::with_config(graph, &config).with_context(initial);

    match drive_flow(&mut runner, forms).await {
        Ok(transcript) => {
            for result in &transcript {
                println!("{}", serde_json::to_string(result)?);
            }
            println!("{}", serde_json::to_string_pretty(runner.context())?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("flow failed at {:?}: {}", runner.current_node_id(), err);
            Ok(ExitCode::FAILURE)
        }
    }
}
