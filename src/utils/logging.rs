use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EnvConfig;

const DEFAULT_FILTER: &str = "flowpilot=info,warn";
const DEBUG_FILTER: &str = "flowpilot=debug,info";

/// 日志配置
pub struct LoggingConfig;

impl LoggingConfig {
    /// 初始化日志系统
    ///
    /// 支持通过环境变量配置：
    /// - RUST_LOG: 设置日志级别（error, warn, info, debug, trace）
    /// - FLOWPILOT_DEBUG: 启用详细调试输出
    ///
    /// 重复调用不会 panic，第二次起直接忽略。
    ///
    /// ```no_run
    /// use flowpilot::utils::LoggingConfig;
    ///
    /// LoggingConfig::init();
    /// tracing::info!("ready");
    /// ```
    pub fn init() {
        let is_debug = Self::is_debug();

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Self::default_filter(is_debug)));

        let fmt_layer = fmt::layer()
            .with_target(is_debug)
            .with_file(is_debug)
            .with_line_number(is_debug)
            .with_thread_ids(is_debug);

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if installed && is_debug {
            tracing::debug!("debug logging enabled");
        }
    }

    /// 初始化日志系统（带自定义过滤器）
    pub fn init_with_filter(filter: &str) {
        tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer())
            .try_init()
            .ok();
    }

    /// 检查是否启用调试模式
    pub fn is_debug() -> bool {
        EnvConfig::is_debug_mode()
    }

    fn default_filter(is_debug: bool) -> &'static str {
        if is_debug {
            DEBUG_FILTER
        } else {
            DEFAULT_FILTER
        }
    }
}
