//! 日志与指标
//!
//! 二进制入口调用一次 [`init`]；库代码只使用 `tracing` 宏和 [`metrics`] 中的记录函数。

pub mod logging;
pub mod metrics;

use serde::Deserialize;
use tracing::info;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// 日志与指标配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// EnvFilter 语法，如 "info" 或 "rule_engine=debug,info"
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// 持有期间日志保持可用，释放时输出关闭日志
#[derive(Debug)]
pub struct ObservabilityGuard {
    service: String,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        info!(service = %self.service, "Shutting down observability...");
    }
}

/// 安装日志订阅器并注册指标描述
pub fn init(service_name: &str, config: &ObservabilityConfig) -> anyhow::Result<ObservabilityGuard> {
    logging::install(config)?;
    metrics::describe_metrics();

    info!(
        service = %service_name,
        level = %config.log_level,
        format = ?config.log_format,
        "Observability initialized"
    );

    Ok(ObservabilityGuard {
        service: service_name.to_string(),
    })
}
