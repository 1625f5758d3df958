//! 日志订阅器安装

use super::{LogFormat, ObservabilityConfig};
use anyhow::Context;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// RUST_LOG 优先，其次是配置的级别，都无效时退回 info
pub fn filter_for(config: &ObservabilityConfig) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn output_layer(format: LogFormat) -> BoxedLayer {
    match format {
        // span 关闭时输出耗时
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
    }
}

/// 安装全局订阅器，重复安装返回错误
pub fn install(config: &ObservabilityConfig) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(output_layer(config.log_format).with_filter(filter_for(config)))
        .try_init()
        .context("全局日志订阅器已安装")
}
