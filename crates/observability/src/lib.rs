//! # Observability
//!
//! 可观测性模块：结构化日志 + Prometheus 指标。
//!
//! ## 功能
//!
//! - 日志订阅器安装 (JSON/Pretty/Compact，受 `RUST_LOG` 覆盖)
//! - Prometheus 指标导出 (可选，按端口开启)
//! - 投递指标：缓冲深度、分发结果、排队延迟、去重、watchdog 状态迁移
//! - 投递汇总：按事件名计数与排队延迟统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{LogFormat, TracingConfig};
//!
//! observability::init_tracing(&TracingConfig::from_verbosity(1, false, LogFormat::Compact))?;
//! observability::record_event_dispatched("console", true);
//! ```

pub mod metrics;

use anyhow::{anyhow, Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_buffer_depth, record_dedup_suppressed, record_event_buffered, record_event_dispatched,
    record_events_flushed, record_queue_latency_ms, record_watchdog_transition,
    DeliveryAggregator, DeliverySummary, RunningStats, StatsSummary,
};

/// 日志订阅器设置
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// 输出格式
    pub format: LogFormat,
    /// `RUST_LOG` 未设置时使用的过滤指令
    pub default_directive: String,
    /// 为 true 时忽略 `RUST_LOG`
    pub force_directive: bool,
}

impl TracingConfig {
    /// 由命令行的 `-v` 次数与 `-q` 推导
    ///
    /// `-q` 固定为 `warn`，不受环境变量影响。
    pub fn from_verbosity(verbose: u8, quiet: bool, format: LogFormat) -> Self {
        let directive = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            format,
            default_directive: directive.to_string(),
            force_directive: quiet,
        }
    }

    fn filter(&self) -> EnvFilter {
        if self.force_directive {
            return EnvFilter::new(&self.default_directive);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::from_verbosity(0, false, LogFormat::default())
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 安装全局日志订阅器
///
/// 进程内只能成功一次，重复调用返回错误。
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer(config.format))
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::debug!(
        format = ?config.format,
        directive = %config.default_directive,
        "Tracing initialized"
    );
    Ok(())
}

/// 按日志格式构造 fmt layer
pub fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_target(false).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    }
}

/// 安装 Prometheus recorder 并在 `port` 上暴露 `/metrics`
///
/// 未调用时所有 `record_*` 均为空操作。
pub fn install_prometheus(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("failed to install Prometheus exporter on port {port}"))?;

    tracing::info!(port, "Prometheus metrics endpoint listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_directive() {
        let cases = [
            (0, false, "info"),
            (1, false, "debug"),
            (3, false, "trace"),
            (2, true, "warn"),
        ];
        for (verbose, quiet, expected) in cases {
            let config = TracingConfig::from_verbosity(verbose, quiet, LogFormat::Compact);
            assert_eq!(config.default_directive, expected);
            assert_eq!(config.force_directive, quiet);
        }
    }

    #[test]
    fn test_default_is_json_info() {
        let config = TracingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.default_directive, "info");
    }
}
