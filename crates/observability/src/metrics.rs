//! 事件投递指标收集模块
//!
//! 基于 `metrics` facade 记录管道运行指标；未安装 recorder 时为空操作。

use std::collections::HashMap;

use contracts::Event;
use metrics::{counter, gauge, histogram};

/// 记录事件进入缓冲区 (sink 尚未就绪)
pub fn record_event_buffered() {
    counter!("eventpipe_events_buffered_total").increment(1);
}

/// 记录缓冲区深度
pub fn record_buffer_depth(depth: usize) {
    gauge!("eventpipe_buffer_depth").set(depth as f64);
}

/// 记录一次 flush 排空的事件数量
pub fn record_events_flushed(count: usize) {
    counter!("eventpipe_events_flushed_total").increment(count as u64);
}

/// 记录排队延迟 (入队到 flush)
pub fn record_queue_latency_ms(latency_ms: f64) {
    histogram!("eventpipe_queue_latency_ms").record(latency_ms);
}

/// 记录单个 sink 的投递结果
pub fn record_event_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "eventpipe_events_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// 记录被去重策略拦截的事件
pub fn record_dedup_suppressed(policy: &str) {
    counter!(
        "eventpipe_dedup_suppressed_total",
        "policy" => policy.to_string()
    )
    .increment(1);
}

/// 记录 watchdog 状态迁移
pub fn record_watchdog_transition(state: &str) {
    counter!(
        "eventpipe_watchdog_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// 投递指标聚合器
///
/// 在内存中聚合已投递事件，便于输出摘要 (CLI replay 使用)。
#[derive(Debug, Clone, Default)]
pub struct DeliveryAggregator {
    /// 已投递事件总数
    pub total_events: u64,

    /// 经缓冲区 flush 投递的事件数
    pub flushed_events: u64,

    /// 排队延迟统计 (毫秒)
    pub latency_stats: RunningStats,

    /// 各事件名投递次数
    pub event_counts: HashMap<String, u64>,
}

impl DeliveryAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, event: &Event) {
        self.total_events += 1;
        *self.event_counts.entry(event.name().to_string()).or_insert(0) += 1;

        if let Some(delta) = event.time_delta() {
            self.flushed_events += 1;
            self.latency_stats.push(delta * 1000.0);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DeliverySummary {
        DeliverySummary {
            total_events: self.total_events,
            flushed_events: self.flushed_events,
            queue_latency_ms: StatsSummary::from(&self.latency_stats),
            event_counts: self.event_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub total_events: u64,
    pub flushed_events: u64,
    pub queue_latency_ms: StatsSummary,
    pub event_counts: HashMap<String, u64>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Delivered events: {}", self.total_events)?;
        writeln!(f, "Flushed from buffer: {}", self.flushed_events)?;
        writeln!(f, "Queue latency (ms): {}", self.queue_latency_ms)?;

        if !self.event_counts.is_empty() {
            writeln!(f, "Per-event counts:")?;
            let mut names: Vec<_> = self.event_counts.iter().collect();
            names.sort();
            for (name, count) in names {
                writeln!(f, "  {}: {}", name, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
