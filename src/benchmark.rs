//! 交互性能基准
//!
//! - [`BenchmarkRunner::run`]：重复执行一个异步操作 N 次，统计平均 / 最小 / 最大耗时，
//!   与延迟目标比较
//! - [`BenchmarkRunner::measure_interaction`]：执行一次交互并等待下一帧，
//!   与 60fps 帧预算比较
//!
//! 计时使用 `tokio::time::Instant`，在暂停时钟的测试中同样准确。

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::config::BenchmarkConfig;

/// 60fps 下单帧预算（约 16.67ms）
pub const FRAME_BUDGET: Duration = Duration::from_micros(16_667);

#[derive(Debug, Error)]
pub enum BenchmarkError {
    #[error("Iteration count must be positive")]
    NoIterations,

    #[error("Action failed on iteration {iteration}: {cause}")]
    ActionFailed { iteration: usize, cause: String },
}

/// 重复执行的统计结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub label: String,
    pub iterations: usize,
    pub samples: Vec<Duration>,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
    pub target: Duration,
    pub within_target: bool,
}

impl BenchmarkReport {
    fn from_samples(label: &str, samples: Vec<Duration>, target: Duration) -> Self {
        let average = mean(&samples);
        let min = samples.iter().min().copied().unwrap_or_default();
        let max = samples.iter().max().copied().unwrap_or_default();
        Self {
            label: label.to_string(),
            iterations: samples.len(),
            samples,
            average,
            min,
            max,
            target,
            within_target: average <= target,
        }
    }
}

/// 以纳秒累加求平均，样本再多也不会溢出或截断
fn mean(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let nanos = total / samples.len() as u128;
    Duration::new(
        (nanos / NANOS_PER_SEC) as u64,
        (nanos % NANOS_PER_SEC) as u32,
    )
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// 单次交互的计时结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionReport {
    pub label: String,
    pub elapsed: Duration,
    pub budget: Duration,
    pub within_budget: bool,
}

/// 帧时钟：等待下一帧渲染
#[async_trait]
pub trait FrameClock: Send + Sync {
    async fn next_frame(&self);
}

/// 以创建时刻为起点、按固定帧长对齐的帧时钟
#[derive(Debug, Clone)]
pub struct TokioFrameClock {
    epoch: Instant,
    frame: Duration,
}

impl TokioFrameClock {
    pub fn new(frame: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            frame: frame.max(Duration::from_micros(1)),
        }
    }
}

impl Default for TokioFrameClock {
    fn default() -> Self {
        Self::new(FRAME_BUDGET)
    }
}

#[async_trait]
impl FrameClock for TokioFrameClock {
    async fn next_frame(&self) {
        let elapsed = self.epoch.elapsed().as_nanos();
        let frame = self.frame.as_nanos();
        let frames = elapsed / frame + 1;
        let offset = Duration::from_nanos((frames * frame).min(u64::MAX as u128) as u64);
        sleep_until(self.epoch + offset).await;
    }
}

pub struct BenchmarkRunner {
    target: Duration,
    frame_clock: Arc<dyn FrameClock>,
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::from_config(&BenchmarkConfig::default())
    }
}

impl BenchmarkRunner {
    pub fn new(target: Duration) -> Self {
        Self {
            target,
            frame_clock: Arc::new(TokioFrameClock::default()),
        }
    }

    pub fn from_config(config: &BenchmarkConfig) -> Self {
        Self::new(config.latency_target())
    }

    pub fn with_frame_clock(mut self, frame_clock: Arc<dyn FrameClock>) -> Self {
        self.frame_clock = frame_clock;
        self
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    /// 顺序执行 `iterations` 次并统计耗时；任一次失败即中止
    pub async fn run<F, Fut, T, E>(
        &self,
        label: &str,
        iterations: usize,
        mut action: F,
    ) -> Result<BenchmarkReport, BenchmarkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if iterations == 0 {
            return Err(BenchmarkError::NoIterations);
        }

        let mut samples = Vec::with_capacity(iterations);
        for iteration in 0..iterations {
            let start = Instant::now();
            action()
                .await
                .map_err(|e| BenchmarkError::ActionFailed {
                    iteration,
                    cause: e.to_string(),
                })?;
            samples.push(start.elapsed());
        }

        let report = BenchmarkReport::from_samples(label, samples, self.target);
        if report.within_target {
            info!(
                "[Benchmark] {}: avg={:?} min={:?} max={:?} (target {:?}, n={})",
                report.label, report.average, report.min, report.max, report.target, report.iterations
            );
        } else {
            warn!(
                "[Benchmark] {} 超出目标: avg={:?} min={:?} max={:?} (target {:?}, n={})",
                report.label, report.average, report.min, report.max, report.target, report.iterations
            );
        }
        Ok(report)
    }

    /// 执行一次交互并等待下一帧后计时
    pub async fn measure_interaction<F, Fut, T, E>(
        &self,
        label: &str,
        action: F,
    ) -> Result<InteractionReport, BenchmarkError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let start = Instant::now();
        action().await.map_err(|e| BenchmarkError::ActionFailed {
            iteration: 0,
            cause: e.to_string(),
        })?;
        self.frame_clock.next_frame().await;
        let elapsed = start.elapsed();

        let report = InteractionReport {
            label: label.to_string(),
            elapsed,
            budget: FRAME_BUDGET,
            within_budget: elapsed <= FRAME_BUDGET,
        };
        if report.within_budget {
            info!("[Benchmark] {}: {:?} (frame budget {:?})", label, elapsed, FRAME_BUDGET);
        } else {
            warn!("[Benchmark] {} 掉帧: {:?} > {:?}", label, elapsed, FRAME_BUDGET);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_statistics() {
        let samples = vec![
            Duration::from_millis(10),
            Duration::from_millis(30),
            Duration::from_millis(20),
        ];
        let report = BenchmarkReport::from_samples("render", samples, Duration::from_millis(15));
        assert_eq!(report.average, Duration::from_millis(20));
        assert_eq!(report.min, Duration::from_millis(10));
        assert_eq!(report.max, Duration::from_millis(30));
        assert!(!report.within_target);
    }

    #[test]
    fn mean_handles_empty_and_huge_samples() {
        assert_eq!(mean(&[]), Duration::ZERO);

        let huge = Duration::from_secs(u64::MAX / 2);
        assert_eq!(mean(&[huge, huge, huge]), huge);

        let odd = [Duration::from_nanos(1), Duration::from_nanos(2)];
        assert_eq!(mean(&odd), Duration::from_nanos(1));
    }

    #[test]
    fn frame_budget_is_sixty_fps() {
        assert_eq!(FRAME_BUDGET.as_micros(), 1_000_000 / 60 + 1);
    }
}
