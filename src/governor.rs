//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Governor 主控制器
//!
//! 所有对外部来源的调用在发出前都要经过 Governor 准入：
//! - 每个来源独立配置 `limit` / `window` / `burst`
//! - 限流策略在构造时选定，对所有来源统一生效
//! - 未配置的来源默认放行
//!
//! 所有来源的配置与状态由一把互斥锁保护，检查、注册、重置与清理
//! 互斥执行，并发检查不会重复消费配额。阻塞等待在条件变量上挂起，
//! 挂起期间释放锁。

use crate::clock::{Clock, SystemClock};
use crate::config::{GovernorConfig, LimitConfig, Strategy};
use crate::constants::{DEFAULT_COST, MAX_WAIT_POLL_INTERVAL, MIN_WAIT_POLL_INTERVAL};
use crate::error::GovernorError;
use crate::limiters::AlgorithmState;
#[cfg(feature = "monitoring")]
use crate::metrics::{GovernorMetrics, Outcome};
use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info, instrument, trace, warn};

/// 单个来源的配置与算法状态
#[derive(Debug)]
struct SourceLimiter {
    config: LimitConfig,
    state: AlgorithmState,
}

/// 一次准入尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Admitted,
    Unconfigured,
    Rejected,
}

/// 等待循环的下一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitStep {
    Admitted,
    /// `cost` 超过容量，永远无法准入
    Unreachable,
    RetryIn(Duration),
}

/// 来源状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: String,
    pub strategy: Strategy,
    pub limit: u64,
    #[serde(with = "crate::config::duration_str")]
    pub window: Duration,
    pub remaining: u64,
    pub reset_time: DateTime<Utc>,
    pub burst: u64,
}

impl SourceStatus {
    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String, GovernorError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Governor 统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GovernorStats {
    /// 检查总次数（含等待中的每次尝试）
    pub total_checks: u64,
    /// 准入次数
    pub admitted: u64,
    /// 拒绝次数
    pub rejected: u64,
    /// 未配置来源的放行次数
    pub unconfigured: u64,
    /// 等待超时次数
    pub wait_timeouts: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    admitted: AtomicU64,
    rejected: AtomicU64,
    unconfigured: AtomicU64,
    wait_timeouts: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> GovernorStats {
        let admitted = self.admitted.load(Ordering::Relaxed);
        let rejected = self.rejected.load(Ordering::Relaxed);
        let unconfigured = self.unconfigured.load(Ordering::Relaxed);
        GovernorStats {
            total_checks: admitted + rejected + unconfigured,
            admitted,
            rejected,
            unconfigured,
            wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Governor 构建器
pub struct GovernorBuilder {
    strategy: Strategy,
    clock: Arc<dyn Clock>,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<GovernorMetrics>>,
}

impl GovernorBuilder {
    /// 使用自定义时钟
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 挂接 Prometheus 指标
    #[cfg(feature = "monitoring")]
    pub fn metrics(mut self, metrics: Arc<GovernorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 构建 Governor
    pub fn build(self) -> RateGovernor {
        RateGovernor {
            strategy: self.strategy,
            clock: self.clock,
            sources: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            released_async: Notify::new(),
            stats: StatsCounters::default(),
            #[cfg(feature = "monitoring")]
            metrics: self.metrics,
        }
    }
}

/// 请求速率 Governor
///
/// # 示例
/// ```rust
/// use fetch_governor::{RateGovernor, Strategy};
/// use std::time::Duration;
///
/// let governor = RateGovernor::new(Strategy::TokenBucket);
/// governor.set_limit("reddit", 5, Duration::from_secs(10), None).unwrap();
///
/// for _ in 0..5 {
///     assert!(governor.check_limit("reddit", 1));
/// }
/// assert!(!governor.check_limit("reddit", 1));
///
/// // 未配置的来源默认放行
/// assert!(governor.check_limit("google_news", 100));
/// ```
pub struct RateGovernor {
    strategy: Strategy,
    clock: Arc<dyn Clock>,
    sources: Mutex<HashMap<String, SourceLimiter>>,
    /// 配额被释放（注册、重置、清理）时通知阻塞等待者
    released: Condvar,
    /// 配额被释放时通知异步等待者
    released_async: Notify,
    stats: StatsCounters,
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<GovernorMetrics>>,
}

impl RateGovernor {
    /// 使用系统时钟创建 Governor
    pub fn new(strategy: Strategy) -> Self {
        Self::builder(strategy).build()
    }

    /// 创建构建器
    pub fn builder(strategy: Strategy) -> GovernorBuilder {
        GovernorBuilder {
            strategy,
            clock: Arc::new(SystemClock),
            #[cfg(feature = "monitoring")]
            metrics: None,
        }
    }

    /// 根据配置创建 Governor 并注册其中的所有来源
    pub fn from_config(config: &GovernorConfig) -> Result<Self, GovernorError> {
        config.validate()?;

        let governor = Self::new(config.strategy);
        for (source, limit) in &config.sources {
            governor.set_limit_config(source.clone(), limit.to_limit_config()?);
        }

        info!(
            strategy = %config.strategy,
            sources = config.sources.len(),
            "Governor 已根据配置创建"
        );
        Ok(governor)
    }

    /// 当前策略
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// 注册或覆盖来源的限流配置
    ///
    /// `burst` 缺省时等于 `limit`。重新注册会丢弃该来源之前的全部状态。
    ///
    /// # 错误
    /// `limit == 0`、`window == 0` 或 `burst < limit` 时返回
    /// [`GovernorError::InvalidConfiguration`]，且不改变任何状态。
    pub fn set_limit(
        &self,
        source: impl Into<String>,
        limit: u64,
        window: Duration,
        burst: Option<u64>,
    ) -> Result<(), GovernorError> {
        let config = LimitConfig::new(limit, window, burst)?;
        self.set_limit_config(source, config);
        Ok(())
    }

    /// 使用已校验的配置注册来源
    #[instrument(skip(self, source), fields(source))]
    pub fn set_limit_config(&self, source: impl Into<String>, config: LimitConfig) {
        let source = source.into();
        tracing::Span::current().record("source", source.as_str());

        let now = self.clock.now();
        let state = AlgorithmState::fresh(self.strategy, &config, now);
        let previous = self
            .sources
            .lock()
            .insert(source.clone(), SourceLimiter { config, state });

        info!(
            limit = config.limit(),
            window_ms = config.window().as_millis() as u64,
            burst = config.burst(),
            replaced = previous.is_some(),
            "来源限流配置已设置"
        );
        self.notify_released();
    }

    /// 检查并消费配额
    ///
    /// 成功时消费 `cost`，失败时不消费任何配额。未配置的来源总是返回 `true`。
    pub fn check_limit(&self, source: &str, cost: u64) -> bool {
        let mut sources = self.sources.lock();
        let admission = self.admit_locked(&mut sources, source, cost);
        drop(sources);

        self.record(source, admission);
        admission != Admission::Rejected
    }

    /// 以默认 cost 检查
    pub fn check(&self, source: &str) -> bool {
        self.check_limit(source, DEFAULT_COST)
    }

    fn admit_locked(
        &self,
        sources: &mut HashMap<String, SourceLimiter>,
        source: &str,
        cost: u64,
    ) -> Admission {
        let Some(entry) = sources.get_mut(source) else {
            return Admission::Unconfigured;
        };

        let now = self.clock.now();
        if entry.state.try_acquire(&entry.config, now, cost) {
            trace!(source, cost, "请求已准入");
            Admission::Admitted
        } else {
            debug!(
                source,
                cost,
                limit = entry.config.limit(),
                remaining = entry.state.remaining(&entry.config, now),
                "请求被限流"
            );
            Admission::Rejected
        }
    }

    fn record(&self, source: &str, admission: Admission) {
        let counter = match admission {
            Admission::Admitted => &self.stats.admitted,
            Admission::Rejected => &self.stats.rejected,
            Admission::Unconfigured => &self.stats.unconfigured,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            let outcome = match admission {
                Admission::Admitted => Outcome::Admitted,
                Admission::Rejected => Outcome::Rejected,
                Admission::Unconfigured => Outcome::Unconfigured,
            };
            metrics.record_check(source, outcome);
        }
        #[cfg(not(feature = "monitoring"))]
        let _ = source;
    }

    fn record_wait_timeout(&self, source: &str, cost: u64) {
        self.stats.wait_timeouts.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_wait_timeout(source);
        }
        warn!(source, cost, "等待准入超时");
    }

    /// 剩余配额，未配置时返回 `None`
    pub fn get_remaining_quota(&self, source: &str) -> Option<u64> {
        let sources = self.sources.lock();
        let entry = sources.get(source)?;
        Some(entry.state.remaining(&entry.config, self.clock.now()))
    }

    /// 配额预计完全恢复的时间，未配置时返回 `None`
    ///
    /// 滑动窗口返回最旧记录过期的时间，届时只释放一个单位的配额。
    pub fn get_reset_time(&self, source: &str) -> Option<DateTime<Utc>> {
        let sources = self.sources.lock();
        let entry = sources.get(source)?;
        let reset_at = entry.state.reset_at(&entry.config, self.clock.now());
        Some(self.clock.wall_time(reset_at))
    }

    /// 计算等待循环的下一步，成功时已消费配额
    fn next_wait_step(
        &self,
        sources: &mut HashMap<String, SourceLimiter>,
        source: &str,
        cost: u64,
    ) -> WaitStep {
        let admission = self.admit_locked(sources, source, cost);
        self.record(source, admission);
        if admission != Admission::Rejected {
            return WaitStep::Admitted;
        }

        let Some(entry) = sources.get(source) else {
            return WaitStep::Admitted;
        };
        let now = self.clock.now();
        match entry.state.retry_at(&entry.config, now, cost) {
            Some(retry_at) => WaitStep::RetryIn(
                retry_at
                    .saturating_duration_since(now)
                    .clamp(MIN_WAIT_POLL_INTERVAL, MAX_WAIT_POLL_INTERVAL),
            ),
            None => WaitStep::Unreachable,
        }
    }

    /// 阻塞当前线程直到准入
    ///
    /// 每轮最多挂起 1 秒，挂起期间释放锁；注册、重置或清理释放配额时会被提前唤醒。
    /// `max_wait` 到期仍未准入时返回 `false`。`cost` 超过来源容量时立即返回 `false`。
    #[instrument(skip(self))]
    pub fn wait_if_needed(&self, source: &str, cost: u64, max_wait: Option<Duration>) -> bool {
        // 超出可表示范围的等待时长视为不设期限
        let deadline = max_wait.and_then(|wait| Instant::now().checked_add(wait));
        let mut sources = self.sources.lock();

        loop {
            let pause = match self.next_wait_step(&mut sources, source, cost) {
                WaitStep::Admitted => return true,
                WaitStep::Unreachable => {
                    warn!(source, cost, "cost 超过来源容量，无法准入");
                    return false;
                }
                WaitStep::RetryIn(pause) => pause,
            };

            let pause = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        drop(sources);
                        self.record_wait_timeout(source, cost);
                        return false;
                    }
                    pause.min(left)
                }
                None => pause,
            };

            trace!(source, pause_ms = pause.as_millis() as u64, "等待配额释放");
            self.released.wait_for(&mut sources, pause);
        }
    }

    /// [`wait_if_needed`](Self::wait_if_needed) 的异步版本
    ///
    /// 不会跨 await 持有锁，适合在 tokio 运行时中使用。
    #[instrument(skip(self))]
    pub async fn wait_if_needed_async(
        &self,
        source: &str,
        cost: u64,
        max_wait: Option<Duration>,
    ) -> bool {
        let deadline = max_wait.and_then(|wait| tokio::time::Instant::now().checked_add(wait));

        loop {
            // 先登记通知，避免检查与挂起之间丢失唤醒
            let released = self.released_async.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let step = {
                let mut sources = self.sources.lock();
                self.next_wait_step(&mut sources, source, cost)
            };
            let pause = match step {
                WaitStep::Admitted => return true,
                WaitStep::Unreachable => {
                    warn!(source, cost, "cost 超过来源容量，无法准入");
                    return false;
                }
                WaitStep::RetryIn(pause) => pause,
            };

            let pause = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(tokio::time::Instant::now());
                    if left.is_zero() {
                        self.record_wait_timeout(source, cost);
                        return false;
                    }
                    pause.min(left)
                }
                None => pause,
            };

            tokio::select! {
                _ = &mut released => {}
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// 将来源恢复到完全可用的初始状态，保留其配置
    ///
    /// 来源未配置时不做任何事并返回 `false`。
    #[instrument(skip(self))]
    pub fn reset_limit(&self, source: &str) -> bool {
        let now = self.clock.now();
        let reset = {
            let mut sources = self.sources.lock();
            match sources.get_mut(source) {
                Some(entry) => {
                    entry.state = AlgorithmState::fresh(self.strategy, &entry.config, now);
                    true
                }
                None => false,
            }
        };

        if reset {
            info!("来源限流状态已重置");
            self.notify_released();
        }
        reset
    }

    /// 来源状态快照，未配置时返回 `None`
    pub fn get_status(&self, source: &str) -> Option<SourceStatus> {
        let sources = self.sources.lock();
        let entry = sources.get(source)?;
        let now = self.clock.now();

        Some(SourceStatus {
            source: source.to_string(),
            strategy: self.strategy,
            limit: entry.config.limit(),
            window: entry.config.window(),
            remaining: entry.state.remaining(&entry.config, now),
            reset_time: self.clock.wall_time(entry.state.reset_at(&entry.config, now)),
            burst: entry.config.burst(),
        })
    }

    /// 清理所有来源的过期状态
    ///
    /// 丢弃滑动窗口中的过期记录，重置已结束的固定窗口；令牌桶无需清理。
    /// 返回状态发生变化的来源数量。Governor 不会自行调度本方法，
    /// 需要由外部定时调用（参见 [`CleanupTask`](crate::cleanup::CleanupTask)）。
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let swept = {
            let mut sources = self.sources.lock();
            sources
                .values_mut()
                .map(|entry| entry.state.sweep(&entry.config, now))
                .filter(|changed| *changed)
                .count()
        };

        debug!(swept, "过期状态清理完成");
        if swept > 0 {
            self.notify_released();
        }
        swept
    }

    /// 来源是否已配置
    pub fn is_configured(&self, source: &str) -> bool {
        self.sources.lock().contains_key(source)
    }

    /// 已配置的来源（已排序）
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.sources.lock().keys().cloned().collect();
        sources.sort();
        sources
    }

    /// 来源的限流配置
    pub fn limit_config(&self, source: &str) -> Option<LimitConfig> {
        self.sources.lock().get(source).map(|entry| entry.config)
    }

    /// 统计信息
    pub fn stats(&self) -> GovernorStats {
        self.stats.snapshot()
    }

    fn notify_released(&self) {
        self.released.notify_all();
        self.released_async.notify_waiters();
    }
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("strategy", &self.strategy)
            .field("clock", &self.clock)
            .field("sources", &self.sources.lock().len())
            .finish()
    }
}
