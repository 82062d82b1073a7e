//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 限流器模块
//!
//! 实现三种限流算法的单来源状态。状态本身不做同步，
//! 由 [`RateGovernor`](crate::governor::RateGovernor) 在锁内驱动。
//!
//! 每种状态都遵循同一约定：
//! - `try_acquire` 是事务性的：成功时扣除 cost，失败时不消耗任何配额
//! - `remaining` / `reset_at` / `retry_at` 只读，不改变消耗状态
//! - `sweep` 清理过期状态，返回是否有变化

use crate::config::{LimitConfig, Strategy};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 令牌桶状态
///
/// 令牌以 `limit / window` 的恒定速率补充，最多累积到 `burst`。
/// 补充是惰性的：每次检查时根据经过的时间计算。
#[derive(Debug, Clone)]
pub struct TokenBucketState {
    /// 当前令牌数，始终位于 `[0, burst]`
    tokens: f64,
    /// 最后补充时间
    last_refill: Instant,
}

impl TokenBucketState {
    /// 创建满桶状态
    pub fn full(config: &LimitConfig, now: Instant) -> Self {
        Self {
            tokens: config.burst() as f64,
            last_refill: now,
        }
    }

    /// 计算补充后的令牌数（不修改状态）
    fn refilled(&self, config: &LimitConfig, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * config.refill_rate()).min(config.burst() as f64)
    }

    /// 尝试消费令牌
    pub fn try_acquire(&mut self, config: &LimitConfig, now: Instant, cost: u64) -> bool {
        // 补充不算消耗，失败时剩余配额不变
        self.tokens = self.refilled(config, now);
        self.last_refill = now;

        let cost = cost as f64;
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// 剩余令牌数（向下取整）
    pub fn remaining(&self, config: &LimitConfig, now: Instant) -> u64 {
        self.refilled(config, now).floor() as u64
    }

    /// 补满到 `burst` 的时间点
    pub fn reset_at(&self, config: &LimitConfig, now: Instant) -> Instant {
        let deficit = config.burst() as f64 - self.refilled(config, now);
        later(now, seconds(deficit / config.refill_rate()))
    }

    /// 足够支付 `cost` 的最早时间点，`cost` 超过容量时返回 `None`
    pub fn retry_at(&self, config: &LimitConfig, now: Instant, cost: u64) -> Option<Instant> {
        if cost > config.burst() {
            return None;
        }
        let deficit = cost as f64 - self.refilled(config, now);
        Some(later(now, seconds(deficit / config.refill_rate())))
    }

    /// 当前令牌数（仅用于测试）
    #[cfg(test)]
    fn tokens(&self) -> f64 {
        self.tokens
    }
}

/// 滑动窗口状态
///
/// 每个被准入的消耗单位记录一个时间戳，按插入顺序（最旧在前）保存。
/// 早于 `now - window` 的记录视为过期，在检查时惰性清理。
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowState {
    entries: VecDeque<Instant>,
}

impl SlidingWindowState {
    /// 创建空窗口
    pub fn empty() -> Self {
        Self::default()
    }

    fn is_stale(config: &LimitConfig, now: Instant, entry: Instant) -> bool {
        now.saturating_duration_since(entry) > config.window()
    }

    /// 移除过期记录，返回移除数量
    fn evict(&mut self, config: &LimitConfig, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(&front) = self.entries.front() {
            if Self::is_stale(config, now, front) {
                self.entries.pop_front();
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    /// 未过期的记录（不修改状态）
    fn live(&self, config: &LimitConfig, now: Instant) -> impl Iterator<Item = &Instant> + '_ {
        let config = *config;
        self.entries
            .iter()
            .filter(move |entry| !Self::is_stale(&config, now, **entry))
    }

    /// 尝试记录请求
    pub fn try_acquire(&mut self, config: &LimitConfig, now: Instant, cost: u64) -> bool {
        self.evict(config, now);

        let current_count = self.entries.len() as u64;
        if current_count.saturating_add(cost) > config.limit() {
            return false;
        }

        for _ in 0..cost {
            self.entries.push_back(now);
        }
        true
    }

    /// 剩余配额
    pub fn remaining(&self, config: &LimitConfig, now: Instant) -> u64 {
        let live = self.live(config, now).count() as u64;
        config.limit().saturating_sub(live)
    }

    /// 最旧记录到期的时间点
    ///
    /// 这只是一个下界：届时释放一个单位的配额，而不是全部配额。
    /// 需要逐单位精确时间的调用方应自行轮询。
    pub fn reset_at(&self, config: &LimitConfig, now: Instant) -> Instant {
        self.live(config, now)
            .next()
            .map(|oldest| later(*oldest, config.window()))
            .unwrap_or(now)
    }

    /// 足够容纳 `cost` 的最早时间点，`cost` 超过 `limit` 时返回 `None`
    pub fn retry_at(&self, config: &LimitConfig, now: Instant, cost: u64) -> Option<Instant> {
        if cost > config.limit() {
            return None;
        }
        let live: Vec<Instant> = self.live(config, now).copied().collect();
        let needed = (live.len() as u64 + cost).saturating_sub(config.limit());
        if needed == 0 {
            return Some(now);
        }
        // 第 needed 个最旧记录过期后即可容纳；过期判定是严格大于 window
        live.get(needed as usize - 1).map(|entry| {
            later(*entry, config.window().saturating_add(Duration::from_nanos(1)))
        })
    }

    /// 清理过期记录
    pub fn sweep(&mut self, config: &LimitConfig, now: Instant) -> bool {
        self.evict(config, now) > 0
    }

    /// 当前记录数（含尚未清理的过期记录）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何记录
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 固定窗口状态
///
/// 窗口内独立计数；第一次观察到窗口已结束时重置计数并以当前时间开启新窗口。
#[derive(Debug, Clone)]
pub struct FixedWindowState {
    count: u64,
    window_start: Instant,
}

impl FixedWindowState {
    /// 以当前时间开启新窗口
    pub fn starting_at(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn elapsed(&self, config: &LimitConfig, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= config.window()
    }

    /// 检查并重置窗口，返回是否发生重置
    fn roll(&mut self, config: &LimitConfig, now: Instant) -> bool {
        if self.elapsed(config, now) {
            self.count = 0;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    /// 尝试增加计数
    pub fn try_acquire(&mut self, config: &LimitConfig, now: Instant, cost: u64) -> bool {
        self.roll(config, now);

        if self.count.saturating_add(cost) > config.limit() {
            return false;
        }
        self.count += cost;
        true
    }

    /// 剩余配额
    pub fn remaining(&self, config: &LimitConfig, now: Instant) -> u64 {
        if self.elapsed(config, now) {
            config.limit()
        } else {
            config.limit().saturating_sub(self.count)
        }
    }

    /// 当前窗口结束时间
    pub fn reset_at(&self, config: &LimitConfig) -> Instant {
        later(self.window_start, config.window())
    }

    /// 足够容纳 `cost` 的最早时间点，`cost` 超过 `limit` 时返回 `None`
    pub fn retry_at(&self, config: &LimitConfig, now: Instant, cost: u64) -> Option<Instant> {
        if cost > config.limit() {
            return None;
        }
        if self.elapsed(config, now) || self.count.saturating_add(cost) <= config.limit() {
            Some(now)
        } else {
            Some(self.reset_at(config))
        }
    }

    /// 重置已结束的窗口，新窗口从 `now` 开始
    pub fn sweep(&mut self, config: &LimitConfig, now: Instant) -> bool {
        self.roll(config, now)
    }

    /// 当前窗口计数
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// 算法状态
///
/// 与 Governor 的 [`Strategy`] 一一对应。
#[derive(Debug, Clone)]
pub enum AlgorithmState {
    TokenBucket(TokenBucketState),
    SlidingWindow(SlidingWindowState),
    FixedWindow(FixedWindowState),
}

impl AlgorithmState {
    /// 创建"完全可用"的初始状态
    pub fn fresh(strategy: Strategy, config: &LimitConfig, now: Instant) -> Self {
        match strategy {
            Strategy::TokenBucket => Self::TokenBucket(TokenBucketState::full(config, now)),
            Strategy::SlidingWindow => Self::SlidingWindow(SlidingWindowState::empty()),
            Strategy::FixedWindow => Self::FixedWindow(FixedWindowState::starting_at(now)),
        }
    }

    /// 对应的策略
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::TokenBucket(_) => Strategy::TokenBucket,
            Self::SlidingWindow(_) => Strategy::SlidingWindow,
            Self::FixedWindow(_) => Strategy::FixedWindow,
        }
    }

    pub fn try_acquire(&mut self, config: &LimitConfig, now: Instant, cost: u64) -> bool {
        match self {
            Self::TokenBucket(state) => state.try_acquire(config, now, cost),
            Self::SlidingWindow(state) => state.try_acquire(config, now, cost),
            Self::FixedWindow(state) => state.try_acquire(config, now, cost),
        }
    }

    pub fn remaining(&self, config: &LimitConfig, now: Instant) -> u64 {
        match self {
            Self::TokenBucket(state) => state.remaining(config, now),
            Self::SlidingWindow(state) => state.remaining(config, now),
            Self::FixedWindow(state) => state.remaining(config, now),
        }
    }

    pub fn reset_at(&self, config: &LimitConfig, now: Instant) -> Instant {
        match self {
            Self::TokenBucket(state) => state.reset_at(config, now),
            Self::SlidingWindow(state) => state.reset_at(config, now),
            Self::FixedWindow(state) => state.reset_at(config),
        }
    }

    pub fn retry_at(&self, config: &LimitConfig, now: Instant, cost: u64) -> Option<Instant> {
        match self {
            Self::TokenBucket(state) => state.retry_at(config, now, cost),
            Self::SlidingWindow(state) => state.retry_at(config, now, cost),
            Self::FixedWindow(state) => state.retry_at(config, now, cost),
        }
    }

    /// 令牌桶无需清理，下一次检查时自动修正
    pub fn sweep(&mut self, config: &LimitConfig, now: Instant) -> bool {
        match self {
            Self::TokenBucket(_) => false,
            Self::SlidingWindow(state) => state.sweep(config, now),
            Self::FixedWindow(state) => state.sweep(config, now),
        }
    }
}

/// `instant + by`，溢出时饱和到可表示的最远时间点
fn later(instant: Instant, by: Duration) -> Instant {
    let mut by = by;
    loop {
        if let Some(at) = instant.checked_add(by) {
            return at;
        }
        by /= 2;
        if by.is_zero() {
            return instant;
        }
    }
}

fn seconds(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

// ============================================================================
// 单元测试
// ============================================================================
