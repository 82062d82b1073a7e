//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 时钟抽象
//!
//! 算法内部使用单调的 [`Instant`] 计算时间差，对外报告的重置时间使用
//! `chrono::DateTime<Utc>`。[`ManualClock`] 允许测试手动推进时间。

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// 时间源
pub trait Clock: Send + Sync + Debug {
    /// 当前单调时间
    fn now(&self) -> Instant;

    /// 当前墙上时间
    fn wall_now(&self) -> DateTime<Utc>;

    /// 将单调时间点换算为墙上时间
    fn wall_time(&self, instant: Instant) -> DateTime<Utc> {
        let now = self.now();
        let wall = self.wall_now();
        if instant >= now {
            wall.checked_add_signed(to_delta(instant - now))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        } else {
            wall.checked_sub_signed(to_delta(now - instant))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动时钟
///
/// 创建时冻结在当前时刻，只有调用 [`ManualClock::advance`] 才会前进。
///
/// # 示例
/// ```rust
/// use fetch_governor::clock::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_millis(500));
/// assert_eq!(clock.now() - start, Duration::from_millis(500));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_wall: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// 创建新的手动时钟
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_wall: Utc::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// 推进时间
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }

    /// 自创建以来经过的时间
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        self.origin_wall
            .checked_add_signed(to_delta(*self.offset.lock()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
