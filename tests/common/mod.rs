//! 测试通用工具模块
//!
//! 提供测试中常用的工具函数和辅助结构。

#![allow(dead_code)]

use fetch_governor::{ManualClock, RateGovernor, Strategy};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// 所有策略
pub const ALL_STRATEGIES: [Strategy; 3] = [
    Strategy::TokenBucket,
    Strategy::SlidingWindow,
    Strategy::FixedWindow,
];

/// 创建使用手动时钟的 Governor
pub fn manual_governor(strategy: Strategy) -> (RateGovernor, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let governor = RateGovernor::builder(strategy).clock(clock.clone()).build();
    (governor, clock)
}

/// 创建已注册单个来源的 Governor
pub fn governor_with_source(
    strategy: Strategy,
    source: &str,
    limit: u64,
    window: Duration,
) -> (RateGovernor, Arc<ManualClock>) {
    let (governor, clock) = manual_governor(strategy);
    governor.set_limit(source, limit, window, None).unwrap();
    (governor, clock)
}

/// 连续检查直到被拒绝，返回准入次数
pub fn drain(governor: &RateGovernor, source: &str) -> u64 {
    let mut admitted = 0;
    while governor.check_limit(source, 1) {
        admitted += 1;
        assert!(admitted <= 1_000_000, "来源 {} 永不拒绝", source);
    }
    admitted
}

/// 多线程并发检查，返回准入次数
pub fn concurrent_checks(governor: &Arc<RateGovernor>, source: &str, threads: usize) -> usize {
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let governor = Arc::clone(governor);
            let source = source.to_string();
            thread::spawn(move || governor.check_limit(&source, 1))
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|admitted| *admitted)
        .count()
}
