//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 后台清理任务
//!
//! Governor 本身不调度清理，由本任务在 tokio 运行时中按固定间隔调用
//! [`RateGovernor::cleanup_expired`]。任务只持有 Governor 的弱引用，
//! Governor 被释放后任务自动退出。

use crate::governor::RateGovernor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// 定时清理任务句柄
///
/// 句柄被释放时任务随之停止。
#[derive(Debug)]
pub struct CleanupTask {
    handle: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
    interval: Duration,
}

impl CleanupTask {
    /// 启动清理任务
    ///
    /// 必须在 tokio 运行时中调用。第一次清理在启动后立即执行。
    pub fn start(governor: &Arc<RateGovernor>, interval: Duration) -> Self {
        let passes = Arc::new(AtomicU64::new(0));
        let handle = Self::spawn(Arc::downgrade(governor), interval, Arc::clone(&passes));
        info!(interval_ms = interval.as_millis() as u64, "清理任务已启动");

        Self {
            handle: Some(handle),
            passes,
            interval,
        }
    }

    fn spawn(governor: Weak<RateGovernor>, interval: Duration, passes: Arc<AtomicU64>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(governor) = governor.upgrade() else {
                    debug!("Governor 已释放，清理任务退出");
                    break;
                };
                let swept = governor.cleanup_expired();
                passes.fetch_add(1, Ordering::Relaxed);
                if swept > 0 {
                    debug!(swept, "清理任务回收了过期状态");
                }
            }
        })
    }

    /// 已完成的清理轮数
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// 清理间隔
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 任务是否已结束
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// 停止清理任务
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!(passes = self.passes(), "清理任务已停止");
        }
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
