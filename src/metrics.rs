//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Prometheus 监控指标
//!
//! 按来源统计准入、拒绝与等待超时次数。
//!
//! # 示例
//!
//! ```rust
//! use fetch_governor::metrics::GovernorMetrics;
//! use fetch_governor::{RateGovernor, Strategy};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let metrics = Arc::new(GovernorMetrics::new().unwrap());
//! let governor = RateGovernor::builder(Strategy::FixedWindow)
//!     .metrics(metrics.clone())
//!     .build();
//! governor.set_limit("reddit", 1, Duration::from_secs(60), None).unwrap();
//! governor.check_limit("reddit", 1);
//! governor.check_limit("reddit", 1);
//!
//! let text = metrics.export().unwrap();
//! assert!(text.contains("governor_checks_total"));
//! ```

use crate::error::GovernorError;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// 准入结果标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Admitted,
    Rejected,
    Unconfigured,
}

impl Outcome {
    fn as_label(&self) -> &'static str {
        match self {
            Outcome::Admitted => "admitted",
            Outcome::Rejected => "rejected",
            Outcome::Unconfigured => "unconfigured",
        }
    }
}

/// Governor 监控指标
#[derive(Clone)]
pub struct GovernorMetrics {
    /// 按来源与结果统计的检查次数
    pub checks_total: IntCounterVec,
    /// 按来源统计的等待超时次数
    pub wait_timeouts_total: IntCounterVec,
    /// 指标注册表
    registry: Registry,
}

impl GovernorMetrics {
    /// 使用独立注册表创建指标
    pub fn new() -> Result<Self, GovernorError> {
        Self::with_registry(Registry::new())
    }

    /// 在给定注册表上注册指标
    pub fn with_registry(registry: Registry) -> Result<Self, GovernorError> {
        let checks_total = IntCounterVec::new(
            Opts::new(
                "governor_checks_total",
                "Admission checks grouped by source and outcome",
            ),
            &["source", "outcome"],
        )?;
        let wait_timeouts_total = IntCounterVec::new(
            Opts::new(
                "governor_wait_timeouts_total",
                "Blocking waits that gave up before admission",
            ),
            &["source"],
        )?;

        registry.register(Box::new(checks_total.clone()))?;
        registry.register(Box::new(wait_timeouts_total.clone()))?;

        Ok(Self {
            checks_total,
            wait_timeouts_total,
            registry,
        })
    }

    /// 记录一次检查
    pub fn record_check(&self, source: &str, outcome: Outcome) {
        self.checks_total
            .with_label_values(&[source, outcome.as_label()])
            .inc();
    }

    /// 记录一次等待超时
    pub fn record_wait_timeout(&self, source: &str) {
        self.wait_timeouts_total.with_label_values(&[source]).inc();
    }

    /// 注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 以 Prometheus 文本格式导出
    pub fn export(&self) -> Result<String, GovernorError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| GovernorError::invalid(format!("指标输出不是有效的 UTF-8: {}", e)))
    }
}
