//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 日志订阅器初始化
//!
//! 库内部只通过 `tracing` 宏输出事件，是否以及如何输出由宿主程序决定。
//! 启用 `telemetry` 特性后可用 [`init_tracing`] 安装一个基于
//! `tracing-subscriber` 的格式化输出。

use crate::error::GovernorError;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 遥测配置
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// 服务名称
    pub service_name: String,
    /// 默认过滤指令，`RUST_LOG` 存在时以其为准
    pub filter: String,
    /// 是否输出 target
    pub with_target: bool,
    /// 是否使用 ANSI 颜色
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "fetch-governor".to_string(),
            filter: "info".to_string(),
            with_target: true,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// 创建新的配置
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// 设置默认过滤指令，如 `"fetch_governor=debug"`
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// 关闭 ANSI 颜色
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, GovernorError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.filter).map_err(|e| {
                GovernorError::invalid(format!("无效的日志过滤指令 {:?}: {}", self.filter, e))
            }),
        }
    }
}

/// 安装全局日志订阅器
///
/// 进程内只能安装一次，重复调用返回错误。
///
/// # 示例
/// ```rust,no_run
/// use fetch_governor::telemetry::{init_tracing, TelemetryConfig};
///
/// init_tracing(&TelemetryConfig::new("crawler").with_filter("fetch_governor=debug")).unwrap();
/// ```
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), GovernorError> {
    let filter = config.env_filter()?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|e| GovernorError::invalid(format!("日志订阅器初始化失败: {}", e)))?;

    info!(service = %config.service_name, "日志系统已初始化");
    Ok(())
}
