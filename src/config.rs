//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 配置模块
//!
//! 定义限流策略、单个来源的限流配置以及可从 YAML/TOML 文件加载的
//! Governor 配置。

use crate::constants::DEFAULT_CLEANUP_INTERVAL;
use crate::error::GovernorError;
use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 限流策略
///
/// 在 Governor 构造时选定，对其管理的所有来源统一生效。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// 令牌桶
    #[default]
    TokenBucket,
    /// 滑动窗口
    SlidingWindow,
    /// 固定窗口
    FixedWindow,
}

impl Strategy {
    /// 策略名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::TokenBucket => "token_bucket",
            Strategy::SlidingWindow => "sliding_window",
            Strategy::FixedWindow => "fixed_window",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = GovernorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "token_bucket" => Ok(Strategy::TokenBucket),
            "sliding_window" => Ok(Strategy::SlidingWindow),
            "fixed_window" => Ok(Strategy::FixedWindow),
            other => Err(GovernorError::invalid(format!(
                "未知的限流策略: {}, 有效值: [token_bucket, sliding_window, fixed_window]",
                other
            ))),
        }
    }
}

/// 单个来源的限流配置
///
/// 通过 [`LimitConfig::new`] 构造，构造时完成校验：
/// - `limit` 必须大于 0
/// - `window` 必须大于 0
/// - `burst` 不能小于 `limit`，缺省时等于 `limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    limit: u64,
    window: Duration,
    burst: u64,
}

impl LimitConfig {
    /// 创建并校验限流配置
    pub fn new(limit: u64, window: Duration, burst: Option<u64>) -> Result<Self, GovernorError> {
        if limit == 0 {
            return Err(GovernorError::invalid("limit 必须大于 0"));
        }
        if window.is_zero() {
            return Err(GovernorError::invalid("window 必须大于 0"));
        }
        let burst = burst.unwrap_or(limit);
        if burst < limit {
            return Err(GovernorError::invalid(format!(
                "burst ({}) 不能小于 limit ({})",
                burst, limit
            )));
        }

        Ok(Self {
            limit,
            window,
            burst,
        })
    }

    /// 窗口内允许的最大消耗
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// 时间窗口
    pub fn window(&self) -> Duration {
        self.window
    }

    /// 令牌桶容量上限
    pub fn burst(&self) -> u64 {
        self.burst
    }

    /// 令牌补充速率（令牌/秒）
    pub fn refill_rate(&self) -> f64 {
        self.limit as f64 / self.window.as_secs_f64()
    }
}

/// 配置文件中的来源条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLimit {
    pub limit: u64,
    #[serde(with = "duration_str")]
    pub window: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<u64>,
}

impl SourceLimit {
    /// 转换为校验后的 [`LimitConfig`]
    pub fn to_limit_config(&self) -> Result<LimitConfig, GovernorError> {
        LimitConfig::new(self.limit, self.window, self.burst)
    }
}

/// Governor 配置
///
/// # 示例
/// ```rust
/// use fetch_governor::config::{GovernorConfig, Strategy};
///
/// let yaml = r#"
/// strategy: sliding_window
/// cleanup_interval: 30s
/// sources:
///   reddit: { limit: 60, window: 1m }
/// "#;
/// let config = GovernorConfig::from_yaml_str(yaml).unwrap();
/// assert_eq!(config.strategy, Strategy::SlidingWindow);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_cleanup_interval", with = "duration_str")]
    pub cleanup_interval: Duration,
    #[serde(default)]
    pub sources: HashMap<String, SourceLimit>,
}

fn default_cleanup_interval() -> Duration {
    DEFAULT_CLEANUP_INTERVAL
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            sources: HashMap::new(),
        }
    }
}

impl GovernorConfig {
    /// 从 YAML 字符串解析并校验
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GovernorError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(toml: &str) -> Result<Self, GovernorError> {
        let config: Self = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载，根据扩展名选择格式
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GovernorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            _ => Err(GovernorError::invalid(format!(
                "不支持的配置文件格式: {}",
                path.display()
            ))),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), GovernorError> {
        if self.cleanup_interval.is_zero() {
            return Err(GovernorError::invalid("cleanup_interval 必须大于 0"));
        }

        for (source, limit) in &self.sources {
            if source.is_empty() {
                return Err(GovernorError::invalid("来源名称不能为空"));
            }
            limit
                .to_limit_config()
                .map_err(|e| GovernorError::invalid(format!("来源[{}]校验失败: {}", source, e)))?;
        }

        Ok(())
    }
}

/// 解析时长字符串
///
/// 支持 `ms`、`s`、`m`、`h`、`d` 后缀，无后缀时按秒处理。
pub fn parse_duration(input: &str) -> Result<Duration, GovernorError> {
    let input = input.trim();
    let split = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| GovernorError::invalid(format!("无效的时长: {:?}", input)))?;

    let seconds = match unit.trim() {
        "ms" => value / 1000.0,
        "" | "s" => value,
        "m" => value * 60.0,
        "h" => value * 3600.0,
        "d" => value * 86400.0,
        other => {
            return Err(GovernorError::invalid(format!(
                "无效的时长单位: {:?}",
                other
            )))
        }
    };

    Duration::try_from_secs_f64(seconds)
        .map_err(|_| GovernorError::invalid(format!("时长超出范围: {:?}", input)))
}

/// 将时长格式化为可被 [`parse_duration`] 解析的字符串
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 || millis == 0 {
        return format!("{}ms", millis);
    }
    let secs = duration.as_secs();
    if secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// 时长字段的 serde 适配
///
/// 序列化为字符串，反序列化时接受字符串或表示秒数的整数。
pub mod duration_str {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Secs(secs) => Ok(Duration::from_secs(secs)),
            Repr::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}
