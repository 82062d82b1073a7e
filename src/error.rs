//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。
//!
//! 注意：未配置的来源、准入拒绝以及等待超时都不是错误，
//! 它们通过 `Option` / `bool` 返回值表达。

use thiserror::Error;

/// Governor 错误类型
#[derive(Error, Debug)]
pub enum GovernorError {
    /// 配置无效（limit/window 非正数、burst 小于 limit、未知策略等）
    #[error("配置无效: {0}")]
    InvalidConfiguration(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("YAML解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    /// 指标注册错误
    #[cfg(feature = "monitoring")]
    #[error("指标注册错误: {0}")]
    MetricsError(#[from] prometheus::Error),
}

impl GovernorError {
    /// 构造配置无效错误
    pub fn invalid(message: impl Into<String>) -> Self {
        GovernorError::InvalidConfiguration(message.into())
    }
}
