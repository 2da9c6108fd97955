//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 本库对外边界遵循“解析失败回退默认值、查找未命中返回 `None`、超时返回默认值”的策略，
//!   错误类型只出现在启动期的配置加载与日志安装路径上；
//! - 集中定义便于宿主在初始化阶段统一处理。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，可直接交给上层错误框架；
//! - 保留底层错误作为 `source`，便于排障。

use thiserror::Error;

/// 配置加载错误。
///
/// # 教案式说明
/// - **意图 (Why)**：宽限期与超时为零会让过期立即发生或等待立即失败，属于配置事故，应在启动期拒绝；
/// - **契约 (What)**：`Parse` 保留 `serde_json` 的定位信息；`ZeroDuration` 指出具体字段名。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON 文本无法解析为配置结构。
    #[error("binding settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// 某个时长字段为零。
    #[error("`{field}` must be greater than zero")]
    ZeroDuration { field: &'static str },
}

/// 日志订阅器安装错误。
#[derive(Debug, Error)]
pub enum LoggingError {
    /// 过滤表达式无法解析。
    #[error("invalid log filter `{directive}`: {source}")]
    InvalidFilter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// 进程内已存在全局订阅器。
    #[error("a global tracing subscriber is already installed")]
    SubscriberAlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}
