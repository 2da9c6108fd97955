//! `tracing` 订阅器安装入口。
//!
//! 本库内部只通过 `tracing` 宏输出结构化事件（超时、载荷回退、过期触发等），是否以及如何落地由宿主决定。
//! 宿主若没有自己的订阅器，可在启动时调用一次 [`install`]。

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

use crate::error::LoggingError;

/// 未指定过滤表达式时使用的默认级别。
pub const DEFAULT_FILTER: &str = "info";

/// 安装 `fmt + EnvFilter` 全局订阅器。
///
/// # 教案式说明
/// - **意图（Why）**：为没有日志基础设施的宿主提供一键式入口；
/// - **逻辑（How）**：优先读取 `RUST_LOG`，缺失时使用 `directive`（为空则回退到 [`DEFAULT_FILTER`]）；
/// - **契约（What）**：进程内只能成功调用一次，重复调用或外部已设置订阅器时返回
///   [`LoggingError::SubscriberAlreadySet`]。
pub fn install(directive: &str) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(directive)?,
    };
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn build_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    let directive = if directive.trim().is_empty() {
        DEFAULT_FILTER
    } else {
        directive
    };
    EnvFilter::try_new(directive).map_err(|source| LoggingError::InvalidFilter {
        directive: directive.to_owned(),
        source,
    })
}
