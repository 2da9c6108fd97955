//! 宽限期与结果关联超时的配置。
//!
//! ### 设计目的（Why）
//! - 宽限期（2 秒）与关联超时（默认 2 秒 / 异步模式 600 秒）是观测到的平台取值，
//!   但宿主可能需要按设备性能或交互方式调整，因此以构造参数暴露而非硬编码；
//! - 配置以 JSON 形式由宿主下发，字段缺失时取默认值。
//!
//! ### 契约说明（What）
//! - JSON 字段采用 camelCase 毫秒数：`deletionDelayMs`、`defaultTimeoutMs`、`asyncTimeoutMs`；
//! - 任一时长为零时 [`BindingSettings::from_json_str`] 返回 [`ConfigError::ZeroDuration`]。

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// 默认宽限期：与原生跟踪引擎推迟回收的窗口一致。
pub const DEFAULT_DELETION_DELAY: Duration = Duration::from_secs(2);
/// 同步模式下等待宿主应答的默认超时。
pub const DEFAULT_CORRELATION_TIMEOUT: Duration = Duration::from_secs(2);
/// 异步模式下的超时，宿主可能需要等待用户交互。
pub const ASYNC_CORRELATION_TIMEOUT: Duration = Duration::from_secs(600);

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// 增强缓存配置。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AugmentationSettings {
    #[serde(rename = "deletionDelayMs", deserialize_with = "millis")]
    deletion_delay: Duration,
}

impl AugmentationSettings {
    /// 构造自定义宽限期的配置。
    pub const fn new(deletion_delay: Duration) -> Self {
        Self { deletion_delay }
    }

    /// 实体离开跟踪后保留增强状态的时长。
    pub const fn deletion_delay(&self) -> Duration {
        self.deletion_delay
    }
}

impl Default for AugmentationSettings {
    fn default() -> Self {
        Self::new(DEFAULT_DELETION_DELAY)
    }
}

/// 结果关联配置。
///
/// - `default_timeout`：同步模式，跟踪线程最多被阻塞的时长；
/// - `async_timeout`：宿主显式开启异步模式后的等待上限。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CorrelationSettings {
    #[serde(rename = "defaultTimeoutMs", deserialize_with = "millis")]
    default_timeout: Duration,
    #[serde(rename = "asyncTimeoutMs", deserialize_with = "millis")]
    async_timeout: Duration,
}

impl CorrelationSettings {
    /// 构造自定义超时的配置。
    pub const fn new(default_timeout: Duration, async_timeout: Duration) -> Self {
        Self {
            default_timeout,
            async_timeout,
        }
    }

    /// 同步模式超时。
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 异步模式超时。
    pub const fn async_timeout(&self) -> Duration {
        self.async_timeout
    }
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_TIMEOUT, ASYNC_CORRELATION_TIMEOUT)
    }
}

/// 绑定层完整配置。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BindingSettings {
    pub augmentation: AugmentationSettings,
    pub correlation: CorrelationSettings,
}

impl BindingSettings {
    /// 从宿主下发的 JSON 文本解析配置并校验。
    ///
    /// # 教案式说明
    /// - **执行 (How)**：`serde_json` 解析后逐项检查时长非零；
    /// - **契约 (What)**：缺失字段取默认值；空对象 `{}` 等价于 [`BindingSettings::default`]。
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 校验所有时长字段非零。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("augmentation.deletionDelayMs", self.augmentation.deletion_delay),
            ("correlation.defaultTimeoutMs", self.correlation.default_timeout),
            ("correlation.asyncTimeoutMs", self.correlation.async_timeout),
        ];
        match checks.iter().find(|(_, value)| value.is_zero()) {
            Some((field, _)) => Err(ConfigError::ZeroDuration { field: *field }),
            None => Ok(()),
        }
    }
}
