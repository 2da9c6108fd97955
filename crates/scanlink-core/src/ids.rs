//! 标识符契约：区分跨会话稳定的实体标识与跟踪引擎分配的短暂实例标识。
//!
//! # 设计动机（Why）
//! - 跟踪引擎在目标短暂丢失后会以新的 [`TrackingId`] 重新报告同一实体，缓存若以其为键将无法跨越抖动；
//! - 以新类型区分两类标识，避免把整数实例号误当作缓存键使用。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 实体的稳定标识（内容 + 码制），作为所有增强缓存的键。
///
/// # 契约定义（What）
/// - 内部以 `Arc<str>` 保存，克隆为引用计数递增，可在多线程缓存间零拷贝共享；
/// - 本类型不校验内容，格式由上层（例如条码适配层）负责生成；
/// - 序列化形态为裸字符串。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId(Arc<str>);

impl StableId {
    /// 由任意字符串构造稳定标识。
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    /// 返回底层字符串切片。
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StableId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StableId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

impl From<&str> for StableId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StableId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// 跟踪引擎为当前可见实例分配的整数标识。
///
/// 跟踪停止后该值可能被复用，因此只用于维护“实例 → 稳定标识”的短期映射。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingId(i64);

impl TrackingId {
    /// 包装引擎给出的原始整数。
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// 取回原始整数。
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TrackingId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
