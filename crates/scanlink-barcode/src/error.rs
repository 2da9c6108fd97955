//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 宿主下发的 JSON 应答可能残缺或格式错误；这些错误只在适配层内部流转，
//!   对外一律回退为“无结果”并记录日志，不会跨越绑定边界抛出；
//! - 集中定义便于在日志中给出一致的字段名与原因。

use thiserror::Error;

/// 宿主应答载荷的解析错误。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“整体无法解析”“结构不符”“缺少必需字段”“字段取值非法”四类问题，便于排障；
/// - **契约 (What)**：字段名为宿主协议中的 camelCase 名称；
/// - **风险 (Trade-offs)**：调用方收到错误后应完成对应续体（传入 `None`），避免原生回调悬挂。
#[derive(Debug, Error)]
pub enum PayloadError {
    /// 文本不是合法 JSON。
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// 顶层不是 JSON 对象。
    #[error("payload must be a JSON object")]
    NotAnObject,

    /// 缺少必需字段。
    #[error("payload field `{field}` is missing")]
    MissingField { field: &'static str },

    /// 字段存在但取值不符合预期。
    #[error("payload field `{field}` is invalid: expected {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}
