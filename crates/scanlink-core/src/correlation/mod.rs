//! 跨边界请求/应答关联。
//!
//! # 模块定位（Why）
//! - 跟踪引擎的部分回调需要宿主给出同步决策（例如“本帧后是否继续启用”），而宿主只能经事件发射器异步应答；
//!   [`EventWithResult`] 把这类交互建模为有超时的单槽阻塞等待；
//! - 另一类回调本身是异步的（引擎提供完成回调），宿主应答到达前需要把回调暂存在缓存中；
//!   [`Continuation`] 把“存放在映射里的闭包”替换为状态明确的一次性续体。
//!
//! # 状态机（What）
//! `Idle → AwaitingResponse → (Resolved | TimedOut | Cancelled) → Idle`
//! - `Resolved`：宿主在超时前调用 `resolve`，等待方拿到该值；
//! - `TimedOut`：超时到期，等待方返回默认值并记录告警；
//! - `Cancelled`：`reset` 强制唤醒等待方，返回默认值。

mod continuation;
mod event;

pub use continuation::Continuation;
pub use event::EventWithResult;

/// 关联槽当前所处的阶段。
///
/// `Resolved` 与 `Cancelled` 只在“应答已写入、等待方尚未被调度”的短暂窗口内可见；
/// 超时由等待方自行判定并立即回到 `Idle`，因此不会被观察到。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorrelationState {
    Idle,
    AwaitingResponse,
    Resolved,
    Cancelled,
}

/// 一次 `emit` 的结局。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CorrelationOutcome<T> {
    /// 宿主在超时前给出了应答。
    Resolved(T),
    /// 等待超时。
    TimedOut,
    /// 被 `reset` 取消，或排队期间关联槽已被重置。
    Cancelled,
    /// 宿主没有订阅该事件，请求未发出。
    NoListener,
}

impl<T> CorrelationOutcome<T> {
    /// 取出应答值，其他结局回退到 `default`。
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            CorrelationOutcome::Resolved(value) => value,
            _ => default,
        }
    }

    /// 是否拿到了宿主应答。
    pub fn is_resolved(&self) -> bool {
        matches!(self, CorrelationOutcome::Resolved(_))
    }
}
