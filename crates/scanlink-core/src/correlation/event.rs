use std::fmt;
use std::mem;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{CorrelationOutcome, CorrelationState};
use crate::config::CorrelationSettings;
use crate::emitter::{Emitter, Payload};

enum Phase<T> {
    Idle,
    Awaiting,
    Resolved(T),
    Cancelled,
}

struct Slot<T> {
    phase: Phase<T>,
    timeout: Duration,
    /// 重置纪元：每次 `reset` 加一，与 `phase` 同锁读写。
    epoch: u64,
}

/// 绑定单个事件名的阻塞式结果关联槽。
///
/// # 设计背景（Why）
/// - 原生回调线程在返回前需要宿主的决策值，但宿主只能异步应答；
/// - 跟踪引擎的回调线程不能被永久挂起，因此等待必须有超时，并且可被会话拆除路径强制唤醒。
///
/// # 契约说明（What）
/// - 同一实例同一时刻只有一个在途请求，后续调用方在内部互斥锁上排队；
/// - `resolve` 只在 `AwaitingResponse` 阶段生效，空闲时或重复应答均被忽略；
/// - `reset` 唤醒当前等待方与所有排队者，令其返回默认值；
/// - 超时可随时调整，对下一次 `emit` 生效。
///
/// # 风险提示（Trade-offs）
/// - 在 `Emitter::emit` 的同步回调中再次对同一实例调用 `emit` 会在排队锁上自锁；
///   宿主应答必须经 `resolve` 回传，而不是重入发起新请求。
pub struct EventWithResult<T> {
    name: String,
    settings: CorrelationSettings,
    call: Mutex<()>,
    slot: Mutex<Slot<T>>,
    signal: Condvar,
}

impl<T: Send> EventWithResult<T> {
    /// 以默认配置构造。
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, CorrelationSettings::default())
    }

    /// 以指定配置构造，初始超时取 `settings.default_timeout()`。
    pub fn with_settings(name: impl Into<String>, settings: CorrelationSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            call: Mutex::new(()),
            slot: Mutex::new(Slot {
                phase: Phase::Idle,
                timeout: settings.default_timeout(),
                epoch: 0,
            }),
            signal: Condvar::new(),
        }
    }

    /// 绑定的事件名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 当前超时。
    pub fn timeout(&self) -> Duration {
        self.slot.lock().timeout
    }

    /// 调整超时，对下一次请求生效。
    pub fn set_timeout(&self, timeout: Duration) {
        self.slot.lock().timeout = timeout;
    }

    /// 切换到异步模式：宿主可能需要较长时间（例如等待用户确认）才能应答。
    pub fn enable_async(&self) {
        self.set_timeout(self.settings.async_timeout());
    }

    /// 回到同步模式的默认超时。
    pub fn disable_async(&self) {
        self.set_timeout(self.settings.default_timeout());
    }

    /// 当前阶段。
    pub fn state(&self) -> CorrelationState {
        match self.slot.lock().phase {
            Phase::Idle => CorrelationState::Idle,
            Phase::Awaiting => CorrelationState::AwaitingResponse,
            Phase::Resolved(_) => CorrelationState::Resolved,
            Phase::Cancelled => CorrelationState::Cancelled,
        }
    }

    /// 发布请求并阻塞等待应答，非 `Resolved` 结局返回 `default`。
    pub fn emit<E>(&self, emitter: &E, payload: Payload, default: T) -> T
    where
        E: Emitter + ?Sized,
    {
        self.emit_with_outcome(emitter, payload).unwrap_or(default)
    }

    /// 发布请求并阻塞等待，返回具体结局。
    ///
    /// 监听查询使用事件名本身，视图级订阅见 [`EventWithResult::emit_for_view_with_outcome`]。
    pub fn emit_with_outcome<E>(&self, emitter: &E, payload: Payload) -> CorrelationOutcome<T>
    where
        E: Emitter + ?Sized,
    {
        let listening = emitter.has_listener(&self.name);
        self.dispatch(emitter, payload, listening)
    }

    /// 以视图级监听者（`"{name}.{view_id}"`）为前提发布请求，非 `Resolved` 结局返回 `default`。
    pub fn emit_for_view<E>(&self, emitter: &E, view_id: i64, payload: Payload, default: T) -> T
    where
        E: Emitter + ?Sized,
    {
        self.emit_for_view_with_outcome(emitter, view_id, payload)
            .unwrap_or(default)
    }

    /// 以视图级监听者为前提发布请求并返回具体结局；发布的事件名不带视图后缀。
    pub fn emit_for_view_with_outcome<E>(
        &self,
        emitter: &E,
        view_id: i64,
        payload: Payload,
    ) -> CorrelationOutcome<T>
    where
        E: Emitter + ?Sized,
    {
        let listening = emitter.has_view_listener(view_id, &self.name);
        self.dispatch(emitter, payload, listening)
    }

    /// # 教案式说明
    /// - **执行 (How)**：
    ///   1. 无监听者时直接返回 [`CorrelationOutcome::NoListener`]，不阻塞；
    ///   2. 记录当前重置纪元后获取排队锁；在同一次槽锁内比较纪元并置为 `Awaiting`，
    ///      排队期间或进入等待前发生过 `reset` 都返回 `Cancelled`；
    ///   3. 先把槽置为 `Awaiting` 再发布事件，保证发射器同步回调中的 `resolve` 不会丢失；
    ///   4. 在条件变量上等待至截止时间，每次醒来重新检查阶段，兼容伪唤醒。
    /// - **契约 (What)**：返回时槽已回到 `Idle`。
    fn dispatch<E>(&self, emitter: &E, payload: Payload, listening: bool) -> CorrelationOutcome<T>
    where
        E: Emitter + ?Sized,
    {
        if !listening {
            tracing::trace!(event = %self.name, "no listener; request skipped");
            return CorrelationOutcome::NoListener;
        }

        let epoch = self.slot.lock().epoch;
        let _call = self.call.lock();
        let Some(timeout) = self.arm(epoch) else {
            tracing::debug!(event = %self.name, "queued request cancelled by reset");
            return CorrelationOutcome::Cancelled;
        };
        emitter.emit(&self.name, payload);
        let deadline = Instant::now() + timeout;

        let mut slot = self.slot.lock();
        loop {
            match mem::replace(&mut slot.phase, Phase::Idle) {
                Phase::Resolved(value) => return CorrelationOutcome::Resolved(value),
                Phase::Cancelled | Phase::Idle => {
                    tracing::debug!(event = %self.name, "pending request cancelled");
                    return CorrelationOutcome::Cancelled;
                }
                Phase::Awaiting => {
                    if Instant::now() >= deadline {
                        tracing::warn!(
                            event = %self.name,
                            timeout_ms = timeout.as_millis() as u64,
                            "host did not answer in time; falling back to default"
                        );
                        return CorrelationOutcome::TimedOut;
                    }
                    slot.phase = Phase::Awaiting;
                    self.signal.wait_until(&mut slot, deadline);
                }
            }
        }
    }

    /// 纪元未变时进入等待阶段并返回本次超时；纪元已变返回 `None`。
    ///
    /// 比较与置位在同一临界区内完成，`reset` 要么早于它（纪元不符），要么晚于它（看到 `Awaiting`）。
    fn arm(&self, epoch: u64) -> Option<Duration> {
        let mut slot = self.slot.lock();
        if slot.epoch != epoch {
            return None;
        }
        slot.phase = Phase::Awaiting;
        Some(slot.timeout)
    }

    /// 投递宿主应答；仅在等待阶段生效，返回是否被采纳。
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if matches!(slot.phase, Phase::Awaiting) {
            slot.phase = Phase::Resolved(value);
            self.signal.notify_all();
            true
        } else {
            tracing::debug!(event = %self.name, "resolution ignored; no request awaiting");
            false
        }
    }

    /// 强制唤醒等待方与排队者，令其返回默认值。任何时刻调用都是安全的。
    pub fn reset(&self) {
        let mut slot = self.slot.lock();
        slot.epoch = slot.epoch.wrapping_add(1);
        if matches!(slot.phase, Phase::Awaiting | Phase::Resolved(_)) {
            slot.phase = Phase::Cancelled;
            self.signal.notify_all();
        }
    }
}

impl<T> fmt::Debug for EventWithResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWithResult")
            .field("name", &self.name)
            .field("timeout", &self.slot.lock().timeout)
            .finish_non_exhaustive()
    }
}
