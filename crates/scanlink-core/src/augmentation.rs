//! # AugmentationCache：随跟踪进出自动回收的增强缓存
//!
//! ## 核心意图（Why）
//! - 宿主为每个被跟踪实体提供高亮与标注，并以异步方式应答引擎的提供者回调；
//!   这些状态都以 [`StableId`] 为键，需要跨越跟踪抖动保留，又不能无限增长；
//! - 实体离开跟踪时不立即删除，而是在宽限期后回收；期间重新进入跟踪则撤销回收。
//!
//! ## 行为契约（What）
//! - 四个子缓存（标注、高亮、高亮回调、标注回调）共用同一回收计划：回收时从全部子缓存移除；
//! - 处于跟踪中的稳定标识没有待执行的回收；
//! - 每个稳定标识至多一个待执行回收，重复调度即替换；
//! - `clear()` 之后缓存与新建实例等价。
//!
//! ## 执行方式（How）
//! - 子缓存均为 [`ConcurrentStore`]，回收调度委托给 [`DeferredScheduler`]；
//! - 回收动作只持有子缓存状态的弱引用，缓存被释放后迟到的定时器不会复活它；
//! - 缓存释放时撤销全部待执行回收；
//! - 回收与 `clear()` 移除提供者回调记录时先调用 [`PendingCallback::cancel`]，
//!   尚未完成的回调以“无结果”收尾，而不是被悄悄丢弃。

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::config::AugmentationSettings;
use crate::correlation::Continuation;
use crate::ids::{StableId, TrackingId};
use crate::scheduler::DeferredScheduler;
use crate::store::ConcurrentStore;
use crate::time::Clock;

/// 暂存于缓存、等待宿主应答的提供者回调记录。
///
/// 记录被回收或清空时缓存调用 `cancel`，实现者应以“无结果”完成其中尚未完成的续体；
/// 已完成的记录上调用 `cancel` 必须是无操作。
pub trait PendingCallback {
    fn cancel(&self);
}

impl<V> PendingCallback for Continuation<V> {
    fn cancel(&self) {
        self.complete(None);
    }
}

struct CacheState<H, A, HC, AC> {
    annotations: ConcurrentStore<StableId, A>,
    highlights: ConcurrentStore<StableId, H>,
    highlight_callbacks: ConcurrentStore<StableId, HC>,
    annotation_callbacks: ConcurrentStore<StableId, AC>,
    tracked: ConcurrentStore<TrackingId, StableId>,
}

impl<H, A, HC, AC> CacheState<H, A, HC, AC>
where
    H: Clone,
    A: Clone,
    HC: PendingCallback + Clone,
    AC: PendingCallback + Clone,
{
    fn new() -> Self {
        Self {
            annotations: ConcurrentStore::new(),
            highlights: ConcurrentStore::new(),
            highlight_callbacks: ConcurrentStore::new(),
            annotation_callbacks: ConcurrentStore::new(),
            tracked: ConcurrentStore::new(),
        }
    }

    fn is_tracked(&self, stable_id: &StableId) -> bool {
        self.tracked
            .all_entries()
            .iter()
            .any(|(_, tracked)| tracked == stable_id)
    }

    fn perform_deletion(&self, stable_id: &StableId) {
        if self.is_tracked(stable_id) {
            tracing::debug!(%stable_id, "expiry skipped; entity tracked again");
            return;
        }
        self.annotations.remove(stable_id);
        self.highlights.remove(stable_id);
        if let Some(callback) = self.highlight_callbacks.remove(stable_id) {
            callback.cancel();
        }
        if let Some(callback) = self.annotation_callbacks.remove(stable_id) {
            callback.cancel();
        }
        tracing::debug!(%stable_id, "augmentations expired");
    }

    fn remove_all(&self) {
        self.annotations.remove_all();
        self.highlights.remove_all();
        self.tracked.remove_all();
        let highlight_callbacks = self.highlight_callbacks.drain();
        let annotation_callbacks = self.annotation_callbacks.drain();
        for (_, callback) in highlight_callbacks {
            callback.cancel();
        }
        for (_, callback) in annotation_callbacks {
            callback.cancel();
        }
    }
}

/// 以稳定标识为键的增强缓存。
///
/// # 教案式注释
/// - **意图 (Why)**：集中维护一个视图内所有实体的增强状态及其延迟回收；
/// - **契约 (What)**：
///   - `H`/`A` 为高亮与标注的视图模型，`HC`/`AC` 为两类提供者回调记录；
///   - 所有方法可在任意线程并发调用，单键操作线性化；
///   - 查找未命中返回 `None`，不会产生错误；
///   - 提供者回调记录离开缓存（回收或 `clear`）时必被 `cancel` 一次；
/// - **风险 (Trade-offs)**：`is_tracked` 需扫描跟踪映射，规模与当前可见实体数成正比。
pub struct AugmentationCache<H, A, HC, AC>
where
    H: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    HC: PendingCallback + Clone + Send + Sync + 'static,
    AC: PendingCallback + Clone + Send + Sync + 'static,
{
    state: Arc<CacheState<H, A, HC, AC>>,
    scheduler: DeferredScheduler<StableId>,
    deletion_delay: Duration,
}

impl<H, A, HC, AC> AugmentationCache<H, A, HC, AC>
where
    H: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    HC: PendingCallback + Clone + Send + Sync + 'static,
    AC: PendingCallback + Clone + Send + Sync + 'static,
{
    /// 以注入的时钟与配置构造缓存。
    pub fn new(clock: Arc<dyn Clock>, settings: AugmentationSettings) -> Self {
        Self {
            state: Arc::new(CacheState::new()),
            scheduler: DeferredScheduler::new(clock),
            deletion_delay: settings.deletion_delay(),
        }
    }

    /// 宽限期。
    pub fn deletion_delay(&self) -> Duration {
        self.deletion_delay
    }

    /// 同步一次会话更新的进出集合。
    ///
    /// # 教案式注释
    /// - **执行 (How)**：
    ///   1. 先处理离开：移除实例映射，若对应稳定标识不再被任何实例跟踪，则调度宽限期后的回收；
    ///   2. 再处理进入：撤销该稳定标识的待执行回收并记录实例映射；
    ///      若实例号此前指向另一稳定标识且后者因此失去跟踪，同样为后者调度回收。
    /// - **契约 (What)**：未知的离开实例被静默忽略；同一更新中先离开后以新实例号进入的实体不会被回收。
    pub fn on_session_update(&self, added: &[(TrackingId, StableId)], removed: &[TrackingId]) {
        for tracking_id in removed {
            match self.state.tracked.remove(tracking_id) {
                Some(stable_id) => self.release(stable_id),
                None => tracing::trace!(%tracking_id, "removal of unknown tracking id ignored"),
            }
        }

        for (tracking_id, stable_id) in added {
            self.scheduler.cancel(stable_id);
            if let Some(previous) = self.state.tracked.set(*tracking_id, stable_id.clone()) {
                if &previous != stable_id {
                    self.release(previous);
                }
            }
        }
    }

    fn release(&self, stable_id: StableId) {
        if self.state.is_tracked(&stable_id) {
            return;
        }
        tracing::trace!(%stable_id, delay_ms = self.deletion_delay.as_millis() as u64, "expiry scheduled");
        let state: Weak<CacheState<H, A, HC, AC>> = Arc::downgrade(&self.state);
        let key = stable_id.clone();
        self.scheduler.schedule(stable_id, self.deletion_delay, move || {
            if let Some(state) = state.upgrade() {
                state.perform_deletion(&key);
            }
        });
    }

    /// 稳定标识当前是否被任一实例跟踪。
    pub fn is_tracked(&self, stable_id: &StableId) -> bool {
        self.state.is_tracked(stable_id)
    }

    /// 实例号当前映射到的稳定标识。
    pub fn stable_id_for(&self, tracking_id: TrackingId) -> Option<StableId> {
        self.state.tracked.get(&tracking_id)
    }

    /// 稳定标识是否有待执行的回收。
    pub fn is_pending_deletion(&self, stable_id: &StableId) -> bool {
        self.scheduler.is_pending(stable_id)
    }

    pub fn add_highlight(&self, stable_id: StableId, highlight: H) {
        self.state.highlights.set(stable_id, highlight);
    }

    pub fn highlight(&self, stable_id: &StableId) -> Option<H> {
        self.state.highlights.get(stable_id)
    }

    pub fn add_annotation(&self, stable_id: StableId, annotation: A) {
        self.state.annotations.set(stable_id, annotation);
    }

    pub fn annotation(&self, stable_id: &StableId) -> Option<A> {
        self.state.annotations.get(stable_id)
    }

    /// 暂存高亮提供者回调，等待宿主应答。
    pub fn add_highlight_provider_callback(&self, stable_id: StableId, callback: HC) {
        self.state.highlight_callbacks.set(stable_id, callback);
    }

    pub fn highlight_provider_callback(&self, stable_id: &StableId) -> Option<HC> {
        self.state.highlight_callbacks.get(stable_id)
    }

    /// 暂存标注提供者回调；与高亮回调分属独立的命名空间。
    pub fn add_annotation_provider_callback(&self, stable_id: StableId, callback: AC) {
        self.state.annotation_callbacks.set(stable_id, callback);
    }

    pub fn annotation_provider_callback(&self, stable_id: &StableId) -> Option<AC> {
        self.state.annotation_callbacks.get(stable_id)
    }

    /// 撤销全部待执行回收并清空所有子缓存；尚未完成的提供者回调以“无结果”完成。
    pub fn clear(&self) {
        self.scheduler.cancel_all();
        self.state.remove_all();
        tracing::debug!("augmentation cache cleared");
    }
}

impl<H, A, HC, AC> Drop for AugmentationCache<H, A, HC, AC>
where
    H: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    HC: PendingCallback + Clone + Send + Sync + 'static,
    AC: PendingCallback + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.scheduler.cancel_all();
    }
}

impl<H, A, HC, AC> fmt::Debug for AugmentationCache<H, A, HC, AC>
where
    H: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
    HC: PendingCallback + Clone + Send + Sync + 'static,
    AC: PendingCallback + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AugmentationCache")
            .field("tracked", &self.state.tracked.len())
            .field("highlights", &self.state.highlights.len())
            .field("annotations", &self.state.annotations.len())
            .field("pending_deletions", &self.scheduler.pending_len())
            .field("deletion_delay", &self.deletion_delay)
            .finish()
    }
}
