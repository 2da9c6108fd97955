//! # DeferredScheduler：按键去重的延迟过期调度
//!
//! ## 核心意图（Why）
//! - 实体离开跟踪后，其增强状态需在宽限期之后才被回收；期间若实体重新进入跟踪，必须撤销回收；
//! - 同一键在短时间内可能被反复调度，旧任务必须被替换且永不执行。
//!
//! ## 行为契约（What）
//! - `schedule(key, delay, action)`：先取消该键已有任务，再登记新任务；每个键至多一个在途任务；
//! - `cancel(key)`：取消并移除该键任务，无任务时为空操作；
//! - `cancel_all()`：取消全部任务，用于缓存清空；
//! - 动作在时钟的执行上下文中运行，不一定是调用方线程。
//!
//! ## 取消保证（How）
//! - 每次调度分配单调递增的票据，写入并发存储 `pending[key]`；
//! - 定时器触发时以 [`ConcurrentStore::remove_if`] 原子地“票据相同才认领”，认领成功才执行动作；
//! - 取消/重新调度会移除或替换票据，并同时撤销时钟中的定时器；
//! - 认领与取消在同一分片写锁上线性化：同一次调度的动作要么执行一次，要么完全不执行，
//!   旧动作与新动作不可能同时执行。
//!
//! ## 风险提示（Trade-offs）
//! - 若触发方先一步认领成功，随后到达的取消返回 `false`，动作仍会完成；调用方需把
//!   “取消失败”视为“过期已经发生”。

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::store::ConcurrentStore;
use crate::time::{Clock, TimerId};

#[derive(Clone, Copy, Debug)]
struct PendingTask {
    ticket: u64,
    timer: Option<TimerId>,
}

/// 延迟过期调度器。
///
/// # 教案式注释
/// - **意图 (Why)**：把“取消并替换”的单键语义从具体定时器实现中剥离出来；
/// - **契约 (What)**：`K` 需可哈希、可克隆且能跨线程移动，动作需满足 `Send + 'static`；
/// - **风险 (Trade-offs)**：调度器不持有动作结果，动作内部的失败需自行记录。
pub struct DeferredScheduler<K>
where
    K: Eq + Hash,
{
    clock: Arc<dyn Clock>,
    pending: ConcurrentStore<K, PendingTask>,
    next_ticket: AtomicU64,
}

impl<K> DeferredScheduler<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// 基于注入的时钟构造调度器。
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: ConcurrentStore::new(),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// 在 `delay` 之后为 `key` 执行 `action`，替换该键已有的任务。
    ///
    /// # 教案式注释
    /// - **执行 (How)**：
    ///   1. 先以“无定时器”的占位写入新票据，使得极短延迟下的提前触发也能认领成功；
    ///   2. 撤销被替换任务的定时器；
    ///   3. 登记定时器，并仅在票据仍属于本次调度时回填定时器句柄；
    ///   4. 若回填失败（期间已被取消或替换），立即撤销刚登记的定时器，避免残留。
    /// - **契约 (What)**：返回后该键恰有一个由本次调用登记的在途任务，除非并发的取消已将其移除。
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let replaced = self.pending.set(
            key.clone(),
            PendingTask {
                ticket,
                timer: None,
            },
        );
        if let Some(previous) = replaced {
            tracing::trace!(key = ?key, previous = previous.ticket, ticket, "deferred task replaced");
            self.release_timer(previous);
        }

        let pending = self.pending.clone();
        let fire_key = key.clone();
        let timer = self.clock.schedule(
            delay,
            Box::new(move || {
                if pending
                    .remove_if(&fire_key, |task| task.ticket == ticket)
                    .is_some()
                {
                    tracing::debug!(key = ?fire_key, ticket, "deferred task fired");
                    action();
                }
            }),
        );

        let attached = self.pending.update(&key, |task| {
            if task.ticket == ticket {
                task.timer = Some(timer);
                true
            } else {
                false
            }
        });
        if !attached {
            self.clock.cancel(timer);
        }
    }

    /// 取消 `key` 的在途任务；返回是否确有任务被取消。
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(task) => {
                tracing::trace!(key = ?key, ticket = task.ticket, "deferred task cancelled");
                self.release_timer(task);
                true
            }
            None => false,
        }
    }

    /// 取消全部在途任务。
    pub fn cancel_all(&self) {
        for (key, _) in self.pending.all_entries() {
            self.cancel(&key);
        }
    }

    /// `key` 是否存在尚未触发的任务。
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// 在途任务数量。
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn release_timer(&self, task: PendingTask) {
        if let Some(timer) = task.timer {
            self.clock.cancel(timer);
        }
    }
}

impl<K> fmt::Debug for DeferredScheduler<K>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredScheduler")
            .field("next_ticket", &self.next_ticket.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
