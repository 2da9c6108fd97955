//! # ConcurrentStore：并发键值存储
//!
//! ## 核心意图（Why）
//! - 跟踪线程（生产者）与 UI/回调线程（消费者）会同时读写同一批缓存条目，需要一个对单键操作具备原子语义的映射；
//! - 作为全部增强缓存与调度器的唯一共享可变结构，其余组件只持有私有状态或委托给它。
//!
//! ## 行为契约（What）
//! - `set`：插入或覆盖；
//! - `get`：返回当前值的克隆，不暴露分片 guard，调用方无需关心持锁时间；
//! - `remove`：原子移除并返回旧值；
//! - `remove_if`：仅当谓词成立时原子移除，调度器据此实现“触发与取消只有一方胜出”；
//! - `remove_all`：清空；
//! - `all_entries`：拷贝快照，迭代期间的并发写不会死锁。
//!
//! ## 风险提示（Trade-offs）
//! - `get` 以克隆换取无 guard 的 API，值类型应当廉价可克隆（`Arc`、小结构体）；
//! - `all_entries` 逐分片加读锁，得到的快照不是全局一致的时间点视图，仅保证每个条目自身一致。

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// 基于 `DashMap` 的线程安全键值存储。
///
/// # 教案式注释
/// - **意图 (Why)**：封装并发映射，避免上层直接操作 `DashMap` guard；
/// - **契约 (What)**：所有操作均为全函数，缺失以 `None` 表达，不产生错误；
/// - **执行 (How)**：内部持有 `Arc<DashMap>`，`Clone` 得到指向同一存储的句柄。
#[derive(Debug)]
pub struct ConcurrentStore<K, V>
where
    K: Eq + Hash,
{
    inner: Arc<DashMap<K, V>>,
}

impl<K, V> Clone for ConcurrentStore<K, V>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for ConcurrentStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }
}

impl<K, V> ConcurrentStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// 构造空的存储。
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖键对应的值，返回被覆盖的旧值。
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    /// 读取当前值的克隆。
    ///
    /// - **契约 (What)**：分片读锁仅在克隆期间持有，返回后不再阻塞同分片写者。
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// 是否存在该键。
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// 原子移除并返回旧值。
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, value)| value)
    }

    /// 仅当 `predicate` 对当前值成立时移除。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：谓词判定与移除在同一分片写锁内完成，与 `set`/`remove` 线性化，
    ///   调度器借此比较票据，保证过期触发与取消之间只有一方生效；
    /// - **契约 (What)**：返回被移除的值；键不存在或谓词不成立时返回 `None` 且不修改存储；
    /// - **风险 (Trade-offs)**：谓词在持锁状态下执行，不得回调本存储。
    pub fn remove_if(&self, key: &K, predicate: impl FnOnce(&V) -> bool) -> Option<V> {
        self.inner
            .remove_if(key, |_, value| predicate(value))
            .map(|(_, value)| value)
    }

    /// 在分片写锁内就地修改已存在的值，返回 `f` 的结果；键不存在时返回 `false`。
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V) -> bool) -> bool {
        self.inner
            .get_mut(key)
            .is_some_and(|mut entry| f(entry.value_mut()))
    }

    /// 清空所有条目。
    pub fn remove_all(&self) {
        self.inner.clear();
    }

    /// 移除并返回全部条目。
    ///
    /// - **契约 (What)**：逐分片在写锁内取走条目，与并发的单键操作线性化；
    ///   调用期间新插入且尚未被扫描到的条目可能一并取走，也可能保留。
    pub fn drain(&self) -> Vec<(K, V)> {
        let mut drained = Vec::new();
        self.inner.retain(|key, value| {
            drained.push((key.clone(), value.clone()));
            false
        });
        drained
    }

    /// 生成 `(键, 值)` 快照。
    pub fn all_entries(&self) -> Vec<(K, V)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// 当前条目数量。
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// 存储是否为空。
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn set_get_remove_round() {
        let store = ConcurrentStore::<u32, &'static str>::new();
        assert_eq!(store.set(1, "a"), None);
        assert_eq!(store.set(1, "b"), Some("a"), "覆盖写应返回旧值");
        assert_eq!(store.get(&1), Some("b"));
        assert_eq!(store.remove(&1), Some("b"));
        assert_eq!(store.remove(&1), None, "重复移除应返回缺失");
        assert!(store.is_empty());
    }

    #[test]
    fn remove_if_respects_predicate() {
        let store = ConcurrentStore::<&'static str, u64>::new();
        store.set("k", 7);
        assert_eq!(store.remove_if(&"k", |v| *v == 8), None);
        assert!(store.contains_key(&"k"), "谓词不成立时不得移除");
        assert_eq!(store.remove_if(&"k", |v| *v == 7), Some(7));
        assert!(!store.contains_key(&"k"));
    }

    #[test]
    fn drain_hands_back_every_entry() {
        let store = ConcurrentStore::<u32, u32>::new();
        for i in 0..10 {
            store.set(i, i * 10);
        }
        let mut drained = store.drain();
        drained.sort_unstable();
        assert_eq!(drained.len(), 10);
        assert_eq!(drained[3], (3, 30));
        assert!(store.is_empty(), "取走后存储应为空");
        assert!(store.drain().is_empty());
    }

    #[test]
    fn snapshot_while_writers_run() {
        let store = ConcurrentStore::<u32, u32>::new();
        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..1_000 {
                    store.set(i % 64, i);
                    if i % 3 == 0 {
                        store.remove(&(i % 64));
                    }
                }
            })
        };
        for _ in 0..50 {
            let snapshot = store.all_entries();
            assert!(snapshot.len() <= 64);
        }
        writer.join().expect("写线程不应 panic");
        store.remove_all();
        assert_eq!(store.len(), 0);
        assert!(store.all_entries().is_empty());
    }
}
