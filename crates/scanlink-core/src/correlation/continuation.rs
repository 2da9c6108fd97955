use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type Callback<V> = Box<dyn FnOnce(Option<V>) + Send + 'static>;

/// 一次性续体：原生引擎交给本层、等待宿主应答后调用的完成回调。
///
/// # 教案式说明
/// - **意图 (Why)**：完成回调在缓存中按实体标识暂存，可能被应答路径、过期路径与 `clear` 同时触碰；
///   把“调用一次”的约束收进类型里，避免重复完成或被悄悄丢弃；
/// - **契约 (What)**：
///   - 克隆共享同一个回调，任一克隆完成后其他克隆的 `complete` 返回 `false`；
///   - `complete(None)` 表示“无结果”，对应宿主未提供该项增强；
///   - 回调在内部锁释放后执行，可安全地重入缓存或续体本身。
pub struct Continuation<V> {
    callback: Arc<Mutex<Option<Callback<V>>>>,
}

impl<V> Continuation<V> {
    /// 包装完成回调。
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Option<V>) + Send + 'static,
    {
        Self {
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    /// 以 `value` 完成续体，返回本次调用是否真正触发了回调。
    pub fn complete(&self, value: Option<V>) -> bool {
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    /// 是否已经完成。
    pub fn is_completed(&self) -> bool {
        self.callback.lock().is_none()
    }
}

impl<V> Clone for Continuation<V> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<V> fmt::Debug for Continuation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("completed", &self.is_completed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn completes_exactly_once_across_clones() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));
        let continuation = {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            Continuation::new(move |value: Option<&'static str>| {
                calls.fetch_add(1, Ordering::SeqCst);
                *seen.lock() = value;
            })
        };
        let twin = continuation.clone();

        assert!(continuation.complete(Some("first")));
        assert!(!twin.complete(Some("second")), "克隆不得再次触发回调");
        assert!(twin.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock(), Some("first"));
    }

    #[test]
    fn callback_may_inspect_its_own_continuation() {
        let slot: Arc<Mutex<Option<Continuation<u8>>>> = Arc::new(Mutex::new(None));
        let observed = Arc::new(Mutex::new(None));
        let continuation = {
            let slot = Arc::clone(&slot);
            let observed = Arc::clone(&observed);
            Continuation::new(move |_| {
                let completed = slot.lock().as_ref().map(Continuation::is_completed);
                *observed.lock() = completed;
            })
        };
        *slot.lock() = Some(continuation.clone());
        assert!(continuation.complete(None));
        assert_eq!(*observed.lock(), Some(true));
    }
}
