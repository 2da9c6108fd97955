//! 事件发射器契约：向宿主层发布 `名称 + JSON 对象` 形式的请求或通知。
//!
//! # 设计动机（Why）
//! - 宿主侧的分发机制（桥接线程、消息通道）不在本库范围内，这里只约束两项能力：发布与监听查询；
//! - 视图级监听器以 `"{事件名}.{视图编号}"` 命名，同一事件可被多个视图独立订阅。
//!
//! # 结构概览（What）
//! - [`Emitter`]：发布/查询 trait；
//! - [`RecordingEmitter`]：线程安全的内存实现，记录每次发布并允许注入应答钩子。

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

/// 事件负载：字符串键到任意 JSON 值的映射。
pub type Payload = Map<String, Value>;

/// 宿主层事件发射器。
///
/// # 契约说明（What）
/// - `emit`：即发即弃，实现不得阻塞调用方等待宿主处理；
/// - `has_listener`：宿主当前是否订阅了该事件名；
/// - `has_view_listener`：视图级订阅查询，默认拼接 `"{name}.{view_id}"` 后委托给 `has_listener`。
pub trait Emitter: Send + Sync {
    /// 发布事件。
    fn emit(&self, name: &str, payload: Payload);

    /// 查询事件是否有监听者。
    fn has_listener(&self, name: &str) -> bool;

    /// 查询视图级监听者。
    fn has_view_listener(&self, view_id: i64, name: &str) -> bool {
        self.has_listener(&format!("{name}.{view_id}"))
    }
}

impl<E: Emitter + ?Sized> Emitter for Arc<E> {
    fn emit(&self, name: &str, payload: Payload) {
        (**self).emit(name, payload);
    }

    fn has_listener(&self, name: &str) -> bool {
        (**self).has_listener(name)
    }

    fn has_view_listener(&self, view_id: i64, name: &str) -> bool {
        (**self).has_view_listener(view_id, name)
    }
}

/// 一次被记录的发布。
#[derive(Clone, Debug, PartialEq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Payload,
}

type EmitHook = Arc<dyn Fn(&str, &Payload) + Send + Sync>;

/// 内存录制发射器。
///
/// # 教案式说明
/// - **意图 (Why)**：宿主集成测试与本库测试都需要观察发布序列，并在请求发出时模拟宿主应答；
/// - **契约 (What)**：
///   - 监听集合默认为空，`listen_all` 打开后对任意事件名返回 `true`；
///   - 钩子在 `emit` 调用线程上同步执行，发生在事件记录之后；
///   - 所有方法可跨线程并发调用；
/// - **风险 (Trade-offs)**：记录无上限增长，仅适合测试与调试场景。
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<EmittedEvent>>>,
    listeners: Arc<RwLock<HashSet<String>>>,
    listen_all: Arc<RwLock<bool>>,
    hook: Arc<RwLock<Option<EmitHook>>>,
}

impl RecordingEmitter {
    /// 构造无监听者的发射器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 对任意事件名都报告存在监听者。
    pub fn listening_to_all() -> Self {
        let emitter = Self::new();
        *emitter.listen_all.write() = true;
        emitter
    }

    /// 登记监听者。
    pub fn add_listener(&self, name: impl Into<String>) {
        self.listeners.write().insert(name.into());
    }

    /// 登记视图级监听者。
    pub fn add_view_listener(&self, view_id: i64, name: &str) {
        self.add_listener(format!("{name}.{view_id}"));
    }

    /// 移除监听者。
    pub fn remove_listener(&self, name: &str) {
        self.listeners.write().remove(name);
    }

    /// 设置发布钩子，替换已有钩子。
    pub fn on_emit<F>(&self, hook: F)
    where
        F: Fn(&str, &Payload) + Send + Sync + 'static,
    {
        *self.hook.write() = Some(Arc::new(hook));
    }

    /// 已记录事件的快照。
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().clone()
    }

    /// 指定名称的事件快照。
    pub fn events_named(&self, name: &str) -> Vec<EmittedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.name == name)
            .cloned()
            .collect()
    }

    /// 清空记录。
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Emitter for RecordingEmitter {
    fn emit(&self, name: &str, payload: Payload) {
        self.events.lock().push(EmittedEvent {
            name: name.to_owned(),
            payload: payload.clone(),
        });
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            hook(name, &payload);
        }
    }

    fn has_listener(&self, name: &str) -> bool {
        *self.listen_all.read() || self.listeners.read().contains(name)
    }
}

impl fmt::Debug for RecordingEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingEmitter")
            .field("events", &self.events.lock().len())
            .field("listeners", &*self.listeners.read())
            .finish_non_exhaustive()
    }
}
