//! 跟踪会话监听：把每帧的进出增量同步到增强缓存，并向宿主索取“是否继续启用”的决策。

use std::sync::Arc;

use serde_json::{Value, json};

use scanlink_core::{CorrelationSettings, Emitter, EventWithResult, Payload};

use crate::factory::{ArCache, AugmentationFactory};
use crate::model::SessionUpdate;

/// 会话更新事件；宿主以 `"{事件名}.{viewId}"` 订阅。
pub const DID_UPDATE_SESSION: &str = "BarcodeArListener.didUpdateSession";

/// 会话监听器。
///
/// # 教案式说明
/// - **意图 (Why)**：引擎在跟踪线程上同步回调，回调返回前需要宿主给出启用决策；
/// - **契约 (What)**：
///   - 增量总是写入缓存，即使宿主未订阅，过期回收也照常进行；
///   - 仅当存在视图级订阅时才发布事件并阻塞等待，决策默认值为 `true`；
///   - `reset_session` 可在任意线程调用，立即唤醒阻塞中的跟踪线程。
pub struct SessionListener<F: AugmentationFactory> {
    emitter: Arc<dyn Emitter>,
    view_id: i64,
    cache: Arc<ArCache<F>>,
    session_updated: EventWithResult<bool>,
}

impl<F: AugmentationFactory> SessionListener<F> {
    pub fn new(
        emitter: Arc<dyn Emitter>,
        view_id: i64,
        cache: Arc<ArCache<F>>,
        settings: CorrelationSettings,
    ) -> Self {
        Self {
            emitter,
            view_id,
            cache,
            session_updated: EventWithResult::with_settings(DID_UPDATE_SESSION, settings),
        }
    }

    /// 处理一帧会话更新，返回宿主的启用决策。
    pub fn on_session_update(&self, update: &SessionUpdate) -> bool {
        self.cache
            .on_session_update(&update.added_pairs(), &update.removed_tracked_barcodes);

        let mut payload = Payload::new();
        payload.insert("session".to_owned(), Value::String(update.to_json_string()));
        payload.insert("frameId".to_owned(), json!(update.frame_sequence_id.to_string()));
        payload.insert("viewId".to_owned(), json!(self.view_id));
        self.session_updated
            .emit_for_view(&*self.emitter, self.view_id, payload, true)
    }

    /// 宿主应答启用决策；没有等待中的请求时返回 `false`。
    pub fn finish_did_update_session(&self, enabled: bool) -> bool {
        self.session_updated.resolve(enabled)
    }

    pub fn reset_session(&self) {
        self.session_updated.reset();
    }

    pub fn enable_async(&self) {
        self.session_updated.enable_async();
    }

    pub fn disable_async(&self) {
        self.session_updated.disable_async();
    }
}
