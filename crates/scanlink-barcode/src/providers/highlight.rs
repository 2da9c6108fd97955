use std::sync::Arc;

use serde_json::{Value, json};

use scanlink_core::{Continuation, Emitter, Payload, StableId};

use crate::factory::{ArCache, AugmentationFactory, HighlightCallback};
use crate::model::Barcode;
use crate::payload::{optional_str, parse_object};

/// 请求宿主为条码提供高亮。
pub const HIGHLIGHT_FOR_BARCODE: &str = "BarcodeArHighlightProvider.highlightForBarcode";

/// 高亮提供者：把引擎的高亮请求转发给宿主，并在宿主应答后完成回调。
///
/// # 教案式说明
/// - **意图 (Why)**：引擎以回调形式异步索取高亮；宿主应答经另一条调用路径（`finish_highlight`）到达，
///   两者之间以缓存中的 [`HighlightCallback`] 关联；
/// - **契约 (What)**：
///   - 回调以条码稳定标识为键，同一条码的新请求覆盖旧请求；
///   - 应答缺少 `highlight` 字段表示宿主不提供高亮，回调以 `None` 完成；
///   - 应答无法构造高亮时记录告警并以 `None` 完成，回调不会悬挂；
///   - 找不到对应回调（已过期或从未请求）时静默忽略。
pub struct HighlightProvider<F: AugmentationFactory> {
    emitter: Arc<dyn Emitter>,
    view_id: i64,
    factory: Arc<F>,
    cache: Arc<ArCache<F>>,
}

impl<F: AugmentationFactory> HighlightProvider<F> {
    pub fn new(
        emitter: Arc<dyn Emitter>,
        view_id: i64,
        factory: Arc<F>,
        cache: Arc<ArCache<F>>,
    ) -> Self {
        Self {
            emitter,
            view_id,
            factory,
            cache,
        }
    }

    /// 暂存回调并发布高亮请求。
    pub fn request_highlight(&self, barcode: &Barcode, continuation: Continuation<F::Highlight>) {
        let barcode_id = barcode.unique_id();
        self.cache.add_highlight_provider_callback(
            barcode_id.clone(),
            HighlightCallback {
                barcode: barcode.clone(),
                continuation,
            },
        );

        let mut payload = Payload::new();
        payload.insert("barcode".to_owned(), Value::String(barcode.to_json_string()));
        payload.insert("barcodeId".to_owned(), json!(barcode_id.as_str()));
        payload.insert("viewId".to_owned(), json!(self.view_id));
        self.emitter.emit(HIGHLIGHT_FOR_BARCODE, payload);
    }

    /// 处理宿主应答：`{"barcodeId": ..., "highlight": {...}}`。
    pub fn finish_highlight(&self, highlight_json: &str) {
        let object = match parse_object(highlight_json) {
            Ok(object) => object,
            Err(error) => {
                tracing::warn!(%error, "highlight response dropped");
                return;
            }
        };
        let Some(barcode_id) = optional_str(&object, "barcodeId").map(StableId::from) else {
            return;
        };
        let Some(callback) = self.cache.highlight_provider_callback(&barcode_id) else {
            tracing::trace!(%barcode_id, "no pending highlight request");
            return;
        };

        let Some(highlight_json) = object.get("highlight") else {
            callback.continuation.complete(None);
            return;
        };
        match self.factory.highlight(highlight_json, &callback.barcode) {
            Ok(highlight) => {
                self.cache.add_highlight(barcode_id, highlight.clone());
                callback.continuation.complete(Some(highlight));
            }
            Err(error) => {
                tracing::warn!(%barcode_id, %error, "highlight could not be built");
                callback.continuation.complete(None);
            }
        }
    }

    /// 将更新载荷交给已缓存的高亮；未缓存时忽略。
    pub fn update_highlight(&self, highlight_json: &str) {
        let object = match parse_object(highlight_json) {
            Ok(object) => object,
            Err(error) => {
                tracing::warn!(%error, "highlight update dropped");
                return;
            }
        };
        let Some(barcode_id) = optional_str(&object, "barcodeId").map(StableId::from) else {
            return;
        };
        if let Some(highlight) = self.cache.highlight(&barcode_id) {
            self.factory.update_highlight(&highlight, &object);
        }
    }
}
