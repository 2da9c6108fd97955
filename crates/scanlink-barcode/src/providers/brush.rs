use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use scanlink_core::{ConcurrentStore, Emitter, Payload};

use crate::model::Barcode;

/// 请求宿主为被跟踪的条码提供画刷。
pub const TRACKED_BRUSH_FOR_BARCODE: &str = "BarcodeSelectionTrackedBrushProvider.brushForBarcode";

/// 请求宿主为被瞄准的条码提供画刷。
pub const AIMED_BRUSH_FOR_BARCODE: &str = "BarcodeSelectionAimedBrushProvider.brushForBarcode";

/// 选择模式下绘制跟踪条码的画刷。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brush {
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: f64,
}

impl Brush {
    /// 宿主应答到达前使用的透明画刷。
    pub fn transparent() -> Self {
        Self {
            fill_color: "#00000000".to_owned(),
            stroke_color: "#00000000".to_owned(),
            stroke_width: 0.0,
        }
    }
}

/// 选择模式画刷提供者，跟踪画刷与瞄准画刷共用同一实现，仅事件名不同。
///
/// # 教案式说明
/// - **意图 (Why)**：引擎在绘制每一帧时同步索取画刷，不能等待宿主；
///   首次索取时返回透明画刷并发出请求，宿主应答后缓存，后续帧直接命中；
/// - **契约 (What)**：缓存以条码的选择标识为键，只有 `clear_cache` 会清空；
///   宿主应答缺少标识或画刷无法解析时被忽略。
pub struct BrushProvider {
    emitter: Arc<dyn Emitter>,
    event: &'static str,
    cached: ConcurrentStore<String, Brush>,
}

impl BrushProvider {
    /// 以指定事件名发布画刷请求。
    pub fn new(emitter: Arc<dyn Emitter>, event: &'static str) -> Self {
        Self {
            emitter,
            event,
            cached: ConcurrentStore::new(),
        }
    }

    pub fn tracked(emitter: Arc<dyn Emitter>) -> Self {
        Self::new(emitter, TRACKED_BRUSH_FOR_BARCODE)
    }

    pub fn aimed(emitter: Arc<dyn Emitter>) -> Self {
        Self::new(emitter, AIMED_BRUSH_FOR_BARCODE)
    }

    /// 发布请求时使用的事件名。
    pub fn event(&self) -> &'static str {
        self.event
    }

    pub fn brush_for(&self, barcode: &Barcode) -> Brush {
        if let Some(brush) = self.cached.get(&barcode.selection_identifier()) {
            return brush;
        }
        let mut payload = Payload::new();
        payload.insert("barcode".to_owned(), Value::String(barcode.to_json_string()));
        payload.insert("selectionIdentifier".to_owned(), json!(barcode.selection_identifier()));
        self.emitter.emit(self.event, payload);
        Brush::transparent()
    }

    /// 缓存宿主提供的画刷；返回是否被采纳。
    pub fn finish_brush(&self, brush_json: Option<&str>, selection_identifier: Option<&str>) -> bool {
        let (Some(brush_json), Some(selection_identifier)) = (brush_json, selection_identifier) else {
            return false;
        };
        match serde_json::from_str::<Brush>(brush_json) {
            Ok(brush) => {
                self.cached.set(selection_identifier.to_owned(), brush);
                true
            }
            Err(error) => {
                tracing::warn!(selection_identifier, %error, "brush could not be parsed");
                false
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cached.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanlink_core::RecordingEmitter;

    #[test]
    fn first_request_is_transparent_then_cached() {
        let emitter = RecordingEmitter::listening_to_all();
        let provider = BrushProvider::tracked(Arc::new(emitter.clone()));
        let barcode = Barcode::new("42", "CODE128");

        assert_eq!(provider.brush_for(&barcode), Brush::transparent());
        assert_eq!(emitter.events_named(TRACKED_BRUSH_FOR_BARCODE).len(), 1);

        let accepted = provider.finish_brush(
            Some(r##"{"fillColor":"#FF000080","strokeColor":"#FF0000FF","strokeWidth":2.0}"##),
            Some("42-CODE128"),
        );
        assert!(accepted);
        assert_eq!(provider.brush_for(&barcode).stroke_width, 2.0);
        assert_eq!(emitter.events_named(TRACKED_BRUSH_FOR_BARCODE).len(), 1, "命中缓存时不应再次请求");

        provider.clear_cache();
        assert_eq!(provider.brush_for(&barcode), Brush::transparent());
    }

    #[test]
    fn incomplete_answers_are_ignored() {
        let provider = BrushProvider::tracked(Arc::new(RecordingEmitter::new()));
        assert!(!provider.finish_brush(None, Some("x")));
        assert!(!provider.finish_brush(Some("{}"), None));
        assert!(!provider.finish_brush(Some("{\"fillColor\": 3}"), Some("x")));
    }

    #[test]
    fn aimed_provider_publishes_its_own_event() {
        let emitter = RecordingEmitter::listening_to_all();
        let aimed = BrushProvider::aimed(Arc::new(emitter.clone()));
        let tracked = BrushProvider::tracked(Arc::new(emitter.clone()));
        let barcode = Barcode::new("7", "QR");

        aimed.brush_for(&barcode);
        assert_eq!(emitter.events_named(AIMED_BRUSH_FOR_BARCODE).len(), 1);
        assert!(emitter.events_named(TRACKED_BRUSH_FOR_BARCODE).is_empty());

        assert!(aimed.finish_brush(
            Some(r##"{"fillColor":"#0000FF80","strokeColor":"#0000FFFF","strokeWidth":1.0}"##),
            Some("7-QR"),
        ));
        assert_eq!(aimed.brush_for(&barcode).stroke_width, 1.0);
        assert_eq!(tracked.brush_for(&barcode), Brush::transparent(), "两类画刷缓存互不共享");
    }
}
