use std::sync::Arc;

use serde_json::{Value, json};

use scanlink_core::{Continuation, Emitter, Payload, StableId};

use crate::factory::{AnnotationCallback, ArCache, AugmentationFactory};
use crate::model::Barcode;
use crate::payload::{optional_str, parse_object, required_str};

/// 请求宿主为条码提供标注。
pub const ANNOTATION_FOR_BARCODE: &str = "BarcodeArAnnotationProvider.annotationForBarcode";

/// 标注提供者，与 [`super::HighlightProvider`] 对称，回调存放在独立的命名空间。
///
/// - **契约 (What)**：更新载荷缺少 `barcodeId` 属于宿主协议错误，记录 error 级日志后忽略。
pub struct AnnotationProvider<F: AugmentationFactory> {
    emitter: Arc<dyn Emitter>,
    view_id: i64,
    factory: Arc<F>,
    cache: Arc<ArCache<F>>,
}

impl<F: AugmentationFactory> AnnotationProvider<F> {
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

    pub fn request_annotation(&self, barcode: &Barcode, continuation: Continuation<F::Annotation>) {
        let barcode_id = barcode.unique_id();
        self.cache.add_annotation_provider_callback(
            barcode_id.clone(),
            AnnotationCallback {
                barcode: barcode.clone(),
                continuation,
            },
        );

        let mut payload = Payload::new();
        payload.insert("barcode".to_owned(), Value::String(barcode.to_json_string()));
        payload.insert("barcodeId".to_owned(), json!(barcode_id.as_str()));
        payload.insert("viewId".to_owned(), json!(self.view_id));
        self.emitter.emit(ANNOTATION_FOR_BARCODE, payload);
    }

    /// 处理宿主应答：`{"barcodeId": ..., "annotation": {...}}`。
    pub fn finish_annotation(&self, annotation_json: &str) {
        let object = match parse_object(annotation_json) {
            Ok(object) => object,
            Err(error) => {
                tracing::warn!(%error, "annotation response dropped");
                return;
            }
        };
        let Some(barcode_id) = optional_str(&object, "barcodeId").map(StableId::from) else {
            return;
        };
        let Some(callback) = self.cache.annotation_provider_callback(&barcode_id) else {
            tracing::trace!(%barcode_id, "no pending annotation request");
            return;
        };

        let Some(annotation_json) = object.get("annotation") else {
            callback.continuation.complete(None);
            return;
        };
        match self.factory.annotation(annotation_json, &callback.barcode) {
            Ok(annotation) => {
                self.cache.add_annotation(barcode_id, annotation.clone());
                callback.continuation.complete(Some(annotation));
            }
            Err(error) => {
                tracing::warn!(%barcode_id, %error, "annotation could not be built");
                callback.continuation.complete(None);
            }
        }
    }

    pub fn update_annotation(&self, annotation_json: &str) {
        let object = match parse_object(annotation_json) {
            Ok(object) => object,
            Err(error) => {
                tracing::warn!(%error, "annotation update dropped");
                return;
            }
        };
        let barcode_id = match required_str(&object, "barcodeId") {
            Ok(barcode_id) => StableId::from(barcode_id),
            Err(error) => {
                tracing::error!(%error, "invalid annotation update received");
                return;
            }
        };
        if let Some(annotation) = self.cache.annotation(&barcode_id) {
            self.factory.update_annotation(&annotation, &object);
        }
    }
}
