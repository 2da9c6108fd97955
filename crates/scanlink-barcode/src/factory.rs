//! 增强对象的构造契约与提供者回调记录。
//!
//! # 设计动机（Why）
//! - 高亮与标注的具体形态（原生视图、渲染指令等）由宿主平台决定，本层只负责把宿主 JSON 交给工厂，
//!   并把得到的对象放入缓存、交还给引擎；
//! - 引擎的提供者回调在宿主应答前暂存于缓存，记录中同时保存触发回调的条码，工厂构造时需要它；
//!   记录被回收或随视图销毁清空时，尚未应答的回调以“无结果”完成。

use serde_json::Value;

use scanlink_core::{AugmentationCache, Continuation, Payload, PendingCallback};

use crate::error::PayloadError;
use crate::model::Barcode;

/// 由宿主 JSON 构造与更新高亮/标注的工厂。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `highlight`/`annotation` 接收宿主应答中 `highlight`/`annotation` 字段的值；
///   - `update_*` 接收完整的更新载荷，就地修改已缓存的对象，因此对象类型通常具有内部可变性；
///   - 构造失败返回 [`PayloadError`]，调用方记录日志并以“无结果”完成回调。
pub trait AugmentationFactory: Send + Sync + 'static {
    type Highlight: Clone + Send + Sync + 'static;
    type Annotation: Clone + Send + Sync + 'static;

    fn highlight(&self, json: &Value, barcode: &Barcode) -> Result<Self::Highlight, PayloadError>;

    fn update_highlight(&self, highlight: &Self::Highlight, json: &Payload);

    fn annotation(&self, json: &Value, barcode: &Barcode) -> Result<Self::Annotation, PayloadError>;

    fn update_annotation(&self, annotation: &Self::Annotation, json: &Payload);
}

/// 暂存的高亮提供者回调。
#[derive(Clone, Debug)]
pub struct HighlightCallback<H> {
    pub barcode: Barcode,
    pub continuation: Continuation<H>,
}

/// 暂存的标注提供者回调。
#[derive(Clone, Debug)]
pub struct AnnotationCallback<A> {
    pub barcode: Barcode,
    pub continuation: Continuation<A>,
}

impl<H> PendingCallback for HighlightCallback<H> {
    fn cancel(&self) {
        if self.continuation.complete(None) {
            tracing::debug!(barcode_id = %self.barcode.unique_id(), "unanswered highlight request cancelled");
        }
    }
}

impl<A> PendingCallback for AnnotationCallback<A> {
    fn cancel(&self) {
        if self.continuation.complete(None) {
            tracing::debug!(barcode_id = %self.barcode.unique_id(), "unanswered annotation request cancelled");
        }
    }
}

/// 以工厂产物为值类型的增强缓存。
pub type ArCache<F> = AugmentationCache<
    <F as AugmentationFactory>::Highlight,
    <F as AugmentationFactory>::Annotation,
    HighlightCallback<<F as AugmentationFactory>::Highlight>,
    AnnotationCallback<<F as AugmentationFactory>::Annotation>,
>;
