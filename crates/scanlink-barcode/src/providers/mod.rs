//! 宿主提供者适配。
//!
//! 每个提供者把引擎的一类回调转换为发往宿主的事件，并提供对应的应答入口：
//! - [`HighlightProvider`] / [`AnnotationProvider`]：增强对象，回调暂存于增强缓存；
//! - [`StatusProvider`]：计数视图的批量状态，按请求号关联；
//! - [`HighlightStyleProvider`]：拣货视图的高亮样式，按引擎给出的请求号关联；
//! - [`BrushProvider`]：选择模式的跟踪/瞄准画刷，先返回透明画刷再缓存应答。

mod annotation;
mod brush;
mod highlight;
mod highlight_style;
mod status;

pub use annotation::{ANNOTATION_FOR_BARCODE, AnnotationProvider};
pub use brush::{AIMED_BRUSH_FOR_BARCODE, Brush, BrushProvider, TRACKED_BRUSH_FOR_BARCODE};
pub use highlight::{HIGHLIGHT_FOR_BARCODE, HighlightProvider};
pub use highlight_style::{HighlightStyleProvider, HighlightStyleResponse, STYLE_FOR_REQUEST};
pub use status::{
    BarcodeStatus, ON_STATUS_REQUESTED, StatusItem, StatusProvider, StatusResult,
};
