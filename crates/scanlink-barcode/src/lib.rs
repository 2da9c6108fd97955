#![deny(unsafe_code)]

//! # scanlink-barcode
//!
//! ## 定位与职责（Why）
//! - 在 `scanlink-core` 的缓存、调度与关联原语之上，实现条码跟踪引擎与宿主之间的回调适配；
//! - 引擎侧只观察快照（条码、实例号、每帧增量），宿主侧只通过事件发射器收发 JSON。
//!
//! ## 模块概览（What）
//! - [`model`]：条码、跟踪实例与会话增量；
//! - [`payload`]：宿主应答的尽力而为解析；
//! - [`factory`]：高亮/标注的构造契约与提供者回调记录；
//! - [`providers`]：高亮、标注、高亮样式、计数状态与选择画刷提供者；
//! - [`listener`]：会话监听与启用决策；
//! - [`view`]：单视图绑定，统一构造与销毁。
//!
//! ## 错误策略（Trade-offs）
//! - 应答解析失败只记录日志并以“无结果”完成回调，不会把错误抛回引擎或宿主。

pub mod error;
pub mod factory;
pub mod listener;
pub mod model;
pub mod payload;
pub mod providers;
pub mod view;

pub use error::PayloadError;
pub use factory::{AnnotationCallback, ArCache, AugmentationFactory, HighlightCallback};
pub use listener::{DID_UPDATE_SESSION, SessionListener};
pub use model::{Barcode, SessionUpdate, TrackedBarcode};
pub use providers::{
    AnnotationProvider, BarcodeStatus, Brush, BrushProvider, HighlightProvider,
    HighlightStyleProvider, HighlightStyleResponse, StatusItem, StatusProvider, StatusResult,
};
pub use view::ArViewBinding;
