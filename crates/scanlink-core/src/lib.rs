#![deny(unsafe_code)]
#![doc = "scanlink-core: 跟踪会话增强缓存、延迟过期调度与跨边界异步结果关联的核心原语。"]

//! # scanlink-core
//!
//! ## 定位与职责（Why）
//! - 跟踪引擎以回调形式在多个原生线程上推送会话更新，宿主层则通过事件发射器以 JSON 异步应答；
//!   本 crate 提供两者之间的簿记原语：并发键值存储、按键去重的延迟过期调度、增强缓存与单槽结果关联。
//! - 所有时间相关能力都经由 [`time::Clock`] 注入，测试可使用 [`time::MockClock`] 精确推进时间。
//!
//! ## 模块概览（What）
//! - [`store`]：基于 `DashMap` 的并发键值存储；
//! - [`time`]：可注入的定时器驱动（生产线程驱动 / 虚拟时钟）；
//! - [`scheduler`]：每个键至多一个在途任务的延迟过期调度器；
//! - [`augmentation`]：以稳定标识为键、随跟踪进出自动回收的增强缓存；
//! - [`correlation`]：阻塞等待宿主应答的结果关联槽与一次性续体；
//! - [`emitter`]：事件发射器契约与内存录制实现；
//! - [`config`]：宽限期与超时阈值的可反序列化配置；
//! - [`logging`]：`tracing` 订阅器的一次性安装入口。
//!
//! ## 使用指引（How）
//! 1. 为每个活跃视图/会话构造一个 [`augmentation::AugmentationCache`]，注入共享的时钟；
//! 2. 跟踪线程调用 [`augmentation::AugmentationCache::on_session_update`] 同步进出集合；
//! 3. 需要宿主决策的回调使用 [`correlation::EventWithResult`] 发出请求并在超时内等待应答；
//! 4. 会话销毁时调用 `clear()`/`reset()` 释放所有定时器与阻塞调用方。

pub mod augmentation;
pub mod config;
pub mod correlation;
pub mod emitter;
pub mod error;
pub mod ids;
pub mod logging;
pub mod scheduler;
pub mod store;
pub mod time;

pub use augmentation::{AugmentationCache, PendingCallback};
pub use config::{AugmentationSettings, BindingSettings, CorrelationSettings};
pub use correlation::{Continuation, CorrelationOutcome, CorrelationState, EventWithResult};
pub use emitter::{Emitter, Payload, RecordingEmitter};
pub use error::{ConfigError, LoggingError};
pub use ids::{StableId, TrackingId};
pub use scheduler::DeferredScheduler;
pub use store::ConcurrentStore;
pub use time::{Clock, MockClock, SystemClock, TimerId};
