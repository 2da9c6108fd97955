//! 时间抽象模块，提供可注入的定时器驱动，使宽限期过期与超时逻辑在测试中完全确定。
//!
//! # 模块定位（Why）
//! - 平台主循环定时器的取消语义各不相同，直接依赖会让“取消与触发谁先发生”无从验证；
//! - `Clock` trait 统一 `now`/`schedule`/`cancel` 三个原语，生产与测试只需切换注入的实现。
//!
//! # 结构概览（What）
//! - [`clock::Clock`]：核心 trait；
//! - [`clock::SystemClock`]：单后台线程按截止时间驱动的生产实现；
//! - [`clock::MockClock`]：手动推进的虚拟时钟，在调用 `advance` 的线程上按序执行到期任务。
//!
//! # 使用指引（How）
//! - 组件通过 `Arc<dyn Clock>` 持有时间源；
//! - 测试中构造 [`MockClock`]，调用 `advance` 跨过宽限期后立即断言结果，无需真实睡眠。

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock, TimerId, TimerTask};
