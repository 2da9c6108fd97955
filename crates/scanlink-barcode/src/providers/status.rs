//! 计数模式下的条码状态提供者。
//!
//! # 设计动机（Why）
//! - 引擎在计数视图中按批次索取条码状态（过期、易碎、缺货等），宿主可能需要访问业务系统，
//!   应答时间不可预期；
//! - 每个批次以请求号关联，请求在宿主应答前保存在并发存储中，应答到达后完成并移除。
//!
//! # 契约说明（What）
//! - 宿主未订阅请求事件时不登记请求，回调不会被调用；
//! - 应答 `type` 取值 `barcodeCountStatusResultSuccess`/`Error`/`Abort`，其他取值或缺失时以 `None` 完成；
//! - 状态列表中无法识别的条目被跳过，未知状态字符串映射为 [`BarcodeStatus::None`]。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use serde_json::{Value, json};

use scanlink_core::{ConcurrentStore, Continuation, Emitter, Payload, TrackingId};

use crate::error::PayloadError;
use crate::model::TrackedBarcode;
use crate::payload::{optional_str, parse_object, required_str};

/// 请求宿主提供一批条码的状态。
pub const ON_STATUS_REQUESTED: &str = "BarcodeCountStatusProvider.onStatusRequested";

/// 条码在计数视图中的状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BarcodeStatus {
    None,
    NotAvailable,
    Expired,
    Fragile,
    QualityCheck,
    LowStock,
    Wrong,
    ExpiringSoon,
}

impl BarcodeStatus {
    /// 宿主协议中的字符串取值；未知取值映射为 `None`。
    pub fn from_wire(value: &str) -> Self {
        match value {
            "notAvailable" => Self::NotAvailable,
            "expired" => Self::Expired,
            "fragile" => Self::Fragile,
            "qualityCheck" => Self::QualityCheck,
            "lowStock" => Self::LowStock,
            "wrong" => Self::Wrong,
            "expiringSoon" => Self::ExpiringSoon,
            _ => Self::None,
        }
    }
}

/// 单个条码的状态。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusItem {
    pub barcode: TrackedBarcode,
    pub status: BarcodeStatus,
}

/// 宿主对一个批次的应答。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusResult {
    Success {
        status_list: Vec<StatusItem>,
        status_mode_enabled_message: Option<String>,
        status_mode_disabled_message: Option<String>,
    },
    Error {
        status_list: Vec<StatusItem>,
        error_message: Option<String>,
        status_mode_disabled_message: Option<String>,
    },
    Abort {
        error_message: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusItemWire {
    barcode_id: i64,
    status: String,
}

impl StatusResult {
    /// 以请求时的条码批次为上下文解析应答对象。
    ///
    /// - **执行 (How)**：状态条目以 `barcodeId` 匹配请求批次中的实例号，匹配不到的条目被丢弃；
    ///   `statusList` 缺失或不是数组时视为空列表；
    /// - **契约 (What)**：只有 `type` 决定成败，消息字段类型不符时按缺失处理，不影响结果。
    pub fn from_payload(object: &Payload, requested: &[TrackedBarcode]) -> Result<Self, PayloadError> {
        let kind = required_str(object, "type")?;
        let message = |field: &str| optional_str(object, field).map(str::to_owned);
        let status_list = || match object.get("statusList") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value::<StatusItemWire>(item.clone()).ok())
                .filter_map(|item| {
                    requested
                        .iter()
                        .find(|tracked| tracked.identifier == TrackingId::new(item.barcode_id))
                        .map(|tracked| StatusItem {
                            barcode: tracked.clone(),
                            status: BarcodeStatus::from_wire(&item.status),
                        })
                })
                .collect(),
            _ => Vec::new(),
        };

        match kind {
            "barcodeCountStatusResultSuccess" => Ok(Self::Success {
                status_list: status_list(),
                status_mode_enabled_message: message("statusModeEnabledMessage"),
                status_mode_disabled_message: message("statusModeDisabledMessage"),
            }),
            "barcodeCountStatusResultError" => Ok(Self::Error {
                status_list: status_list(),
                error_message: message("errorMessage"),
                status_mode_disabled_message: message("statusModeDisabledMessage"),
            }),
            "barcodeCountStatusResultAbort" => Ok(Self::Abort {
                error_message: message("errorMessage"),
            }),
            _ => Err(PayloadError::InvalidField {
                field: "type",
                expected: "a known status result type",
            }),
        }
    }
}

#[derive(Clone)]
struct StatusRequest {
    barcodes: Vec<TrackedBarcode>,
    continuation: Continuation<StatusResult>,
}

/// 状态提供者。
pub struct StatusProvider {
    emitter: Arc<dyn Emitter>,
    view_id: i64,
    requests: ConcurrentStore<String, StatusRequest>,
    next_request: AtomicU64,
}

impl StatusProvider {
    pub fn new(emitter: Arc<dyn Emitter>, view_id: i64) -> Self {
        Self {
            emitter,
            view_id,
            requests: ConcurrentStore::new(),
            next_request: AtomicU64::new(0),
        }
    }

    /// 登记请求并发布；返回请求号，宿主未订阅时返回 `None`。
    pub fn request_status(
        &self,
        barcodes: Vec<TrackedBarcode>,
        continuation: Continuation<StatusResult>,
    ) -> Option<String> {
        if !self.emitter.has_listener(ON_STATUS_REQUESTED) {
            return None;
        }

        let sequence = self.next_request.fetch_add(1, Ordering::Relaxed);
        let request_id = format!("{}-{sequence}", self.view_id);
        let serialized: Vec<Value> = barcodes
            .iter()
            .map(|tracked| Value::String(tracked.to_json_string()))
            .collect();
        self.requests.set(
            request_id.clone(),
            StatusRequest {
                barcodes,
                continuation,
            },
        );

        let mut payload = Payload::new();
        payload.insert("barcodes".to_owned(), Value::Array(serialized));
        payload.insert("requestId".to_owned(), json!(request_id));
        payload.insert("viewId".to_owned(), json!(self.view_id));
        self.emitter.emit(ON_STATUS_REQUESTED, payload);
        Some(request_id)
    }

    /// 处理宿主应答；返回是否找到并完成了对应请求。
    ///
    /// 应答无法解析为已知结果时，请求仍被移除，回调以 `None` 完成。
    pub fn submit_result(&self, result_json: &str) -> bool {
        let object = match parse_object(result_json) {
            Ok(object) => object,
            Err(error) => {
                tracing::warn!(%error, "status result dropped");
                return false;
            }
        };
        let request_id = match required_str(&object, "requestId") {
            Ok(request_id) => request_id,
            Err(error) => {
                tracing::warn!(%error, "status result without request id");
                return false;
            }
        };
        let Some(request) = self.requests.remove(&request_id.to_owned()) else {
            tracing::debug!(request_id, "status result for unknown request");
            return false;
        };

        match StatusResult::from_payload(&object, &request.barcodes) {
            Ok(result) => request.continuation.complete(Some(result)),
            Err(error) => {
                tracing::error!(request_id, %error, "status result could not be parsed");
                request.continuation.complete(None)
            }
        }
    }

    /// 在途请求数量。
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// 以 `None` 完成并移除全部在途请求，用于视图销毁。
    pub fn cancel_pending(&self) {
        for (request_id, request) in self.requests.all_entries() {
            if self.requests.remove(&request_id).is_some() {
                request.continuation.complete(None);
            }
        }
    }
}
