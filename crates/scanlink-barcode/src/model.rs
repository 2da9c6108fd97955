//! 条码跟踪会话的数据模型。
//!
//! # 设计动机（Why）
//! - 跟踪引擎本身不透明，本层只需观察它推送的快照：条码内容、实例号以及每帧的进出集合；
//! - 这些快照既要驱动增强缓存，也要原样序列化给宿主，因此统一派生 `serde`（camelCase）。
//!
//! # 契约说明（What）
//! - [`Barcode::unique_id`] 由内容与码制拼接而成，是所有增强缓存的键；
//! - [`SessionUpdate`] 只携带增量，全量跟踪集合由缓存自行维护。

use serde::{Deserialize, Serialize};

use scanlink_core::{StableId, TrackingId};

/// 一次识别出的条码。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Barcode {
    /// 解码内容；二进制载荷无法以文本表示时为空。
    #[serde(default)]
    pub data: Option<String>,
    /// 码制名称，例如 `EAN13`、`QR`。
    pub symbology: String,
    /// 是否为 GS1 数据载体。
    #[serde(default)]
    pub is_gs1_data_carrier: bool,
}

impl Barcode {
    pub fn new(data: impl Into<String>, symbology: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            symbology: symbology.into(),
            is_gs1_data_carrier: false,
        }
    }

    /// 跨会话稳定的实体标识：`"{data}-{symbology}"`。
    pub fn unique_id(&self) -> StableId {
        StableId::from(format!(
            "{}-{}",
            self.data.as_deref().unwrap_or_default(),
            self.symbology
        ))
    }

    /// 选择模式下的画刷缓存键，与稳定标识同源。
    pub fn selection_identifier(&self) -> String {
        self.unique_id().as_str().to_owned()
    }

    /// 以 JSON 文本形式交给宿主。
    pub fn to_json_string(&self) -> String {
        to_json_string(self)
    }
}

/// 跟踪中的条码实例。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedBarcode {
    pub identifier: TrackingId,
    pub barcode: Barcode,
}

impl TrackedBarcode {
    pub fn new(identifier: TrackingId, barcode: Barcode) -> Self {
        Self {
            identifier,
            barcode,
        }
    }

    pub fn to_json_string(&self) -> String {
        to_json_string(self)
    }
}

/// 一帧的跟踪增量。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    #[serde(default)]
    pub added_tracked_barcodes: Vec<TrackedBarcode>,
    #[serde(default)]
    pub removed_tracked_barcodes: Vec<TrackingId>,
    #[serde(default)]
    pub frame_sequence_id: u64,
}

impl SessionUpdate {
    /// 进入跟踪的 `(实例号, 稳定标识)` 对。
    pub fn added_pairs(&self) -> Vec<(TrackingId, StableId)> {
        self.added_tracked_barcodes
            .iter()
            .map(|tracked| (tracked.identifier, tracked.barcode.unique_id()))
            .collect()
    }

    pub fn to_json_string(&self) -> String {
        to_json_string(self)
    }
}

fn to_json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|error| {
        tracing::error!(%error, "snapshot could not be serialized");
        String::from("{}")
    })
}
