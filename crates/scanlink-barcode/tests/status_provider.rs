//! 计数状态提供者的集成测试。
//!
//! - **Why**：状态请求以请求号关联，应答可能来自任意线程且格式不可信；
//! - **How**：`RecordingEmitter` 记录请求，测试从载荷中取回请求号后模拟宿主应答；
//! - **What**：每个请求恰好完成一次，未知请求号、畸形应答与视图销毁都不会留下悬挂回调。

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use proptest::prelude::*;

use scanlink_barcode::providers::ON_STATUS_REQUESTED;
use scanlink_barcode::{
    Barcode, BarcodeStatus, StatusItem, StatusProvider, StatusResult, TrackedBarcode,
};
use scanlink_core::{Continuation, RecordingEmitter, TrackingId};

type Results = Arc<Mutex<Vec<Option<StatusResult>>>>;

fn recorder() -> (Results, Continuation<StatusResult>) {
    let results: Results = Arc::new(Mutex::new(Vec::new()));
    let continuation = {
        let results = Arc::clone(&results);
        Continuation::new(move |value| results.lock().push(value))
    };
    (results, continuation)
}

fn shelf() -> Vec<TrackedBarcode> {
    vec![
        TrackedBarcode::new(TrackingId::new(10), Barcode::new("4006381333931", "EAN13")),
        TrackedBarcode::new(TrackingId::new(11), Barcode::new("73513537", "EAN8")),
    ]
}

fn listening_provider() -> (RecordingEmitter, StatusProvider) {
    let emitter = RecordingEmitter::new();
    emitter.add_listener(ON_STATUS_REQUESTED);
    let provider = StatusProvider::new(Arc::new(emitter.clone()), 2);
    (emitter, provider)
}

#[test]
fn request_without_listener_is_not_registered() {
    let emitter = RecordingEmitter::new();
    let provider = StatusProvider::new(Arc::new(emitter.clone()), 2);
    let (results, continuation) = recorder();

    assert_eq!(provider.request_status(shelf(), continuation), None);
    assert_eq!(provider.pending_requests(), 0);
    assert!(emitter.events().is_empty());
    assert!(results.lock().is_empty());
}

#[test]
fn success_result_completes_and_removes_request() {
    let (emitter, provider) = listening_provider();
    let (results, continuation) = recorder();

    let request_id = provider
        .request_status(shelf(), continuation)
        .expect("存在监听者时应登记请求");
    let published = emitter.events_named(ON_STATUS_REQUESTED);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].payload["requestId"], request_id.as_str());
    assert_eq!(published[0].payload["viewId"], 2);
    assert_eq!(
        published[0].payload["barcodes"].as_array().map(Vec::len),
        Some(2)
    );

    let answer = format!(
        r#"{{"requestId":"{request_id}","type":"barcodeCountStatusResultSuccess",
            "statusList":[{{"barcodeId":11,"status":"lowStock"}},{{"barcodeId":10,"status":"??"}}]}}"#
    );
    assert!(provider.submit_result(&answer));
    assert!(!provider.submit_result(&answer), "同一请求只能完成一次");
    assert_eq!(provider.pending_requests(), 0);

    let results = results.lock();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0],
        Some(StatusResult::Success {
            status_list: vec![
                StatusItem {
                    barcode: shelf()[1].clone(),
                    status: BarcodeStatus::LowStock,
                },
                StatusItem {
                    barcode: shelf()[0].clone(),
                    status: BarcodeStatus::None,
                },
            ],
            status_mode_enabled_message: None,
            status_mode_disabled_message: None,
        })
    );
}

#[test]
fn unparsable_result_completes_with_none() {
    let (_emitter, provider) = listening_provider();
    let (results, continuation) = recorder();
    let request_id = provider
        .request_status(shelf(), continuation)
        .expect("存在监听者时应登记请求");

    assert!(provider.submit_result(&format!(r#"{{"requestId":"{request_id}"}}"#)));
    assert_eq!(*results.lock(), vec![None]);
    assert!(!provider.submit_result("{\"requestId\": 5}"));
    assert!(!provider.submit_result("garbage"));
}

#[test]
fn cancel_pending_completes_every_request_once() {
    let (_emitter, provider) = listening_provider();
    let provider = Arc::new(provider);
    let (results, _) = recorder();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let results = Arc::clone(&results);
        let continuation = Continuation::new(move |value| results.lock().push(value));
        ids.push(
            provider
                .request_status(shelf(), continuation)
                .expect("存在监听者时应登记请求"),
        );
    }
    assert_eq!(provider.pending_requests(), 3);

    let late = {
        let provider = Arc::clone(&provider);
        let id = ids[0].clone();
        thread::spawn(move || {
            provider.submit_result(&format!(
                r#"{{"requestId":"{id}","type":"barcodeCountStatusResultAbort"}}"#
            ))
        })
    };
    provider.cancel_pending();
    late.join().expect("应答线程不应 panic");

    assert_eq!(results.lock().len(), 3, "无论应答与取消谁先到，每个请求恰好完成一次");
    assert_eq!(provider.pending_requests(), 0);
}

proptest! {
    /// 非已知取值的状态字符串一律映射为 `None`。
    #[test]
    fn prop_unknown_status_strings_map_to_none(raw in "[a-zA-Z]{0,12}") {
        let known = [
            "notAvailable", "expired", "fragile", "qualityCheck", "lowStock", "wrong", "expiringSoon",
        ];
        let status = BarcodeStatus::from_wire(&raw);
        prop_assert_eq!(status == BarcodeStatus::None, !known.contains(&raw.as_str()));
    }
}
