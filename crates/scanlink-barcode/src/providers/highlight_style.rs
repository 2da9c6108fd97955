use std::sync::Arc;

use serde_json::{Value, json};

use scanlink_core::{ConcurrentStore, Continuation, Emitter, Payload};

use crate::payload::parse_object;

/// 请求宿主为拣货条目提供高亮样式。
pub const STYLE_FOR_REQUEST: &str = "BarcodePickViewHighlightStyleAsyncProvider.styleForRequest";

/// 宿主返回的高亮样式，保留完整 JSON 对象交由渲染层解释。
#[derive(Clone, Debug, PartialEq)]
pub struct HighlightStyleResponse {
    pub style: Payload,
}

/// 拣货视图的异步高亮样式提供者。
///
/// # 教案式说明
/// - **意图 (Why)**：样式由宿主按业务状态决定，引擎以续体等待应答；请求号由引擎给出，
///   应答经 `finish_style` 按请求号回到对应续体；
/// - **契约 (What)**：
///   - 仅当存在视图级订阅时发布请求；未订阅时续体立即以 `None` 完成；
///   - 每个请求恰好完成一次：应答缺失或无法解析时以 `None` 完成，`cancel_pending` 收尾剩余请求；
///   - 同一请求号的新请求覆盖旧请求，旧续体以 `None` 完成。
pub struct HighlightStyleProvider {
    emitter: Arc<dyn Emitter>,
    view_id: i64,
    pending: ConcurrentStore<i64, Continuation<HighlightStyleResponse>>,
}

impl HighlightStyleProvider {
    pub fn new(emitter: Arc<dyn Emitter>, view_id: i64) -> Self {
        Self {
            emitter,
            view_id,
            pending: ConcurrentStore::new(),
        }
    }

    /// 登记续体并发布样式请求；返回请求是否已发布。
    pub fn request_style(
        &self,
        request_id: i64,
        request_json: &str,
        continuation: Continuation<HighlightStyleResponse>,
    ) -> bool {
        if !self.emitter.has_view_listener(self.view_id, STYLE_FOR_REQUEST) {
            continuation.complete(None);
            return false;
        }
        if let Some(replaced) = self.pending.set(request_id, continuation) {
            replaced.complete(None);
        }

        let mut payload = Payload::new();
        payload.insert("requestId".to_owned(), json!(request_id));
        payload.insert("request".to_owned(), Value::String(request_json.to_owned()));
        payload.insert("viewId".to_owned(), json!(self.view_id));
        self.emitter.emit(STYLE_FOR_REQUEST, payload);
        true
    }

    /// 处理宿主应答；返回是否找到并完成了对应请求。
    pub fn finish_style(&self, request_id: i64, response_json: Option<&str>) -> bool {
        let Some(continuation) = self.pending.remove(&request_id) else {
            tracing::trace!(request_id, "no pending style request");
            return false;
        };
        let Some(response_json) = response_json else {
            return continuation.complete(None);
        };
        match parse_object(response_json) {
            Ok(style) => continuation.complete(Some(HighlightStyleResponse { style })),
            Err(error) => {
                tracing::warn!(request_id, %error, "highlight style could not be parsed");
                continuation.complete(None)
            }
        }
    }

    /// 在途请求数量。
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// 以 `None` 完成并移除全部在途请求。
    pub fn cancel_pending(&self) {
        for (_, continuation) in self.pending.drain() {
            continuation.complete(None);
        }
    }
}
