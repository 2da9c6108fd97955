use std::sync::Arc;

use scanlink_core::{AugmentationCache, BindingSettings, Clock, Emitter};

use crate::factory::{ArCache, AugmentationFactory};
use crate::listener::SessionListener;
use crate::providers::{AnnotationProvider, HighlightProvider};

/// 单个增强视图的绑定：一个视图一份缓存，监听器与两个提供者共享它。
///
/// # 教案式说明
/// - **意图 (Why)**：缓存生命周期与视图绑定，不存在跨视图共享的全局状态；
/// - **契约 (What)**：`dispose` 唤醒阻塞中的会话请求并清空缓存，之后绑定仍可继续使用，等价于新建；
/// - **执行 (How)**：构造时按 [`BindingSettings`] 设置宽限期与关联超时。
pub struct ArViewBinding<F: AugmentationFactory> {
    view_id: i64,
    cache: Arc<ArCache<F>>,
    listener: SessionListener<F>,
    highlights: HighlightProvider<F>,
    annotations: AnnotationProvider<F>,
}

impl<F: AugmentationFactory> ArViewBinding<F> {
    pub fn new(
        emitter: Arc<dyn Emitter>,
        view_id: i64,
        factory: Arc<F>,
        clock: Arc<dyn Clock>,
        settings: &BindingSettings,
    ) -> Self {
        let cache = Arc::new(AugmentationCache::new(clock, settings.augmentation));
        tracing::debug!(view_id, "augmentation view bound");
        Self {
            view_id,
            listener: SessionListener::new(
                Arc::clone(&emitter),
                view_id,
                Arc::clone(&cache),
                settings.correlation,
            ),
            highlights: HighlightProvider::new(
                Arc::clone(&emitter),
                view_id,
                Arc::clone(&factory),
                Arc::clone(&cache),
            ),
            annotations: AnnotationProvider::new(emitter, view_id, factory, Arc::clone(&cache)),
            cache,
        }
    }

    pub fn view_id(&self) -> i64 {
        self.view_id
    }

    pub fn cache(&self) -> &ArCache<F> {
        &self.cache
    }

    pub fn listener(&self) -> &SessionListener<F> {
        &self.listener
    }

    pub fn highlight_provider(&self) -> &HighlightProvider<F> {
        &self.highlights
    }

    pub fn annotation_provider(&self) -> &AnnotationProvider<F> {
        &self.annotations
    }

    /// 视图销毁或会话重建时调用。
    pub fn dispose(&self) {
        self.listener.reset_session();
        self.cache.clear();
        tracing::debug!(view_id = self.view_id, "augmentation view disposed");
    }
}
