//! 增强缓存过期行为的集成测试。
//!
//! # 教案级导览
//!
//! - **核心目标 (Why)**：验证“离开跟踪 → 宽限期 → 回收”与“宽限期内重新进入 → 保留”两条主路径，
//!   以及 `clear()` 之后缓存与新建实例等价。
//! - **设计手法 (How)**：全部使用 `MockClock` 推进虚拟时间；性质测试以影子模型（`ShadowCache`）
//!   对随机的进入/离开/推进序列求值，并在每一步比较可见状态。
//! - **契约 (What)**：默认宽限期为 2 秒；定时器在截止时刻到达时触发。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use parking_lot::Mutex;
use scanlink_core::{
    AugmentationCache, AugmentationSettings, Continuation, MockClock, StableId, TrackingId,
};

type Cache = AugmentationCache<String, String, Continuation<String>, Continuation<String>>;

const GRACE: Duration = Duration::from_secs(2);

fn new_cache(clock: &MockClock) -> Cache {
    AugmentationCache::new(Arc::new(clock.clone()), AugmentationSettings::new(GRACE))
}

fn populate(cache: &Cache, id: &StableId) {
    cache.add_annotation(id.clone(), format!("annotation:{id}"));
    cache.add_highlight(id.clone(), format!("highlight:{id}"));
    cache.add_highlight_provider_callback(id.clone(), Continuation::new(|_| {}));
    cache.add_annotation_provider_callback(id.clone(), Continuation::new(|_| {}));
}

fn all_absent(cache: &Cache, id: &StableId) -> bool {
    cache.annotation(id).is_none()
        && cache.highlight(id).is_none()
        && cache.highlight_provider_callback(id).is_none()
        && cache.annotation_provider_callback(id).is_none()
}

fn all_present(cache: &Cache, id: &StableId) -> bool {
    cache.annotation(id).is_some()
        && cache.highlight(id).is_some()
        && cache.highlight_provider_callback(id).is_some()
        && cache.annotation_provider_callback(id).is_some()
}

/// ## 端到端：宽限期内仍可读取，宽限期后消失
#[test]
fn annotation_survives_grace_then_expires() {
    let clock = MockClock::new();
    let cache = new_cache(&clock);
    let k = StableId::from("A-EAN13");
    let t = TrackingId::new(1);

    cache.on_session_update(&[(t, k.clone())], &[]);
    cache.add_annotation(k.clone(), "X".to_owned());
    cache.on_session_update(&[], &[t]);

    assert_eq!(cache.annotation(&k).as_deref(), Some("X"), "宽限期内标注应仍可读取");
    clock.advance(GRACE - Duration::from_millis(1));
    assert_eq!(cache.annotation(&k).as_deref(), Some("X"));
    clock.advance(Duration::from_millis(1));
    assert_eq!(cache.annotation(&k), None, "宽限期结束后标注应被回收");
}

/// ## 回收覆盖全部子缓存
#[test]
fn expiry_purges_every_sub_cache() {
    let clock = MockClock::new();
    let cache = new_cache(&clock);
    let k = StableId::from("QR:payload");
    cache.on_session_update(&[(TrackingId::new(3), k.clone())], &[]);
    populate(&cache, &k);

    cache.on_session_update(&[], &[TrackingId::new(3)]);
    clock.advance(GRACE + Duration::from_millis(10));
    assert!(all_absent(&cache, &k), "四个子缓存都应被清理");
    assert!(!cache.is_pending_deletion(&k));
}

/// ## 回收时尚未应答的提供者回调以 None 完成
#[test]
fn expiry_completes_unanswered_callbacks() {
    let clock = MockClock::new();
    let cache = new_cache(&clock);
    let k = StableId::from("A-EAN13");
    let completions: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
    let continuation = {
        let completions = Arc::clone(&completions);
        Continuation::new(move |value| completions.lock().push(value))
    };

    cache.on_session_update(&[(TrackingId::new(1), k.clone())], &[]);
    cache.add_annotation_provider_callback(k.clone(), continuation.clone());
    cache.on_session_update(&[], &[TrackingId::new(1)]);
    assert!(completions.lock().is_empty(), "宽限期内回调仍在等待应答");

    clock.advance(GRACE + Duration::from_secs(1));
    assert!(cache.annotation_provider_callback(&k).is_none());
    assert_eq!(*completions.lock(), vec![None]);
    assert!(continuation.is_completed());
}

/// ## 连续两次调度只回收一次
#[test]
fn double_removal_schedules_single_expiry() {
    let clock = MockClock::new();
    let cache = new_cache(&clock);
    let k = StableId::from("CODE39:twice");
    cache.on_session_update(&[(TrackingId::new(1), k.clone())], &[]);
    cache.on_session_update(&[], &[TrackingId::new(1)]);
    clock.advance(Duration::from_millis(500));
    cache.on_session_update(&[(TrackingId::new(2), k.clone())], &[]);
    cache.on_session_update(&[], &[TrackingId::new(2)]);
    assert_eq!(clock.pending_timers(), 1, "同一稳定标识只能有一个待执行回收");

    // 第一次调度的截止时刻（2.0s）已过，但被替换后不得生效。
    clock.advance(Duration::from_millis(1_600));
    populate(&cache, &k);
    clock.advance(Duration::from_millis(100));
    assert!(all_present(&cache, &k), "被替换的回收不得提前触发");
    clock.advance(Duration::from_millis(400));
    assert!(all_absent(&cache, &k));
}

/// ## 未知实例的离开被静默忽略
#[test]
fn unknown_removal_is_tolerated() {
    let clock = MockClock::new();
    let cache = new_cache(&clock);
    cache.on_session_update(&[], &[TrackingId::new(404)]);
    assert_eq!(clock.pending_timers(), 0);
}

/// ## clear() 后与新建实例等价
#[test]
fn clear_resets_to_fresh_state() {
    let clock = MockClock::new();
    let cache = new_cache(&clock);
    let ids: Vec<StableId> = (0..5).map(|i| StableId::from(format!("EAN8:{i}"))).collect();
    for (raw, id) in ids.iter().enumerate() {
        cache.on_session_update(&[(TrackingId::new(raw as i64), id.clone())], &[]);
        populate(&cache, id);
    }
    cache.on_session_update(&[], &[TrackingId::new(0), TrackingId::new(1)]);
    assert_eq!(clock.pending_timers(), 2);

    cache.clear();
    assert_eq!(clock.pending_timers(), 0, "clear 必须撤销全部定时器");
    for (raw, id) in ids.iter().enumerate() {
        assert!(all_absent(&cache, id));
        assert!(!cache.is_tracked(id));
        assert_eq!(cache.stable_id_for(TrackingId::new(raw as i64)), None);
    }

    // 清空后重新填充的条目不受旧定时器影响。
    populate(&cache, &ids[0]);
    clock.advance(GRACE * 3);
    assert!(all_present(&cache, &ids[0]));
}

#[derive(Clone, Debug)]
enum Step {
    Enter { tracking: i64, entity: u8 },
    Leave { tracking: i64 },
    Advance { millis: u64 },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0i64..6, 0u8..4).prop_map(|(tracking, entity)| Step::Enter { tracking, entity }),
        (0i64..6).prop_map(|tracking| Step::Leave { tracking }),
        (0u64..2_500).prop_map(|millis| Step::Advance { millis }),
    ]
}

fn entity(raw: u8) -> StableId {
    StableId::from(format!("EAN13:{raw}"))
}

/// 影子模型：记录实例映射、每个实体的回收截止时刻与仍应存在的高亮。
#[derive(Default)]
struct ShadowCache {
    now: u64,
    tracked: BTreeMap<i64, u8>,
    deadlines: BTreeMap<u8, u64>,
    present: BTreeSet<u8>,
}

impl ShadowCache {
    fn is_tracked(&self, entity: u8) -> bool {
        self.tracked.values().any(|tracked| *tracked == entity)
    }

    fn release(&mut self, entity: u8) {
        if !self.is_tracked(entity) {
            self.deadlines.insert(entity, self.now + GRACE.as_millis() as u64);
        }
    }

    fn apply(&mut self, step: &Step) {
        match *step {
            Step::Enter { tracking, entity } => {
                self.deadlines.remove(&entity);
                if let Some(previous) = self.tracked.insert(tracking, entity) {
                    if previous != entity {
                        self.release(previous);
                    }
                }
                self.present.insert(entity);
            }
            Step::Leave { tracking } => {
                if let Some(entity) = self.tracked.remove(&tracking) {
                    self.release(entity);
                }
            }
            Step::Advance { millis } => {
                self.now += millis;
                let due: Vec<u8> = self
                    .deadlines
                    .iter()
                    .filter(|(_, deadline)| **deadline <= self.now)
                    .map(|(entity, _)| *entity)
                    .collect();
                for entity in due {
                    self.deadlines.remove(&entity);
                    self.present.remove(&entity);
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// 任意进入/离开/推进序列下，缓存可见状态与影子模型一致，且跟踪中的实体没有待执行回收。
    #[test]
    fn prop_cache_matches_shadow_model(steps in prop::collection::vec(step(), 1..40)) {
        let clock = MockClock::new();
        let cache = new_cache(&clock);
        let mut shadow = ShadowCache::default();

        for step in &steps {
            match *step {
                Step::Enter { tracking, entity: raw } => {
                    cache.on_session_update(&[(TrackingId::new(tracking), entity(raw))], &[]);
                    cache.add_highlight(entity(raw), format!("h{raw}"));
                }
                Step::Leave { tracking } => {
                    cache.on_session_update(&[], &[TrackingId::new(tracking)]);
                }
                Step::Advance { millis } => clock.advance(Duration::from_millis(millis)),
            }
            shadow.apply(step);

            for raw in 0u8..4 {
                let id = entity(raw);
                prop_assert_eq!(cache.highlight(&id).is_some(), shadow.present.contains(&raw));
                prop_assert_eq!(cache.is_pending_deletion(&id), shadow.deadlines.contains_key(&raw));
                prop_assert_eq!(cache.is_tracked(&id), shadow.is_tracked(raw));
                if cache.is_tracked(&id) {
                    prop_assert!(!cache.is_pending_deletion(&id), "跟踪中的实体不得存在待执行回收");
                }
            }
        }
    }
}
