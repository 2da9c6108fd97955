use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

/// 定时器到期后执行的一次性任务。
///
/// 任务在驱动自有的执行上下文中运行（后台定时线程，或调用 [`MockClock::advance`] 的线程），
/// 因此必须满足 `Send + 'static`。
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// 单个已登记定时器的句柄，用于取消。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// 返回驱动内部的序号，便于日志关联。
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// 抽象可注入的时钟，统一“获取当前时间”“延迟执行”“取消延迟任务”三项能力。
///
/// # 设计背景（Why）
/// - 宽限期过期与结果关联超时都依赖可靠的时间来源；若直接调用平台定时器，测试只能真实睡眠；
/// - 显式的 `cancel` 让取消成为驱动契约的一部分，而不是依赖具体平台的隐式行为。
///
/// # 接口约束（What）
/// - `now`：返回单调时间点；
/// - `schedule`：登记在 `delay` 之后执行一次的任务，返回可用于取消的 [`TimerId`]；
/// - `cancel`：若任务尚未开始执行，则移除并丢弃它，返回 `true`；任务已执行或已被取消时返回 `false`；
/// - 实现者不得在持有内部锁的情况下执行或丢弃任务，任务内部可以再次调用 `schedule`/`cancel`。
///
/// # 使用指引（How）
/// - 推荐以 `Arc<dyn Clock>` 在组件间共享；
/// - 测试场景注入 [`MockClock`] 并调用 `advance`；生产环境使用 [`SystemClock`]。
pub trait Clock: Send + Sync + 'static {
    /// 返回当前的单调时间点。
    fn now(&self) -> Instant;

    /// 登记延迟任务。
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId;

    /// 取消尚未执行的任务。
    fn cancel(&self, id: TimerId) -> bool;
}

/// 按截止时间排序的任务队列，[`SystemClock`] 与 [`MockClock`] 共用。
///
/// 键为 `(截止点, 序号)`，同一截止点按登记顺序执行，保证唤醒序列可复现。
struct TimerQueue<T: Ord + Copy> {
    entries: BTreeMap<(T, u64), TimerTask>,
    deadlines: HashMap<u64, T>,
    next_id: u64,
}

impl<T: Ord + Copy> TimerQueue<T> {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            deadlines: HashMap::new(),
            next_id: 0,
        }
    }

    fn push(&mut self, deadline: T, task: TimerTask) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    fn remove(&mut self, id: TimerId) -> Option<TimerTask> {
        let deadline = self.deadlines.remove(&id.0)?;
        self.entries.remove(&(deadline, id.0))
    }

    fn earliest(&self) -> Option<T> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// 弹出截止点不晚于 `limit` 的最早任务。
    fn pop_due(&mut self, limit: T) -> Option<(T, TimerTask)> {
        let (deadline, id) = *self.entries.keys().next()?;
        if deadline > limit {
            return None;
        }
        self.deadlines.remove(&id);
        self.entries
            .remove(&(deadline, id))
            .map(|task| (deadline, task))
    }

    fn drain(&mut self) -> Vec<TimerTask> {
        self.deadlines.clear();
        std::mem::take(&mut self.entries).into_values().collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 执行任务并吞掉其 panic，避免单个任务终止驱动线程或打断虚拟时钟的推进。
fn run_task(task: TimerTask) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        tracing::error!("timer task panicked; remaining timers keep running");
    }
}

/// 基于单个后台线程的生产时钟。
///
/// # 设计动机（Why）
/// - 宽限期任务频率低、精度要求为百毫秒级，一个按截止时间排序的定时线程即可承载所有缓存实例；
/// - 不依赖任何异步运行时，宿主可在任意原生线程模型中使用。
///
/// # 契约说明（What）
/// - `Clone` 得到共享同一定时线程的句柄；
/// - 最后一个句柄释放时，定时线程退出，未到期任务被直接丢弃而不会执行；
/// - 被取消的任务会立即从队列中移除，不会在内存中滞留到原定截止时间。
///
/// # 权衡（Trade-offs）
/// - 所有任务串行执行于同一线程，单个任务耗时过长会推迟后续任务；缓存删除任务只做映射移除，开销可忽略。
#[derive(Clone)]
pub struct SystemClock {
    driver: Arc<TimerDriver>,
}

impl SystemClock {
    /// 启动定时线程并返回句柄。
    pub fn new() -> Self {
        let shared = Arc::new(TimerShared {
            queue: Mutex::new(SystemQueue {
                timers: TimerQueue::new(),
                shutdown: false,
            }),
            signal: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        thread::spawn(move || thread_shared.run());
        Self {
            driver: Arc::new(TimerDriver { shared }),
        }
    }

    /// 队列中尚未执行的任务数量。
    pub fn pending_timers(&self) -> usize {
        self.driver.shared.queue.lock().timers.len()
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClock")
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let deadline = Instant::now() + delay;
        let mut queue = self.driver.shared.queue.lock();
        let id = queue.timers.push(deadline, task);
        // 新任务可能早于线程当前等待的截止点。
        self.driver.shared.signal.notify_one();
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        let removed = self.driver.shared.queue.lock().timers.remove(id);
        // 锁外丢弃：任务可能持有最后一个时钟句柄。
        removed.is_some()
    }
}

/// 句柄侧的生命周期护栏：最后一个 [`SystemClock`] 释放时通知定时线程退出。
struct TimerDriver {
    shared: Arc<TimerShared>,
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        let abandoned = {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            queue.timers.drain()
        };
        self.shared.signal.notify_all();
        drop(abandoned);
    }
}

struct SystemQueue {
    timers: TimerQueue<Instant>,
    shutdown: bool,
}

struct TimerShared {
    queue: Mutex<SystemQueue>,
    signal: Condvar,
}

impl TimerShared {
    fn run(&self) {
        let mut queue = self.queue.lock();
        loop {
            if queue.shutdown {
                return;
            }
            let now = Instant::now();
            if let Some((_, task)) = queue.timers.pop_due(now) {
                MutexGuard::unlocked(&mut queue, || run_task(task));
                continue;
            }
            match queue.timers.earliest() {
                Some(deadline) => {
                    self.signal.wait_until(&mut queue, deadline);
                }
                None => self.signal.wait(&mut queue),
            }
        }
    }
}

/// 虚拟时钟：通过手动推进时间在测试中复现确定性的过期序列。
///
/// # 设计动机（Why）
/// - 宽限期为秒级，真实睡眠会拖慢测试并引入调度抖动；
/// - 虚拟时钟让测试显式控制时间推进，到期任务在 `advance` 返回前全部执行完毕。
///
/// # 行为概览（How）
/// - 内部维护自构造起的偏移量 `elapsed` 与按截止点排序的任务队列；
/// - `advance` 逐个弹出不晚于目标时间的任务，先把 `elapsed` 推进到该任务的截止点再在锁外执行，
///   因此任务内部观察到的 `now()` 恰为其截止时间；
/// - 任务执行期间新登记且截止点不晚于目标时间的任务，会在同一次 `advance` 中继续执行。
///
/// # 契约说明（What）
/// - `advance` 可多次调用，偏移量单调增加；
/// - 同一截止点的任务按登记顺序执行；
/// - 被取消的任务立即出队，不会执行。
#[derive(Clone)]
pub struct MockClock {
    inner: Arc<Mutex<MockState>>,
}

struct MockState {
    origin: Instant,
    elapsed: Duration,
    timers: TimerQueue<Duration>,
}

impl MockClock {
    /// 创建起始时间为当前系统时间的虚拟时钟。
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    /// 以指定起始时间构造虚拟时钟，便于在测试中固定初始偏移。
    pub fn with_start(origin: Instant) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                origin,
                elapsed: Duration::ZERO,
                timers: TimerQueue::new(),
            })),
        }
    }

    /// 手动推进虚拟时钟，并在当前线程执行所有到期任务。
    pub fn advance(&self, delta: Duration) {
        let target = self.inner.lock().elapsed.saturating_add(delta);
        loop {
            let due = {
                let mut state = self.inner.lock();
                match state.timers.pop_due(target) {
                    Some((deadline, task)) => {
                        state.elapsed = state.elapsed.max(deadline);
                        Some(task)
                    }
                    None => {
                        state.elapsed = state.elapsed.max(target);
                        None
                    }
                }
            };
            match due {
                Some(task) => run_task(task),
                None => return,
            }
        }
    }

    /// 返回自起始时间以来的虚拟时间偏移。
    pub fn elapsed(&self) -> Duration {
        self.inner.lock().elapsed
    }

    /// 队列中尚未执行的任务数量。
    pub fn pending_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("MockClock")
            .field("elapsed", &state.elapsed)
            .field("pending_timers", &state.timers.len())
            .finish()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        let state = self.inner.lock();
        state.origin + state.elapsed
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let mut state = self.inner.lock();
        let deadline = state.elapsed.saturating_add(delay);
        state.timers.push(deadline, task)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let removed = self.inner.lock().timers.remove(id);
        removed.is_some()
    }
}
