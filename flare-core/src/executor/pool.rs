//! 线程池本体：有界工作线程集合加可配置形态的任务队列。
//!
//! # 模块定位（Why）
//! - 四种池形态（fixed / cached / limited / eager）只在核心数、上限、空闲存活与
//!   队列形态上存在差异，装配逻辑收敛到同一个 [`Executor`]；
//! - 队列形态决定背压行为：直接交接要求有空闲线程在等待，有界队列满后触发扩线程，
//!   扩无可扩即进入拒绝流程。
//!
//! # 并发模型（How）
//! - 任务队列为互斥量加条件变量的经典组合：`takers` 唤醒取任务的工作线程，
//!   `space` 唤醒等待空位的 `retry_offer`；
//! - 线程数增长使用比较交换循环，保证不越过形态上限；
//! - 空闲超时退出只在线程数高于核心数时生效，保证核心线程常驻。
//!
//! # 风险提示（Trade-offs）
//! - 提交路径对"无空闲线程"的判断基于队列等待计数快照，极端并发下可能多创建
//!   一个线程，上限仍然受比较交换保护；
//! - 任务恐慌被捕获并记录，不会击穿工作线程。

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::error::{codes, FlareError};
use crate::observability;
use crate::url::Url;

use super::abort_policy::AbortPolicyWithReport;
use super::thread_factory::NamedThreadFactory;

/// 提交给线程池的任务。
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// eager 形态在扩容失败后重试入队的等待上限。
const RETRY_OFFER_TIMEOUT: Duration = Duration::from_millis(100);

/// 队列形态：由 URL 的 `queues` 参数选定。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueCapacity {
    /// `queues == 0`：直接交接，仅当有空闲线程等待时入队成功。
    Handoff,
    /// `queues < 0`：无界先进先出。
    Unbounded,
    /// `queues > 0`：容量受限的先进先出。
    Bounded(usize),
}

impl QueueCapacity {
    /// 从 `queues` 参数值换算队列形态。
    pub fn from_queues(queues: i64) -> Self {
        match queues {
            0 => QueueCapacity::Handoff,
            negative if negative < 0 => QueueCapacity::Unbounded,
            positive => QueueCapacity::Bounded(positive as usize),
        }
    }
}

/// 线程池装配参数。
#[derive(Debug)]
pub struct ExecutorConfig {
    pub name: String,
    pub core_size: usize,
    pub max_size: usize,
    /// 空闲线程存活时长；`None` 表示线程不因空闲退出。
    pub keep_alive: Option<Duration>,
    pub queues: i64,
    /// eager 形态：有任务且无空闲线程时优先扩线程而不是入队。
    pub eager: bool,
    /// 装配来源 URL，拒绝报告会附带它。
    pub url: Url,
}

/// 线程池状态快照，拒绝报告与观测使用。
#[derive(Clone, Debug, Serialize)]
pub struct ExecutorSnapshot {
    pub name: String,
    pub core_size: usize,
    pub max_size: usize,
    pub pool_size: usize,
    pub largest_pool_size: usize,
    pub active_count: usize,
    pub queue_size: usize,
}

struct QueueState {
    tasks: VecDeque<Task>,
    waiting: usize,
    shutdown: bool,
}

enum Polled {
    Task(Task),
    Timeout,
    Shutdown,
}

struct TaskQueue {
    capacity: QueueCapacity,
    state: Mutex<QueueState>,
    takers: Condvar,
    space: Condvar,
}

impl TaskQueue {
    fn new(capacity: QueueCapacity) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                waiting: 0,
                shutdown: false,
            }),
            takers: Condvar::new(),
            space: Condvar::new(),
        }
    }

    /// 非阻塞入队；失败时原样归还任务。
    fn offer(&self, task: Task) -> Result<(), Task> {
        let mut state = self.state.lock();
        if state.shutdown || !self.admits(&state) {
            return Err(task);
        }
        state.tasks.push_back(task);
        self.takers.notify_one();
        Ok(())
    }

    /// 限时重试入队；等待取任务方腾出空位。
    fn retry_offer(&self, task: Task, timeout: Duration) -> Result<(), Task> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return Err(task);
            }
            if self.admits(&state) {
                state.tasks.push_back(task);
                self.takers.notify_one();
                return Ok(());
            }
            if self.space.wait_until(&mut state, deadline).timed_out() {
                return Err(task);
            }
        }
    }

    fn admits(&self, state: &QueueState) -> bool {
        match self.capacity {
            QueueCapacity::Handoff => state.waiting > state.tasks.len(),
            QueueCapacity::Unbounded => true,
            QueueCapacity::Bounded(capacity) => state.tasks.len() < capacity,
        }
    }

    /// 工作线程取任务；`keep_alive` 给出后空等超时返回 [`Polled::Timeout`]。
    fn poll(&self, keep_alive: Option<Duration>) -> Polled {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                self.space.notify_one();
                return Polled::Task(task);
            }
            if state.shutdown {
                return Polled::Shutdown;
            }
            state.waiting += 1;
            // 直接交接语义下，新出现的等待线程本身就是"空位"，唤醒重试入队方。
            self.space.notify_one();
            match keep_alive {
                Some(duration) => {
                    let timed_out = self.takers.wait_for(&mut state, duration).timed_out();
                    state.waiting -= 1;
                    if timed_out && state.tasks.is_empty() {
                        return Polled::Timeout;
                    }
                }
                None => {
                    self.takers.wait(&mut state);
                    state.waiting -= 1;
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    fn waiting(&self) -> usize {
        self.state.lock().waiting
    }

    fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        state.tasks.clear();
        self.takers.notify_all();
        self.space.notify_all();
    }
}

struct PoolCore {
    name: String,
    core_size: usize,
    max_size: usize,
    keep_alive: Option<Duration>,
    eager: bool,
    queue: TaskQueue,
    workers: AtomicUsize,
    largest: AtomicUsize,
    active: AtomicUsize,
    factory: NamedThreadFactory,
    policy: AbortPolicyWithReport,
    shutdown: AtomicBool,
}

/// `Executor` 是一个形态装配完成的工作线程池。
///
/// # 契约说明（What）
/// - `execute` 非阻塞提交：按"核心线程 -> 队列 -> 扩容 -> 拒绝"的顺序处置任务；
/// - 拒绝时先产出诊断报告（日志加转储文件），再以 `executor.rejected` 返回；
/// - 析构时自动关闭，未执行的排队任务被丢弃。
pub struct Executor {
    core: Arc<PoolCore>,
}

impl Executor {
    /// 按装配参数构建线程池。
    pub fn new(config: ExecutorConfig) -> Self {
        let policy = AbortPolicyWithReport::new(config.name.clone(), config.url.clone());
        let core = Arc::new(PoolCore {
            factory: NamedThreadFactory::new(config.name.clone(), true),
            name: config.name,
            core_size: config.core_size,
            max_size: config.max_size.max(1),
            keep_alive: config.keep_alive,
            eager: config.eager,
            queue: TaskQueue::new(QueueCapacity::from_queues(config.queues)),
            workers: AtomicUsize::new(0),
            largest: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            policy,
            shutdown: AtomicBool::new(false),
        });
        Self { core }
    }

    /// 提交任务。
    pub fn execute<F>(&self, task: F) -> Result<(), FlareError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.core.dispatch(Box::new(task))
    }

    /// 当前线程数。
    pub fn pool_size(&self) -> usize {
        self.core.workers.load(Ordering::Acquire)
    }

    /// 正在执行任务的线程数。
    pub fn active_count(&self) -> usize {
        self.core.active.load(Ordering::Acquire)
    }

    /// 当前排队任务数。
    pub fn queue_size(&self) -> usize {
        self.core.queue.len()
    }

    /// 是否已关闭。
    pub fn is_shutdown(&self) -> bool {
        self.core.shutdown.load(Ordering::Acquire)
    }

    /// 状态快照。
    pub fn snapshot(&self) -> ExecutorSnapshot {
        self.core.snapshot()
    }

    /// 关闭线程池：拒绝后续提交，丢弃排队任务，空闲线程随即退出。
    pub fn shutdown(&self) {
        self.core.shutdown.store(true, Ordering::Release);
        self.core.queue.shutdown();
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PoolCore {
    fn dispatch(self: &Arc<Self>, mut task: Task) -> Result<(), FlareError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(FlareError::new(
                codes::EXECUTOR_SHUTDOWN,
                format!("thread pool `{}` is already shut down", self.name),
            ));
        }

        // 核心线程未满：直接扩线程并携带首任务。
        if self.workers.load(Ordering::Acquire) < self.core_size {
            match self.try_spawn(Some(task), self.core_size) {
                Ok(()) => return Ok(()),
                Err(Some(returned)) => task = returned,
                Err(None) => return Ok(()),
            }
        }

        // eager 形态：没有空闲线程就先扩容，而不是排队。
        if self.eager
            && self.queue.waiting() == 0
            && self.workers.load(Ordering::Acquire) < self.max_size
        {
            match self.try_spawn(Some(task), self.max_size) {
                Ok(()) => return Ok(()),
                Err(Some(returned)) => task = returned,
                Err(None) => return Ok(()),
            }
        }

        match self.queue.offer(task) {
            Ok(()) => {
                // 队列接纳后确保至少有一个线程会来消费（核心数为零的形态）。
                if self.workers.load(Ordering::Acquire) == 0 {
                    let _ = self.try_spawn(None, self.max_size);
                }
                Ok(())
            }
            Err(task) => match self.try_spawn(Some(task), self.max_size) {
                Ok(()) => Ok(()),
                Err(None) => Ok(()),
                Err(Some(task)) => {
                    if self.eager {
                        match self.queue.retry_offer(task, RETRY_OFFER_TIMEOUT) {
                            Ok(()) => Ok(()),
                            Err(_task) => Err(self.reject()),
                        }
                    } else {
                        Err(self.reject())
                    }
                }
            },
        }
    }

    /// 在 `bound` 之内扩一个工作线程；`Err(Some(task))` 表示未扩成且任务退回，
    /// `Err(None)` 表示线程启动失败但任务已入队兜底。
    fn try_spawn(self: &Arc<Self>, first: Option<Task>, bound: usize) -> Result<(), Option<Task>> {
        loop {
            let current = self.workers.load(Ordering::Acquire);
            if current >= bound {
                return Err(first);
            }
            if self
                .workers
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
        self.largest
            .fetch_max(self.workers.load(Ordering::Acquire), Ordering::AcqRel);

        let core = Arc::clone(self);
        let spawned = self.factory.spawn(move || core.run_worker());
        match spawned {
            Ok(()) => {
                if let Some(task) = first {
                    // 首任务经由队列移交，新线程必然在队列上等待。
                    if let Err(task) = self.queue.retry_offer(task, RETRY_OFFER_TIMEOUT) {
                        return Err(Some(task));
                    }
                }
                Ok(())
            }
            Err(error) => {
                self.workers.fetch_sub(1, Ordering::AcqRel);
                observability::error(
                    "flare.executor",
                    &format!("failed to spawn worker for pool `{}`", self.name),
                    Some(&error),
                );
                Err(first)
            }
        }
    }

    fn run_worker(self: Arc<Self>) {
        loop {
            let keep_alive = if self.workers.load(Ordering::Acquire) > self.core_size {
                self.keep_alive
            } else {
                None
            };
            match self.queue.poll(keep_alive) {
                Polled::Task(task) => self.run_task(task),
                Polled::Timeout => {
                    if self.try_retire() {
                        return;
                    }
                }
                Polled::Shutdown => {
                    self.workers.fetch_sub(1, Ordering::AcqRel);
                    return;
                }
            }
        }
    }

    /// 空闲退出只允许把线程数缩到核心数，比较交换防止并发退出越界。
    fn try_retire(&self) -> bool {
        loop {
            let current = self.workers.load(Ordering::Acquire);
            if current <= self.core_size {
                return false;
            }
            if self
                .workers
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn run_task(&self, task: Task) {
        self.active.fetch_add(1, Ordering::AcqRel);
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            observability::warn(
                "flare.executor",
                &format!("task panicked in pool `{}`", self.name),
            );
        }
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    fn snapshot(&self) -> ExecutorSnapshot {
        ExecutorSnapshot {
            name: self.name.clone(),
            core_size: self.core_size,
            max_size: self.max_size,
            pool_size: self.workers.load(Ordering::Acquire),
            largest_pool_size: self.largest.load(Ordering::Acquire),
            active_count: self.active.load(Ordering::Acquire),
            queue_size: self.queue.len(),
        }
    }

    fn reject(&self) -> FlareError {
        self.policy.rejected(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Task {
        Box::new(|| {})
    }

    #[test]
    fn queue_capacity_mapping() {
        assert_eq!(QueueCapacity::from_queues(0), QueueCapacity::Handoff);
        assert_eq!(QueueCapacity::from_queues(-1), QueueCapacity::Unbounded);
        assert_eq!(QueueCapacity::from_queues(16), QueueCapacity::Bounded(16));
    }

    #[test]
    fn handoff_requires_waiting_taker() {
        let queue = TaskQueue::new(QueueCapacity::Handoff);
        assert!(queue.offer(noop()).is_err());
    }

    #[test]
    fn bounded_queue_rejects_when_full() {
        let queue = TaskQueue::new(QueueCapacity::Bounded(1));
        assert!(queue.offer(noop()).is_ok());
        assert!(queue.offer(noop()).is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn unbounded_queue_absorbs_offers() {
        let queue = TaskQueue::new(QueueCapacity::Unbounded);
        for _ in 0..64 {
            assert!(queue.offer(noop()).is_ok());
        }
        assert_eq!(queue.len(), 64);
    }

    #[test]
    fn shutdown_queue_refuses_offers() {
        let queue = TaskQueue::new(QueueCapacity::Unbounded);
        queue.shutdown();
        assert!(queue.offer(noop()).is_err());
    }
}
