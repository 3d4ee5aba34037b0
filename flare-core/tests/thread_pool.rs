//! 线程池工厂的四种形态、队列策略与带报告的拒绝行为。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flare_core::error::codes;
use flare_core::executor::{Executor, ThreadPool};
use flare_core::extension::extension_registry;
use flare_core::Url;
use parking_lot::{Condvar, Mutex};
use tempfile::TempDir;

/// 手动闸门：任务阻塞在闸门上，测试控制释放时机。
struct Gate {
    open: Mutex<bool>,
    signal: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            signal: Condvar::new(),
        })
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.signal.wait(&mut open);
        }
    }

    fn release(&self) {
        *self.open.lock() = true;
        self.signal.notify_all();
    }
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn pool_url(kind: &str) -> Url {
    Url::new("flare", "127.0.0.1", 20880, "demo.EchoService")
        .with_parameter("threadpool", kind)
        .with_parameter("dump.disabled", "true")
}

fn build(kind: &str, url: &Url) -> Arc<Executor> {
    extension_registry::<dyn ThreadPool>()
        .get(kind)
        .expect("线程池形态")
        .executor(url)
        .expect("装配")
}

#[test]
fn default_shape_is_fixed() {
    let registry = extension_registry::<dyn ThreadPool>();
    let by_alias = registry.get("true").expect("缺省别名");
    let fixed = registry.get("fixed").expect("fixed");
    assert!(Arc::ptr_eq(&by_alias, &fixed));
    assert_eq!(
        registry.supported_extensions(),
        vec![
            "cached".to_string(),
            "eager".to_string(),
            "fixed".to_string(),
            "limited".to_string()
        ]
    );
}

#[test]
fn adaptive_key_selects_the_shape() {
    let registry = extension_registry::<dyn ThreadPool>();
    let adaptive = registry.get_adaptive().expect("自适应句柄");
    let resolved = adaptive.resolve(&pool_url("cached")).expect("解析");
    let direct = registry.get("cached").expect("直接获取");
    assert!(Arc::ptr_eq(&resolved, &direct));

    let fallback = adaptive
        .resolve(&Url::new("flare", "h", 1, ""))
        .expect("缺省回退");
    let fixed = registry.get("fixed").expect("fixed");
    assert!(Arc::ptr_eq(&fallback, &fixed));
}

#[test]
fn fixed_handoff_rejects_when_saturated_and_dumps() {
    let dump_dir = TempDir::new().expect("转储目录");
    let url = Url::new("flare", "127.0.0.1", 20880, "demo.EchoService")
        .with_parameter("threadname", "FlareTest")
        .with_parameter("threads", "10")
        .with_parameter("queues", "0")
        .with_parameter("dump.directory", dump_dir.path().display().to_string());
    let executor = build("fixed", &url);

    let gate = Gate::new();
    for _ in 0..10 {
        let gate = gate.clone();
        executor.execute(move || gate.wait()).expect("前十个任务");
    }
    assert!(
        wait_until(Duration::from_secs(5), || executor.active_count() == 10),
        "十个长任务应全部占线"
    );

    let rejection = executor
        .execute(|| {})
        .expect_err("第十一个并发任务应被拒绝");
    assert_eq!(rejection.code(), codes::EXECUTOR_REJECTED);
    assert!(rejection.to_string().contains("FlareTest"));

    let dumped: Vec<String> = std::fs::read_dir(dump_dir.path())
        .expect("读目录")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        dumped
            .iter()
            .any(|name| name.starts_with("FlareTest_") && name.ends_with(".dump")),
        "应产生以线程名开头的转储文件: {dumped:?}"
    );

    gate.release();
    assert!(wait_until(Duration::from_secs(5), || executor.active_count() == 0));
    executor.shutdown();
}

#[test]
fn bounded_queue_buffers_then_rejects() {
    let url = pool_url("fixed")
        .with_parameter("threadname", "Bounded")
        .with_parameter("threads", "1")
        .with_parameter("queues", "1");
    let executor = build("fixed", &url);

    let gate = Gate::new();
    {
        let gate = gate.clone();
        executor.execute(move || gate.wait()).expect("占住唯一线程");
    }
    assert!(wait_until(Duration::from_secs(5), || executor.active_count() == 1));

    executor.execute(|| {}).expect("入队一个");
    assert_eq!(executor.queue_size(), 1);

    let rejection = executor.execute(|| {}).expect_err("队列已满");
    assert_eq!(rejection.code(), codes::EXECUTOR_REJECTED);

    gate.release();
    assert!(wait_until(Duration::from_secs(5), || executor.queue_size() == 0));
    executor.shutdown();
}

#[test]
fn unbounded_queue_absorbs_bursts() {
    let url = pool_url("fixed")
        .with_parameter("threadname", "Unbounded")
        .with_parameter("threads", "1")
        .with_parameter("queues", "-1");
    let executor = build("fixed", &url);

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..64 {
        let done = done.clone();
        executor
            .execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .expect("无界队列不拒绝");
    }
    assert!(
        wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 64),
        "全部任务应执行完毕"
    );
    executor.shutdown();
}

#[test]
fn cached_shape_spawns_on_demand_and_shrinks_when_idle() {
    let url = pool_url("cached")
        .with_parameter("threadname", "Cached")
        .with_parameter("alive", "50")
        .with_parameter("queues", "0");
    let executor = build("cached", &url);
    assert_eq!(executor.pool_size(), 0);

    let done = Arc::new(AtomicUsize::new(0));
    {
        let done = done.clone();
        executor
            .execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .expect("按需扩线程");
    }
    assert!(wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 1));
    assert!(
        wait_until(Duration::from_secs(5), || executor.pool_size() == 0),
        "空闲线程应按 alive 回收"
    );
    executor.shutdown();
}

#[test]
fn limited_shape_grows_but_never_shrinks() {
    let url = pool_url("limited")
        .with_parameter("threadname", "Limited")
        .with_parameter("threads", "2");
    let executor = build("limited", &url);

    let gate = Gate::new();
    for _ in 0..2 {
        let gate = gate.clone();
        executor.execute(move || gate.wait()).expect("扩到上限");
    }
    assert!(wait_until(Duration::from_secs(5), || executor.pool_size() == 2));
    gate.release();
    assert!(wait_until(Duration::from_secs(5), || executor.active_count() == 0));

    // 任务做完后线程保留，不因空闲回收。
    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(executor.pool_size(), 2);
    executor.shutdown();
}

#[test]
fn eager_shape_prefers_spawning_over_queueing() {
    let url = pool_url("eager")
        .with_parameter("threadname", "Eager")
        .with_parameter("threads", "2")
        .with_parameter("queues", "1");
    let executor = build("eager", &url);

    let gate = Gate::new();
    {
        let gate = gate.clone();
        executor.execute(move || gate.wait()).expect("第一个任务");
    }
    assert!(wait_until(Duration::from_secs(5), || executor.active_count() == 1));

    // 有空余上限时优先扩线程而不是排队。
    {
        let gate = gate.clone();
        executor.execute(move || gate.wait()).expect("第二个任务");
    }
    assert!(wait_until(Duration::from_secs(5), || executor.active_count() == 2));
    assert_eq!(executor.queue_size(), 0, "扩容优先于排队");

    // 上限打满后回落到有界队列。
    executor.execute(|| {}).expect("第三个任务入队");
    assert_eq!(executor.queue_size(), 1);

    let rejection = executor.execute(|| {}).expect_err("队列与线程都打满");
    assert_eq!(rejection.code(), codes::EXECUTOR_REJECTED);

    gate.release();
    assert!(wait_until(Duration::from_secs(5), || executor.queue_size() == 0));
    executor.shutdown();
}

#[test]
fn shutdown_refuses_new_tasks() {
    let url = pool_url("fixed")
        .with_parameter("threadname", "Closing")
        .with_parameter("threads", "1")
        .with_parameter("queues", "-1");
    let executor = build("fixed", &url);
    executor.execute(|| {}).expect("关闭前可提交");
    executor.shutdown();
    let error = executor.execute(|| {}).expect_err("关闭后拒绝");
    assert_eq!(error.code(), codes::EXECUTOR_SHUTDOWN);
    assert!(executor.is_shutdown());
}

#[test]
fn snapshot_reports_configuration_and_gauges() {
    let url = pool_url("fixed")
        .with_parameter("threadname", "Snap")
        .with_parameter("threads", "3")
        .with_parameter("queues", "5");
    let executor = build("fixed", &url);
    let gate = Gate::new();
    {
        let gate = gate.clone();
        executor.execute(move || gate.wait()).expect("占一个线程");
    }
    assert!(wait_until(Duration::from_secs(5), || executor.active_count() == 1));

    let snapshot = executor.snapshot();
    assert_eq!(snapshot.name, "Snap");
    assert_eq!(snapshot.core_size, 3);
    assert_eq!(snapshot.max_size, 3);
    assert_eq!(snapshot.active_count, 1);
    assert!(snapshot.pool_size >= 1);
    assert!(snapshot.largest_pool_size >= 1);

    gate.release();
    executor.shutdown();
}
