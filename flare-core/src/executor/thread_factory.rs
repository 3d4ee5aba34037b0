use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// 命名线程工厂：为池内线程生成 `{前缀}-thread-{序号}` 形式的名字。
///
/// # 契约说明（What）
/// - 序号从 1 开始单调递增；
/// - `daemon` 标志保留自原始约定，仅作记录，宿主平台的线程没有守护语义，
///   有序退出依赖线程池自身的关闭流程。
#[derive(Debug)]
pub struct NamedThreadFactory {
    prefix: String,
    daemon: bool,
    sequence: AtomicUsize,
}

impl NamedThreadFactory {
    /// 以前缀与守护标志构造工厂。
    pub fn new(prefix: impl Into<String>, daemon: bool) -> Self {
        Self {
            prefix: prefix.into(),
            daemon,
            sequence: AtomicUsize::new(1),
        }
    }

    /// 线程名前缀。
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 守护标志（仅记录）。
    pub fn daemon(&self) -> bool {
        self.daemon
    }

    /// 以命名线程运行闭包。
    pub fn spawn<F>(&self, run: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let number = self.sequence.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("{}-thread-{number}", self.prefix))
            .spawn(run)
            .map(|_handle| ())
    }
}
