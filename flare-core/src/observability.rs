//! 结构化日志外观层。
//!
//! # 模块定位（Why）
//! - 注入失败、重复扩展告警与线程池拒绝报告都属于"必须可见但不能中断主流程"的事件，
//!   需要一个与宿主日志体系解耦的最小外观。
//! - 宿主可以对接 `tracing`、syslog 或自研后端；本模块只约定语义，不绑定实现。
//!
//! # 总体结构（How）
//! - [`Logger`] Trait 定义唯一的 `log` 提交口，附带按级别的便捷方法；
//! - 进程级安装点基于 `OnceLock`，发布一次之后全局可见；未安装时落到 [`NoopLogger`]。
//!
//! # 风险提示（Trade-offs）
//! - 安装点只允许设置一次，测试内请在进程早期安装捕获实现；
//! - 外观不做缓冲与异步化，实现方若有耗时后端应自行移交后台线程。

use std::sync::{Arc, OnceLock};

/// 日志级别枚举，取 `tracing` 与 syslog 语义的交集。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    Debug,
    Info,
    Warn,
    Error,
}

/// 日志接口的核心契约。
///
/// # 契约说明（What）
/// - `log` 为唯一必需方法；`target` 表示日志分类（如 `flare.extension`）。
/// - **前置条件**：实现必须线程安全（`Send + Sync + 'static`）。
/// - **后置条件**：实现应尽量保证非阻塞，必要时将日志异步写入后台线程。
pub trait Logger: Send + Sync + 'static {
    /// 提交一条结构化日志。
    fn log(
        &self,
        severity: LogSeverity,
        target: &str,
        message: &str,
        error: Option<&(dyn std::error::Error + 'static)>,
    );
}

/// 丢弃一切输出的缺省实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(
        &self,
        _severity: LogSeverity,
        _target: &str,
        _message: &str,
        _error: Option<&(dyn std::error::Error + 'static)>,
    ) {
    }
}

static LOGGER: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// 安装进程级日志实现；只有首次调用生效，返回是否安装成功。
pub fn set_logger(logger: Arc<dyn Logger>) -> bool {
    LOGGER.set(logger).is_ok()
}

/// 获取当前日志实现；未安装时返回 no-op。
pub fn logger() -> Arc<dyn Logger> {
    LOGGER
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::new(NoopLogger))
}

pub(crate) fn info(target: &str, message: &str) {
    logger().log(LogSeverity::Info, target, message, None);
}

pub(crate) fn warn(target: &str, message: &str) {
    logger().log(LogSeverity::Warn, target, message, None);
}

pub(crate) fn error(target: &str, message: &str, error: Option<&(dyn std::error::Error + 'static)>) {
    logger().log(LogSeverity::Error, target, message, error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLogger(Arc<AtomicUsize>);

    impl Logger for CountingLogger {
        fn log(
            &self,
            _severity: LogSeverity,
            _target: &str,
            _message: &str,
            _error: Option<&(dyn std::error::Error + 'static)>,
        ) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn install_is_publish_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        assert!(set_logger(Arc::new(CountingLogger(counter.clone()))));
        // 先到者生效，后续安装一律失败。
        assert!(!set_logger(Arc::new(NoopLogger)));
        warn("flare.test", "observed");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
