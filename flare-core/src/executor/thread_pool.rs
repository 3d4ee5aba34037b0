use std::sync::Arc;

use crate::constants::THREADPOOL_KEY;
use crate::error::FlareError;
use crate::extension::point::ExtensionPoint;
use crate::url::Url;

use super::pool::Executor;

/// `ThreadPool` 是线程池工厂的扩展点：按 URL 参数物化一个工作线程池。
///
/// # 契约说明（What）
/// - 同一 URL 的每次调用都会构建新的池，池的生命周期由调用方持有；
/// - 形态差异（fixed / cached / limited / eager）由各实现决定，线程命名与
///   拒绝策略对所有形态一致。
pub trait ThreadPool: Send + Sync {
    /// 依据 URL 参数构建执行器。
    fn executor(&self, url: &Url) -> Result<Arc<Executor>, FlareError>;
}

impl ExtensionPoint for dyn ThreadPool {
    const NAME: &'static str = "flare.executor.ThreadPool";
    const DEFAULT_NAME: Option<&'static str> = Some(super::support::fixed::FixedThreadPool::NAME);
    const ADAPTIVE_KEYS: &'static [&'static str] = &[THREADPOOL_KEY];
}
