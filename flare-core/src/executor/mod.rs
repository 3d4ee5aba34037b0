//! 执行器工厂：按 URL 参数物化工作线程池，并安装带报告的拒绝策略。

pub mod abort_policy;
pub mod pool;
pub mod support;
pub mod thread_factory;
pub mod thread_pool;

pub use abort_policy::AbortPolicyWithReport;
pub use pool::{Executor, ExecutorConfig, ExecutorSnapshot, QueueCapacity};
pub use support::{CachedThreadPool, EagerThreadPool, FixedThreadPool, LimitedThreadPool};
pub use thread_factory::NamedThreadFactory;
pub use thread_pool::ThreadPool;

use crate::extension::catalog;
use crate::extension::class::ExtensionClass;

/// 把内置线程池形态登记到类型目录；由目录在首次解析前调用。
pub(crate) fn register_builtins() {
    catalog::register(ExtensionClass::<dyn ThreadPool>::normal(
        "flare_core::executor::support::fixed::FixedThreadPool",
        |_ctx| Ok(FixedThreadPool),
        |pool| pool,
    ));
    catalog::register(ExtensionClass::<dyn ThreadPool>::normal(
        "flare_core::executor::support::cached::CachedThreadPool",
        |_ctx| Ok(CachedThreadPool),
        |pool| pool,
    ));
    catalog::register(ExtensionClass::<dyn ThreadPool>::normal(
        "flare_core::executor::support::limited::LimitedThreadPool",
        |_ctx| Ok(LimitedThreadPool),
        |pool| pool,
    ));
    catalog::register(ExtensionClass::<dyn ThreadPool>::normal(
        "flare_core::executor::support::eager::EagerThreadPool",
        |_ctx| Ok(EagerThreadPool),
        |pool| pool,
    ));
}
