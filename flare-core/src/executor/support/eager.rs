use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    ALIVE_KEY, CORE_THREADS_KEY, DEFAULT_ALIVE_MS, DEFAULT_CORE_THREADS, DEFAULT_QUEUES,
    DEFAULT_THREAD_NAME, QUEUES_KEY, THREADS_KEY, THREAD_NAME_KEY,
};
use crate::error::FlareError;
use crate::executor::pool::{Executor, ExecutorConfig};
use crate::executor::thread_pool::ThreadPool;
use crate::url::Url;

/// 急切线程池：有任务而无空闲线程时优先扩线程到上限，然后才排队；
/// 队列满时在限时窗口内重试入队，超时才进入拒绝流程。
pub struct EagerThreadPool;

impl EagerThreadPool {
    /// 注册中心使用的扩展名。
    pub const NAME: &'static str = "eager";
}

impl ThreadPool for EagerThreadPool {
    fn executor(&self, url: &Url) -> Result<Arc<Executor>, FlareError> {
        let name = url
            .get_parameter(THREAD_NAME_KEY)
            .unwrap_or(DEFAULT_THREAD_NAME)
            .to_string();
        let core = url.get_positive(CORE_THREADS_KEY, DEFAULT_CORE_THREADS);
        let threads = url.get_positive(THREADS_KEY, usize::MAX);
        let queues = url.get_i64(QUEUES_KEY).unwrap_or(DEFAULT_QUEUES);
        let alive = url.get_u64(ALIVE_KEY).unwrap_or(DEFAULT_ALIVE_MS);
        Ok(Arc::new(Executor::new(ExecutorConfig {
            name,
            core_size: core,
            max_size: threads,
            keep_alive: Some(Duration::from_millis(alive)),
            queues,
            eager: true,
            url: url.clone(),
        })))
    }
}
