use std::sync::Arc;

use crate::constants::{
    CORE_THREADS_KEY, DEFAULT_CORE_THREADS, DEFAULT_QUEUES, DEFAULT_THREADS, DEFAULT_THREAD_NAME,
    QUEUES_KEY, THREADS_KEY, THREAD_NAME_KEY,
};
use crate::error::FlareError;
use crate::executor::pool::{Executor, ExecutorConfig};
use crate::executor::thread_pool::ThreadPool;
use crate::url::Url;

/// 可伸长线程池：线程数只增不减，避免收缩后突发流量的重建抖动。
pub struct LimitedThreadPool;

impl LimitedThreadPool {
    /// 注册中心使用的扩展名。
    pub const NAME: &'static str = "limited";
}

impl ThreadPool for LimitedThreadPool {
    fn executor(&self, url: &Url) -> Result<Arc<Executor>, FlareError> {
        let name = url
            .get_parameter(THREAD_NAME_KEY)
            .unwrap_or(DEFAULT_THREAD_NAME)
            .to_string();
        let core = url.get_positive(CORE_THREADS_KEY, DEFAULT_CORE_THREADS);
        let threads = url.get_positive(THREADS_KEY, DEFAULT_THREADS);
        let queues = url.get_i64(QUEUES_KEY).unwrap_or(DEFAULT_QUEUES);
        Ok(Arc::new(Executor::new(ExecutorConfig {
            name,
            core_size: core,
            max_size: threads,
            // 不因空闲退出，实现"只增不减"。
            keep_alive: None,
            queues,
            eager: false,
            url: url.clone(),
        })))
    }
}
