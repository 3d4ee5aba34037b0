use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    ALIVE_KEY, DEFAULT_ALIVE_MS, DEFAULT_QUEUES, DEFAULT_THREAD_NAME, QUEUES_KEY, THREADS_KEY,
    THREAD_NAME_KEY,
};
use crate::error::FlareError;
use crate::executor::pool::{Executor, ExecutorConfig};
use crate::executor::thread_pool::ThreadPool;
use crate::url::Url;

/// 缓存线程池：线程按需创建、上限不设，空闲一分钟自动回收。
pub struct CachedThreadPool;

impl CachedThreadPool {
    /// 注册中心使用的扩展名。
    pub const NAME: &'static str = "cached";
}

impl ThreadPool for CachedThreadPool {
    fn executor(&self, url: &Url) -> Result<Arc<Executor>, FlareError> {
        let name = url
            .get_parameter(THREAD_NAME_KEY)
            .unwrap_or(DEFAULT_THREAD_NAME)
            .to_string();
        // threads 在缓存形态下是软上限，缺省视同不设限。
        let threads = url.get_positive(THREADS_KEY, usize::MAX);
        let queues = url.get_i64(QUEUES_KEY).unwrap_or(DEFAULT_QUEUES);
        let alive = url.get_u64(ALIVE_KEY).unwrap_or(DEFAULT_ALIVE_MS);
        Ok(Arc::new(Executor::new(ExecutorConfig {
            name,
            core_size: 0,
            max_size: threads,
            keep_alive: Some(Duration::from_millis(alive)),
            queues,
            eager: false,
            url: url.clone(),
        })))
    }
}
