use std::sync::Arc;

use crate::constants::{
    DEFAULT_QUEUES, DEFAULT_THREADS, DEFAULT_THREAD_NAME, QUEUES_KEY, THREADS_KEY, THREAD_NAME_KEY,
};
use crate::error::FlareError;
use crate::executor::pool::{Executor, ExecutorConfig};
use crate::executor::thread_pool::ThreadPool;
use crate::url::Url;

/// 固定大小线程池（缺省形态）：启动即建满 `threads` 个常驻线程，不收缩。
pub struct FixedThreadPool;

impl FixedThreadPool {
    /// 注册中心使用的扩展名。
    pub const NAME: &'static str = "fixed";
}

impl ThreadPool for FixedThreadPool {
    fn executor(&self, url: &Url) -> Result<Arc<Executor>, FlareError> {
        let name = url
            .get_parameter(THREAD_NAME_KEY)
            .unwrap_or(DEFAULT_THREAD_NAME)
            .to_string();
        let threads = url.get_positive(THREADS_KEY, DEFAULT_THREADS);
        let queues = url.get_i64(QUEUES_KEY).unwrap_or(DEFAULT_QUEUES);
        Ok(Arc::new(Executor::new(ExecutorConfig {
            name,
            core_size: threads,
            max_size: threads,
            keep_alive: None,
            queues,
            eager: false,
            url: url.clone(),
        })))
    }
}
