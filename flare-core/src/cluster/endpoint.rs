use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::url::Url;

/// `Endpoint` 是集群选路的候选对象：一个可被调用的服务端地址。
///
/// # 契约说明（What）
/// - `url` 返回端点的配置快照，权重、预热与时间戳参数都从这里读取；
/// - 活跃计数不在本契约内，由进程级台账按 `(地址, 方法)` 维护。
pub trait Endpoint: Send + Sync + std::fmt::Debug {
    /// 端点的配置与寻址描述。
    fn url(&self) -> &Url;
}

/// 以静态 URL 实现的最简端点，供宿主装配与测试使用。
#[derive(Clone, Debug)]
pub struct StaticEndpoint {
    url: Url,
}

impl StaticEndpoint {
    /// 包装一个 URL 为端点。
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl Endpoint for StaticEndpoint {
    fn url(&self) -> &Url {
        &self.url
    }
}

/// `EndpointStatus` 维护单个 `(地址, 方法)` 的并发统计。
///
/// # 设计背景（Why）
/// - 最少活跃算法依赖"调用前后计数差"：越慢的端点在途计数越大，应分到更少流量；
/// - 统计必须跨调用方共享，因此以进程级台账集中存放。
///
/// # 契约说明（What）
/// - `active` 为当前在途调用数；`total` 为历史调用总量，供观测使用；
/// - 计数增减由 [`ActiveGuard`] 的构造与析构配对完成，异常路径也不会泄漏计数。
#[derive(Debug, Default)]
pub struct EndpointStatus {
    active: AtomicU32,
    total: AtomicU64,
}

impl EndpointStatus {
    /// 当前在途调用数。
    pub fn active(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    /// 历史调用总量。
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn begin(&self) {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn end(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

static LEDGER: OnceLock<DashMap<String, Arc<EndpointStatus>>> = OnceLock::new();

fn ledger() -> &'static DashMap<String, Arc<EndpointStatus>> {
    LEDGER.get_or_init(DashMap::new)
}

fn ledger_key(url: &Url, method: &str) -> String {
    format!("{}/{}#{method}", url.address(), url.path())
}

/// 查询 `(端点, 方法)` 的统计；首次访问时建立条目。
pub fn status_of(url: &Url, method: &str) -> Arc<EndpointStatus> {
    ledger()
        .entry(ledger_key(url, method))
        .or_default()
        .value()
        .clone()
}

/// RAII 形式的在途计数：构造时加一，析构时减一。
pub struct ActiveGuard {
    status: Arc<EndpointStatus>,
}

/// 标记一次调用开始，返回的守卫在离开作用域时自动结束计数。
pub fn begin_call(url: &Url, method: &str) -> ActiveGuard {
    let status = status_of(url, method);
    status.begin();
    ActiveGuard { status }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.status.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_balances_active_count() {
        let url = Url::new("flare", "ledger-test", 7001, "svc");
        assert_eq!(status_of(&url, "echo").active(), 0);
        {
            let _one = begin_call(&url, "echo");
            let _two = begin_call(&url, "echo");
            assert_eq!(status_of(&url, "echo").active(), 2);
        }
        assert_eq!(status_of(&url, "echo").active(), 0);
        assert_eq!(status_of(&url, "echo").total(), 2);
    }

    #[test]
    fn methods_are_tracked_separately() {
        let url = Url::new("flare", "ledger-test", 7002, "svc");
        let _echo = begin_call(&url, "echo");
        assert_eq!(status_of(&url, "echo").active(), 1);
        assert_eq!(status_of(&url, "ping").active(), 0);
    }
}
