use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::constants::{
    DEFAULT_WARMUP_MS, DEFAULT_WEIGHT, LOADBALANCE_KEY, TIMESTAMP_KEY, WARMUP_KEY, WEIGHT_KEY,
};
use crate::error::FlareError;
use crate::extension::point::ExtensionPoint;
use crate::invocation::Invocation;
use crate::url::Url;

use super::endpoint::Endpoint;

/// `LoadBalance` 是集群选路算法的扩展点。
///
/// # 契约说明（What）
/// - **前置条件**：候选列表非空是调用方契约；空列表报 `cluster.no_endpoints`。
/// - **后置条件**：单候选时直接返回，不消耗随机源；选择结果对给定的随机序列与
///   `(权重, 活跃数)` 元组是确定的。
pub trait LoadBalance: Send + Sync {
    /// 从候选端点中选出一个。
    fn select(
        &self,
        endpoints: &[Arc<dyn Endpoint>],
        url: &Url,
        invocation: &Invocation,
    ) -> Result<Arc<dyn Endpoint>, FlareError>;
}

impl ExtensionPoint for dyn LoadBalance {
    const NAME: &'static str = "flare.cluster.LoadBalance";
    const DEFAULT_NAME: Option<&'static str> = Some(super::least_active::LeastActiveLoadBalance::NAME);
    const ADAPTIVE_KEYS: &'static [&'static str] = &[LOADBALANCE_KEY];
}

/// 选路随机源，抽象出可替换的均匀抽样能力。
///
/// 生产路径使用线程随机数；测试以固定种子或脚本序列复现抽样结果。
pub trait RandomSource: Send + Sync {
    /// 返回 `[0, bound)` 内的均匀随机数；`bound` 必须大于 0。
    fn next_bounded(&self, bound: u64) -> u64;
}

/// 线程随机数实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_bounded(&self, bound: u64) -> u64 {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// 固定种子实现，复现同一抽样序列。
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<SmallRng>,
}

impl SeededRandom {
    /// 以种子构造。
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_bounded(&self, bound: u64) -> u64 {
        self.rng.lock().gen_range(0..bound)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// 计算端点在本次调用中的生效权重，含预热降权。
///
/// # 逻辑解析（How）
/// - 权重取方法级 `weight` 参数，缺省 100；
/// - 端点带启动时间戳且在预热窗口内时，权重按运行时长线性放大，并收敛在
///   `[1, weight]` 区间，避免刚上线的端点被全量流量击穿。
pub fn endpoint_weight(endpoint: &dyn Endpoint, invocation: &Invocation) -> u64 {
    let url = endpoint.url();
    let weight = url
        .get_method_u64(invocation.method_name(), WEIGHT_KEY)
        .unwrap_or(DEFAULT_WEIGHT);
    if weight == 0 {
        return 0;
    }
    let Some(timestamp) = url.get_u64(TIMESTAMP_KEY) else {
        return weight;
    };
    let uptime = now_millis().saturating_sub(timestamp);
    let warmup = url.get_u64(WARMUP_KEY).unwrap_or(DEFAULT_WARMUP_MS);
    if uptime > 0 && uptime < warmup {
        warmup_weight(uptime, warmup, weight)
    } else {
        weight
    }
}

fn warmup_weight(uptime: u64, warmup: u64, weight: u64) -> u64 {
    let scaled = uptime.saturating_mul(weight) / warmup.max(1);
    scaled.clamp(1, weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::endpoint::StaticEndpoint;

    #[test]
    fn weight_defaults_to_100() {
        let endpoint = StaticEndpoint::new(Url::new("flare", "h", 1, ""));
        assert_eq!(endpoint_weight(&endpoint, &Invocation::new("echo")), 100);
    }

    #[test]
    fn method_weight_overrides_global() {
        let endpoint = StaticEndpoint::new(
            Url::new("flare", "h", 1, "")
                .with_parameter("weight", "80")
                .with_parameter("echo.weight", "20"),
        );
        assert_eq!(endpoint_weight(&endpoint, &Invocation::new("echo")), 20);
        assert_eq!(endpoint_weight(&endpoint, &Invocation::new("ping")), 80);
    }

    #[test]
    fn warmup_scales_linearly_and_clamps() {
        assert_eq!(warmup_weight(1, 600_000, 100), 1);
        assert_eq!(warmup_weight(300_000, 600_000, 100), 50);
        assert_eq!(warmup_weight(599_999, 600_000, 100), 99);
    }

    #[test]
    fn cold_endpoint_is_downweighted() {
        let endpoint = StaticEndpoint::new(
            Url::new("flare", "h", 1, "")
                .with_parameter("timestamp", now_millis().to_string())
                .with_parameter("warmup", "600000"),
        );
        let weight = endpoint_weight(&endpoint, &Invocation::new("echo"));
        assert!(weight <= 100);
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let first = SeededRandom::new(42);
        let second = SeededRandom::new(42);
        for _ in 0..16 {
            assert_eq!(first.next_bounded(1000), second.next_bounded(1000));
        }
    }
}
