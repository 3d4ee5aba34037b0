use std::sync::Arc;

use crate::error::{codes, FlareError};
use crate::invocation::Invocation;
use crate::url::Url;

use super::endpoint::{status_of, Endpoint};
use super::loadbalance::{endpoint_weight, LoadBalance, RandomSource, ThreadRandom};

/// 最少活跃选路：优先把流量分给在途调用最少的端点。
///
/// # 设计背景（Why）
/// - 活跃数指调用前后计数差，越慢的端点在途计数越大；按最少活跃选择可以让慢端点
///   自动收到更少请求，形成负反馈。
///
/// # 逻辑解析（How）
/// 1. 单趟扫描找出最小活跃数及其下标集合，同时缓存各端点的预热后权重；
/// 2. 集合唯一时直接返回；
/// 3. 集合内权重不全相同且总权重大于零时，在 `[0, 总权重)` 抽一点，按输入顺序
///    扣减权重，首个使余量落入自身区间的端点当选；
/// 4. 否则在集合内做均匀随机。
///
/// # 契约说明（What）
/// - 算法 O(n)，每次调用分配两个长度为 n 的临时数组；
/// - 返回端点的活跃数等于本次扫描观察到的最小活跃数。
pub struct LeastActiveLoadBalance {
    random: Arc<dyn RandomSource>,
}

impl LeastActiveLoadBalance {
    /// 注册中心使用的扩展名。
    pub const NAME: &'static str = "leastactive";

    /// 以指定随机源构造，测试用来复现抽样序列。
    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }
}

impl Default for LeastActiveLoadBalance {
    fn default() -> Self {
        Self::with_random(Arc::new(ThreadRandom))
    }
}

impl LoadBalance for LeastActiveLoadBalance {
    fn select(
        &self,
        endpoints: &[Arc<dyn Endpoint>],
        _url: &Url,
        invocation: &Invocation,
    ) -> Result<Arc<dyn Endpoint>, FlareError> {
        if endpoints.is_empty() {
            return Err(FlareError::new(
                codes::CLUSTER_NO_ENDPOINTS,
                "no endpoint is available for selection",
            ));
        }
        let length = endpoints.len();
        if length == 1 {
            return Ok(endpoints[0].clone());
        }

        let mut least_active: Option<u32> = None;
        // 相同最小活跃数的个数与下标
        let mut least_count = 0usize;
        let mut least_indexes = vec![0usize; length];
        let mut weights = vec![0u64; length];
        let mut total_weight = 0u64;
        let mut first_weight = 0u64;
        let mut same_weight = true;

        for (index, endpoint) in endpoints.iter().enumerate() {
            let active = status_of(endpoint.url(), invocation.method_name()).active();
            let weight = endpoint_weight(endpoint.as_ref(), invocation);
            weights[index] = weight;
            if least_active.map(|least| active < least).unwrap_or(true) {
                // 发现更小的活跃数，重新统计
                least_active = Some(active);
                least_count = 1;
                least_indexes[0] = index;
                total_weight = weight;
                first_weight = weight;
                same_weight = true;
            } else if Some(active) == least_active {
                least_indexes[least_count] = index;
                least_count += 1;
                total_weight += weight;
                if same_weight && weight != first_weight {
                    same_weight = false;
                }
            }
        }

        if least_count == 1 {
            return Ok(endpoints[least_indexes[0]].clone());
        }
        if !same_weight && total_weight > 0 {
            let mut offset = self.random.next_bounded(total_weight);
            for &least_index in least_indexes.iter().take(least_count) {
                let weight = weights[least_index];
                if offset < weight {
                    return Ok(endpoints[least_index].clone());
                }
                offset -= weight;
            }
        }
        // 权重全部相同或总权重为零，均匀随机
        let pick = self.random.next_bounded(least_count as u64) as usize;
        Ok(endpoints[least_indexes[pick]].clone())
    }
}
