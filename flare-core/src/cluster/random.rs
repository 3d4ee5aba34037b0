use std::sync::Arc;

use crate::error::{codes, FlareError};
use crate::invocation::Invocation;
use crate::url::Url;

use super::endpoint::Endpoint;
use super::loadbalance::{endpoint_weight, LoadBalance, RandomSource, ThreadRandom};

/// 加权随机选路：按预热后权重的比例抽取端点。
///
/// # 逻辑解析（How）
/// - 权重全部相同时退化为均匀随机，省去区间扣减；
/// - 否则在 `[0, 总权重)` 抽一点，按输入顺序扣减权重定位区间。
pub struct RandomLoadBalance {
    random: Arc<dyn RandomSource>,
}

impl RandomLoadBalance {
    /// 注册中心使用的扩展名。
    pub const NAME: &'static str = "random";

    /// 以指定随机源构造。
    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }
}

impl Default for RandomLoadBalance {
    fn default() -> Self {
        Self::with_random(Arc::new(ThreadRandom))
    }
}

impl LoadBalance for RandomLoadBalance {
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

        let mut weights = vec![0u64; length];
        let mut total_weight = 0u64;
        let mut same_weight = true;
        for (index, endpoint) in endpoints.iter().enumerate() {
            let weight = endpoint_weight(endpoint.as_ref(), invocation);
            weights[index] = weight;
            total_weight += weight;
            if same_weight && index > 0 && weight != weights[index - 1] {
                same_weight = false;
            }
        }

        if !same_weight && total_weight > 0 {
            let mut offset = self.random.next_bounded(total_weight);
            for (index, &weight) in weights.iter().enumerate() {
                if offset < weight {
                    return Ok(endpoints[index].clone());
                }
                offset -= weight;
            }
        }
        let pick = self.random.next_bounded(length as u64) as usize;
        Ok(endpoints[pick].clone())
    }
}
