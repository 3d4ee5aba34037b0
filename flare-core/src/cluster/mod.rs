//! 集群选路：候选端点契约、活跃计数台账与按调用选择算法。

pub mod endpoint;
pub mod least_active;
pub mod loadbalance;
pub mod random;

pub use endpoint::{begin_call, status_of, ActiveGuard, Endpoint, EndpointStatus, StaticEndpoint};
pub use least_active::LeastActiveLoadBalance;
pub use loadbalance::{endpoint_weight, LoadBalance, RandomSource, SeededRandom, ThreadRandom};
pub use random::RandomLoadBalance;

use crate::extension::catalog;
use crate::extension::class::ExtensionClass;

/// 把内置选路算法登记到类型目录；由目录在首次解析前调用。
pub(crate) fn register_builtins() {
    catalog::register(ExtensionClass::<dyn LoadBalance>::normal(
        "flare_core::cluster::least_active::LeastActiveLoadBalance",
        |_ctx| Ok(LeastActiveLoadBalance::default()),
        |balance| balance,
    ));
    catalog::register(ExtensionClass::<dyn LoadBalance>::normal(
        "flare_core::cluster::random::RandomLoadBalance",
        |_ctx| Ok(RandomLoadBalance::default()),
        |balance| balance,
    ));
}
