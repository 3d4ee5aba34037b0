//! URL 参数键与缺省值的集中定义。
//!
//! # 模块定位（Why）
//! - 扩展选路、集群权重与线程池装配都从 URL 读取参数，键名必须跨子系统一致。
//! - 集中声明可避免各处散落字符串字面量，也让配置中心与文档有单一事实来源。
//!
//! # 契约说明（What）
//! - 所有键名均为小写；方法级参数通过 `"{method}.{key}"` 形式覆盖全局值。
//! - 缺省值与原始部署约定保持一致，调整缺省值属于破坏性变更。

/// 缺省扩展集合的占位名，出现在激活列表中表示"在此处拼接缺省扩展"。
pub const DEFAULT_KEY: &str = "default";

/// 激活列表中的移除前缀：`-name` 表示剔除 `name`，`-default` 表示剔除全部缺省扩展。
pub const REMOVE_VALUE_PREFIX: &str = "-";

/// `get("true")` 的保留别名，等价于查询扩展点的缺省扩展。
pub const TRUE_VALUE: &str = "true";

/// 消费端分组名。
pub const GROUP_CONSUMER: &str = "consumer";
/// 提供端分组名。
pub const GROUP_PROVIDER: &str = "provider";

/// 集群选路算法的自适应键。
pub const LOADBALANCE_KEY: &str = "loadbalance";
/// 端点权重参数。
pub const WEIGHT_KEY: &str = "weight";
/// 端点权重缺省值。
pub const DEFAULT_WEIGHT: u64 = 100;
/// 预热时长参数（毫秒）。
pub const WARMUP_KEY: &str = "warmup";
/// 预热时长缺省值：十分钟。
pub const DEFAULT_WARMUP_MS: u64 = 10 * 60 * 1000;
/// 端点启动时间戳参数（毫秒）。
pub const TIMESTAMP_KEY: &str = "timestamp";

/// 线程池形态的自适应键。
pub const THREADPOOL_KEY: &str = "threadpool";
/// 线程名前缀参数。
pub const THREAD_NAME_KEY: &str = "threadname";
/// 线程名前缀缺省值。
pub const DEFAULT_THREAD_NAME: &str = "Flare";
/// 最大线程数参数。
pub const THREADS_KEY: &str = "threads";
/// 最大线程数缺省值。
pub const DEFAULT_THREADS: usize = 200;
/// 核心线程数参数。
pub const CORE_THREADS_KEY: &str = "corethreads";
/// 核心线程数缺省值。
pub const DEFAULT_CORE_THREADS: usize = 0;
/// 任务队列容量参数：`0` 为直接交接，负数为无界队列，正数为有界队列。
pub const QUEUES_KEY: &str = "queues";
/// 任务队列容量缺省值。
pub const DEFAULT_QUEUES: i64 = 0;
/// 空闲线程存活时长参数（毫秒）。
pub const ALIVE_KEY: &str = "alive";
/// 空闲线程存活时长缺省值：一分钟。
pub const DEFAULT_ALIVE_MS: u64 = 60 * 1000;
/// 拒绝诊断转储目录参数。
pub const DUMP_DIRECTORY_KEY: &str = "dump.directory";
/// 关闭拒绝诊断转储的开关参数。
pub const DUMP_DISABLED_KEY: &str = "dump.disabled";

/// 结果缓存后端的自适应键。
pub const CACHE_KEY: &str = "cache";
