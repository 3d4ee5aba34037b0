//! 结果缓存的工厂契约。
//!
//! 只定义存取与工厂两层契约，具体存储实现（LRU、过期表、线程局部表）由宿主或
//! 插件 crate 提供并登记到类型目录。

use std::any::Any;
use std::sync::Arc;

use crate::constants::CACHE_KEY;
use crate::error::FlareError;
use crate::extension::point::ExtensionPoint;
use crate::invocation::Invocation;
use crate::url::Url;

/// 键值存取契约：对热点结果做进程内加速。
///
/// # 契约说明（What）
/// - `put` 覆盖同键旧值；`get` 未命中返回 `None`；
/// - 值以类型擦除形式存放，调用方负责按约定类型还原；
/// - 实现必须线程安全，容量与淘汰策略由实现自行定义。
pub trait Cache: Send + Sync {
    /// 写入键值。
    fn put(&self, key: String, value: Arc<dyn Any + Send + Sync>);

    /// 读取键值。
    fn get(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// 缓存工厂扩展点：按 `(URL, 调用)` 维度物化缓存实例。
///
/// 自适应键为 `cache`，URL 未指定时回退 `lru` 缺省名。
pub trait CacheFactory: Send + Sync + std::fmt::Debug {
    /// 取得调用对应的缓存实例。
    fn cache(&self, url: &Url, invocation: &Invocation) -> Result<Arc<dyn Cache>, FlareError>;
}

impl ExtensionPoint for dyn CacheFactory {
    const NAME: &'static str = "flare.cache.CacheFactory";
    const DEFAULT_NAME: Option<&'static str> = Some("lru");
    const ADAPTIVE_KEYS: &'static [&'static str] = &[CACHE_KEY];
}
