//! 调用过滤器扩展点。
//!
//! 过滤器管线本身属于调用链路（外部协作者），这里只声明扩展点契约与激活元数据的
//! 承载接口：注册中心的激活协议按分组、URL 触发键与排序权重筛选出生效的过滤器
//! 序列，调用链路按序执行。

use crate::error::FlareError;
use crate::extension::point::ExtensionPoint;
use crate::invocation::Invocation;
use crate::url::Url;

/// 调用前置钩子。
///
/// # 契约说明（What）
/// - 返回 `Err` 表示拦截本次调用，错误按统一错误域向上传递；
/// - 实现应是无状态或自管并发的，同一实例会被多线程复用。
pub trait Filter: Send + Sync {
    /// 在调用发出前检查或改写调用上下文。
    fn filter(&self, url: &Url, invocation: &Invocation) -> Result<(), FlareError>;
}

impl ExtensionPoint for dyn Filter {
    const NAME: &'static str = "flare.rpc.Filter";
    const ADAPTIVE_KEYS: &'static [&'static str] = &["filter"];
}
