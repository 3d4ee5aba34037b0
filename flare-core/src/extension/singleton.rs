use std::any::Any;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::extension::lifecycle::Lifecycle;

/// 进程级"实现类型 -> 单例"缓存条目。
///
/// `identity` 保存未擦除前的具体实例（`Arc<C>` 上转为 `Arc<dyn Any>`），
/// 同一实现类型在多个扩展名甚至多个注册中心下共享这一份实例。
#[derive(Clone)]
pub(crate) struct SingletonEntry {
    pub identity: Arc<dyn Any + Send + Sync>,
    pub lifecycle: Option<Arc<dyn Lifecycle>>,
}

static SINGLETONS: OnceLock<DashMap<&'static str, SingletonEntry>> = OnceLock::new();

fn table() -> &'static DashMap<&'static str, SingletonEntry> {
    SINGLETONS.get_or_init(DashMap::new)
}

/// 查询实现类型对应的单例。
pub(crate) fn lookup(type_path: &str) -> Option<SingletonEntry> {
    table().get(type_path).map(|entry| entry.value().clone())
}

/// 登记实现类型的单例；已存在时保留先到者并返回既有条目。
pub(crate) fn store(type_path: &'static str, entry: SingletonEntry) -> SingletonEntry {
    table().entry(type_path).or_insert(entry).value().clone()
}

/// 移除实现类型的单例，供编程式替换扩展使用。
pub(crate) fn remove(type_path: &str) {
    table().remove(type_path);
}

/// 取走全部单例条目，进程收尾时统一销毁。
pub(crate) fn drain() -> Vec<(&'static str, SingletonEntry)> {
    let table = table();
    let keys: Vec<&'static str> = table.iter().map(|entry| *entry.key()).collect();
    let mut drained = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some((path, entry)) = table.remove(key) {
            drained.push((path, entry));
        }
    }
    drained
}
