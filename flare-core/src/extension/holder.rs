use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

/// `Holder` 是一次发布的单槽缓存，承载按名惰性实例化的双检逻辑。
///
/// # 逻辑解析（How）
/// - 读路径取共享锁并克隆 `Arc` 快照；
/// - 创建路径先独占 `creating` 锁，复查槽位后再构造实例，保证同名扩展进程内只构造一次；
/// - 槽级锁粒度与原始设计一致，不同名字的创建互不阻塞。
pub(crate) struct Holder<T: ?Sized> {
    slot: RwLock<Option<Arc<T>>>,
    creating: Mutex<()>,
}

impl<T: ?Sized> Holder<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: RwLock::new(None),
            creating: Mutex::new(()),
        }
    }

    /// 读取当前快照。
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.slot.read().clone()
    }

    /// 发布实例；调用方必须持有 [`Holder::lock`] 返回的创建锁。
    pub(crate) fn set(&self, value: Arc<T>) {
        *self.slot.write() = Some(value);
    }

    /// 清空槽位，供编程式替换扩展后重建实例。
    pub(crate) fn clear(&self) {
        *self.slot.write() = None;
    }

    /// 获取槽级创建锁。
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.creating.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_once_snapshot_semantics() {
        let holder: Holder<str> = Holder::new();
        assert!(holder.get().is_none());
        {
            let _guard = holder.lock();
            holder.set(Arc::from("ready"));
        }
        let first = holder.get().expect("set");
        let second = holder.get().expect("set");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
