//! 类型目录：描述符行中"类型路径"的解析后端。
//!
//! # 模块定位（Why）
//! - 描述符文件以文本行声明 `name=类型路径`，而无反射的运行时无法从字符串构造类型；
//!   类型目录把进程内可用的实现集中登记，充当类路径的角色。
//! - 框架自带实现（选路算法、线程池、注入器）在首次解析前惰性种子化；宿主与插件
//!   crate 在启动阶段调用 [`register`] 补充自己的实现。
//!
//! # 契约说明（What）
//! - 目录键为 `(扩展点类型, 类型路径)`；同键重复登记保留先到者并记录告警日志。
//! - 描述符行引用目录中不存在的路径时，由加载器记录为行级错误，不在此处失败。

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::extension::class::ExtensionClass;
use crate::extension::point::ExtensionPoint;
use crate::observability;

static CATALOG: OnceLock<DashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>> = OnceLock::new();
static BUILTINS: OnceLock<()> = OnceLock::new();

fn raw() -> &'static DashMap<(TypeId, String), Arc<dyn Any + Send + Sync>> {
    CATALOG.get_or_init(DashMap::new)
}

/// 惰性种子化框架自带实现；只执行一次。
fn ensure_builtins() {
    BUILTINS.get_or_init(|| {
        crate::cluster::register_builtins();
        crate::executor::register_builtins();
        crate::extension::inject::register_builtins();
    });
}

/// 登记一条扩展实现；返回是否为首次登记。
pub fn register<T: ExtensionPoint + ?Sized>(class: ExtensionClass<T>) -> bool {
    let key = (TypeId::of::<T>(), class.type_path().to_string());
    let table = raw();
    if table.contains_key(&key) {
        observability::warn(
            "flare.extension",
            &format!(
                "type `{}` already registered for point `{}`, keeping the first entry",
                key.1,
                T::NAME
            ),
        );
        return false;
    }
    table.insert(key, Arc::new(class));
    true
}

/// 按类型路径解析扩展实现登记。
pub(crate) fn resolve<T: ExtensionPoint + ?Sized>(
    type_path: &str,
) -> Option<Arc<ExtensionClass<T>>> {
    ensure_builtins();
    raw()
        .get(&(TypeId::of::<T>(), type_path.to_string()))
        .and_then(|entry| entry.value().clone().downcast::<ExtensionClass<T>>().ok())
}
