//! 依赖注入：构造上下文与注入器链。
//!
//! # 模块定位（Why）
//! - 原始体系通过反射扫描 setter 并向对象工厂索要依赖；无反射的运行时改为显式拉取：
//!   每个构造闭包收到 [`InjectionContext`]，按类型与名字声明自己需要的协作扩展。
//! - 注入器本身是一个扩展点（对象工厂的对应物），宿主可以登记自己的注入来源
//!   （如配置容器、测试替身），框架内置的 `registry` 注入器从全局注册中心解析。
//!
//! # 契约说明（What）
//! - 注入失败会记录告警并以 `Err` 返回；构造方对可选依赖应使用 `.ok()` 继续构造，
//!   单个依赖缺失不应毒化整个扩展点。
//! - 对同一 `(扩展点, 名字)` 的重入解析由注册中心的解析栈侦测并报循环错误。

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::FlareError;
use crate::extension::adaptive::Adaptive;
use crate::extension::catalog;
use crate::extension::class::ExtensionClass;
use crate::extension::error::ExtensionError;
use crate::extension::point::ExtensionPoint;
use crate::extension::registry::extension_registry;
use crate::observability;

type ErasedGet = fn(&str) -> Option<Arc<dyn Any + Send + Sync>>;

static ERASED: OnceLock<DashMap<TypeId, ErasedGet>> = OnceLock::new();

fn erased() -> &'static DashMap<TypeId, ErasedGet> {
    ERASED.get_or_init(DashMap::new)
}

/// 注册中心建立时登记类型擦除的取值入口，供注入器按 `TypeId` 取用。
pub(crate) fn register_erased<T: ExtensionPoint + ?Sized>() {
    erased()
        .entry(TypeId::of::<T>())
        .or_insert(erased_get::<T> as ErasedGet);
}

fn erased_get<T: ExtensionPoint + ?Sized>(name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    extension_registry::<T>()
        .get(name)
        .ok()
        .map(|instance| Arc::new(instance) as Arc<dyn Any + Send + Sync>)
}

pub(crate) fn erased_lookup(point: TypeId, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
    erased().get(&point).and_then(|getter| (*getter)(name))
}

/// `InjectionContext` 是构造闭包的依赖拉取入口。
///
/// # 契约说明（What）
/// - `point` 与 `extension_name` 标识正在构造的扩展，注入失败日志以此定位；
/// - `inject_named` 经注入器链解析具体实例；`inject_adaptive` 返回目标扩展点的
///   自适应句柄，对应原始体系"注入自适应实例"的缺省行为。
pub struct InjectionContext {
    point: &'static str,
    extension_name: String,
}

impl InjectionContext {
    pub(crate) fn new<T: ExtensionPoint + ?Sized>(extension_name: &str) -> Self {
        Self {
            point: T::NAME,
            extension_name: extension_name.to_string(),
        }
    }

    /// 正在构造的扩展点限定名。
    pub fn point(&self) -> &'static str {
        self.point
    }

    /// 正在构造的扩展名。
    pub fn extension_name(&self) -> &str {
        &self.extension_name
    }

    /// 按扩展点与名字注入一个具体实例。
    pub fn inject_named<D: ExtensionPoint + ?Sized>(
        &self,
        name: &str,
    ) -> Result<Arc<D>, FlareError> {
        // 先确认目标注册中心存在，让擦除入口就位。
        let _ = extension_registry::<D>();
        for injector in injectors() {
            if let Some(any) = injector.instance(TypeId::of::<D>(), D::NAME, name) {
                if let Ok(instance) = any.downcast::<Arc<D>>() {
                    return Ok((*instance).clone());
                }
            }
        }
        let error = ExtensionError::InjectionFailed {
            point: self.point,
            wanted: D::NAME,
            name: name.to_string(),
        };
        observability::warn(
            "flare.extension",
            &format!("injection into `{}` failed: {error}", self.extension_name),
        );
        Err(error.into())
    }

    /// 注入目标扩展点的自适应句柄。
    pub fn inject_adaptive<D: ExtensionPoint + ?Sized>(&self) -> Result<Adaptive<D>, FlareError> {
        extension_registry::<D>().get_adaptive()
    }
}

/// `ExtensionInjector` 定义注入来源的对象安全契约。
///
/// # 设计背景（Why）
/// - 对应原始体系的对象工厂扩展点：注入来源本身可插拔，按登记顺序逐个询问。
///
/// # 契约说明（What）
/// - `instance` 返回 `Arc<Arc<D>>` 的类型擦除形态；调用方负责按目标类型还原。
/// - 返回 `None` 表示本注入器不认识该请求，链路继续询问下一个注入器。
pub trait ExtensionInjector: Send + Sync {
    /// 解析 `(扩展点, 名字)` 对应的实例。
    fn instance(
        &self,
        point: TypeId,
        point_name: &str,
        name: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>>;
}

impl ExtensionPoint for dyn ExtensionInjector {
    const NAME: &'static str = "flare.extension.ExtensionInjector";
}

/// 从全局注册中心解析实例的内置注入器。
#[derive(Clone, Copy, Debug, Default)]
pub struct RegistryInjector;

impl ExtensionInjector for RegistryInjector {
    fn instance(
        &self,
        point: TypeId,
        _point_name: &str,
        name: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        erased_lookup(point, name)
    }
}

/// 注入器链快照；首次使用时从注册中心装配并缓存。
fn injectors() -> Vec<Arc<dyn ExtensionInjector>> {
    static CHAIN: OnceLock<Vec<Arc<dyn ExtensionInjector>>> = OnceLock::new();
    CHAIN
        .get_or_init(|| {
            let registry = extension_registry::<dyn ExtensionInjector>();
            registry
                .supported_extensions()
                .into_iter()
                .filter_map(|name| registry.get(&name).ok())
                .collect()
        })
        .clone()
}

pub(crate) fn register_builtins() {
    catalog::register(ExtensionClass::<dyn ExtensionInjector>::normal(
        "flare_core::extension::inject::RegistryInjector",
        |_ctx| Ok(RegistryInjector),
        |injector| injector,
    ));
}
