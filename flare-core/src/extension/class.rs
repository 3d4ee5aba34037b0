use std::any::Any;
use std::sync::Arc;

use crate::error::FlareError;
use crate::extension::inject::InjectionContext;
use crate::extension::lifecycle::Lifecycle;
use crate::extension::point::ExtensionPoint;
use crate::extension::singleton::{self, SingletonEntry};

/// 激活描述：声明一个普通扩展在何种条件下被自动纳入管线。
///
/// # 契约说明（What）
/// - `groups`：允许激活的分组；为空表示对所有分组生效。
/// - `values`：URL 触发键列表，支持 `key` 与 `key:value` 两种形式；为空表示无条件激活。
/// - `order`：排序权重，数值越小优先级越高；同序扩展按名字字典序稳定排序。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivateSpec {
    pub groups: &'static [&'static str],
    pub values: &'static [&'static str],
    pub order: i32,
}

impl ActivateSpec {
    /// 构造无条件激活的描述。
    pub const fn new(groups: &'static [&'static str], order: i32) -> Self {
        Self {
            groups,
            values: &[],
            order,
        }
    }

    /// 附加 URL 触发键。
    pub const fn with_values(mut self, values: &'static [&'static str]) -> Self {
        self.values = values;
        self
    }
}

/// 包装器描述：声明包装器的优先级与名字过滤条件。
///
/// - `order` 数值越小优先级越高，最高优先级的包装器位于最外层；
/// - 包装器作用于名字 `n` 当且仅当（`matches` 为空或包含 `n`）且（`mismatches` 不包含 `n`）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrapperSpec {
    pub order: i32,
    pub matches: &'static [&'static str],
    pub mismatches: &'static [&'static str],
}

impl WrapperSpec {
    /// 构造无过滤条件的包装器描述。
    pub const fn new(order: i32) -> Self {
        Self {
            order,
            matches: &[],
            mismatches: &[],
        }
    }

    /// 限定包装器只作用于列出的名字。
    pub const fn with_matches(mut self, matches: &'static [&'static str]) -> Self {
        self.matches = matches;
        self
    }

    /// 排除列出的名字。
    pub const fn with_mismatches(mut self, mismatches: &'static [&'static str]) -> Self {
        self.mismatches = mismatches;
        self
    }

    /// 判断包装器是否作用于给定扩展名。
    pub(crate) fn admits(&self, name: &str) -> bool {
        let matched =
            self.matches.is_empty() || self.matches.iter().any(|candidate| *candidate == name);
        matched && !self.mismatches.iter().any(|candidate| *candidate == name)
    }
}

/// 构造产物：上转后的接口实例与可选的生命周期视图。
pub(crate) struct Constructed<T: ?Sized> {
    pub instance: Arc<T>,
    pub lifecycle: Option<Arc<dyn Lifecycle>>,
}

/// 扩展类角色的轻量判别。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassKind {
    /// 按名索引的普通实现。
    Normal,
    /// 手写自适应分发器，取代合成分发。
    Adaptive,
    /// 以接口实例为唯一构造入参的装饰器。
    Wrapper,
}

type InstanceCtor<T> =
    Box<dyn Fn(&InjectionContext) -> Result<Constructed<T>, FlareError> + Send + Sync>;
type WrapperCtor<T> =
    Box<dyn Fn(Arc<T>, &InjectionContext) -> Result<Constructed<T>, FlareError> + Send + Sync>;

enum ClassRole<T: ?Sized> {
    Normal(InstanceCtor<T>),
    Adaptive(InstanceCtor<T>),
    Wrapper(WrapperSpec, WrapperCtor<T>),
}

/// `ExtensionClass` 是一条扩展实现的登记记录，对应原始体系中的"实现类"。
///
/// # 设计背景（Why）
/// - 没有反射的运行时无法从类型路径字符串凭空实例化类型，登记记录把"类型路径 ->
///   构造闭包"的映射显式化，描述符文件中的每一行最终解析到这里。
/// - 角色（普通 / 自适应 / 包装器）在登记时由所选构造器决定：包装器构造器的签名
///   以被装饰实例为入参，因此"带接口构造参数的实现必须按包装器归类"在类型层面
///   天然成立。
///
/// # 逻辑解析（How）
/// - `normal` 与 `adaptive` 的构造闭包内嵌进程级单例逻辑：按 `type_path` 命中缓存时
///   直接复用既有实例，否则构造、登记并返回；
/// - `normal_with_lifecycle` 额外捕获 `Arc<dyn Lifecycle>` 视图，供注册中心在就绪与
///   销毁阶段回调；
/// - 包装器每次装配都重新构造，不进入单例缓存，与原始语义一致。
///
/// # 契约说明（What）
/// - `type_path` 必须是进程内稳定且唯一的实现标识，约定使用 Rust 路径
///   （如 `flare_core::cluster::least_active::LeastActiveLoadBalance`）；
/// - 构造闭包须是无副作用可重试的；失败会被包装为实例化错误向调用方呈现。
///
/// # 风险提示（Trade-offs）
/// - 构造闭包以 `Box<dyn Fn>` 保存，相比泛型静态分发有一次间接调用开销；
///   实例化属于冷路径，可读性优先。
pub struct ExtensionClass<T: ?Sized> {
    type_path: &'static str,
    role: ClassRole<T>,
    activate: Option<ActivateSpec>,
}

impl<T: ExtensionPoint + ?Sized> ExtensionClass<T> {
    /// 登记普通实现。
    ///
    /// `ctor` 构造具体类型，`coerce` 在调用点完成到接口对象的上转（通常写 `|c| c`）。
    pub fn normal<C, F>(
        type_path: &'static str,
        ctor: F,
        coerce: fn(Arc<C>) -> Arc<T>,
    ) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(&InjectionContext) -> Result<C, FlareError> + Send + Sync + 'static,
    {
        Self {
            type_path,
            role: ClassRole::Normal(instance_ctor(type_path, ctor, coerce, None)),
            activate: None,
        }
    }

    /// 登记带生命周期能力的普通实现。
    pub fn normal_with_lifecycle<C, F>(
        type_path: &'static str,
        ctor: F,
        coerce: fn(Arc<C>) -> Arc<T>,
    ) -> Self
    where
        C: Lifecycle,
        F: Fn(&InjectionContext) -> Result<C, FlareError> + Send + Sync + 'static,
    {
        let cast: fn(Arc<C>) -> Arc<dyn Lifecycle> = |concrete| concrete;
        Self {
            type_path,
            role: ClassRole::Normal(instance_ctor(type_path, ctor, coerce, Some(cast))),
            activate: None,
        }
    }

    /// 登记手写自适应分发器；同一扩展点至多一个。
    pub fn adaptive<C, F>(
        type_path: &'static str,
        ctor: F,
        coerce: fn(Arc<C>) -> Arc<T>,
    ) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(&InjectionContext) -> Result<C, FlareError> + Send + Sync + 'static,
    {
        Self {
            type_path,
            role: ClassRole::Adaptive(instance_ctor(type_path, ctor, coerce, None)),
            activate: None,
        }
    }

    /// 登记包装器；构造入参为被装饰的接口实例。
    pub fn wrapper<C, F>(
        type_path: &'static str,
        spec: WrapperSpec,
        ctor: F,
        coerce: fn(Arc<C>) -> Arc<T>,
    ) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<T>, &InjectionContext) -> Result<C, FlareError> + Send + Sync + 'static,
    {
        let build: WrapperCtor<T> = Box::new(move |inner, ctx| {
            let concrete = Arc::new(ctor(inner, ctx)?);
            Ok(Constructed {
                instance: coerce(concrete),
                lifecycle: None,
            })
        });
        Self {
            type_path,
            role: ClassRole::Wrapper(spec, build),
            activate: None,
        }
    }

    /// 附加激活描述，仅对普通实现有意义。
    pub fn with_activate(mut self, spec: ActivateSpec) -> Self {
        self.activate = Some(spec);
        self
    }

    /// 实现类型路径。
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    /// 角色判别。
    pub fn kind(&self) -> ClassKind {
        match &self.role {
            ClassRole::Normal(_) => ClassKind::Normal,
            ClassRole::Adaptive(_) => ClassKind::Adaptive,
            ClassRole::Wrapper(..) => ClassKind::Wrapper,
        }
    }

    /// 激活描述。
    pub fn activate(&self) -> Option<&ActivateSpec> {
        self.activate.as_ref()
    }

    /// 包装器描述。
    pub(crate) fn wrapper_spec(&self) -> Option<&WrapperSpec> {
        match &self.role {
            ClassRole::Wrapper(spec, _) => Some(spec),
            _ => None,
        }
    }

    /// 构造普通或自适应实例。
    pub(crate) fn construct_instance(
        &self,
        ctx: &InjectionContext,
    ) -> Result<Constructed<T>, FlareError> {
        match &self.role {
            ClassRole::Normal(ctor) | ClassRole::Adaptive(ctor) => ctor(ctx),
            ClassRole::Wrapper(..) => Err(FlareError::new(
                crate::error::codes::EXTENSION_INSTANTIATION,
                format!("wrapper `{}` cannot be constructed standalone", self.type_path),
            )),
        }
    }

    /// 以被装饰实例构造包装器。
    pub(crate) fn construct_wrapper(
        &self,
        inner: Arc<T>,
        ctx: &InjectionContext,
    ) -> Result<Constructed<T>, FlareError> {
        match &self.role {
            ClassRole::Wrapper(_, ctor) => ctor(inner, ctx),
            _ => Err(FlareError::new(
                crate::error::codes::EXTENSION_INSTANTIATION,
                format!("`{}` is not a wrapper class", self.type_path),
            )),
        }
    }
}

/// 构造闭包的公共骨架：先查进程级单例，再构造并登记。
fn instance_ctor<T, C, F>(
    type_path: &'static str,
    ctor: F,
    coerce: fn(Arc<C>) -> Arc<T>,
    lifecycle_cast: Option<fn(Arc<C>) -> Arc<dyn Lifecycle>>,
) -> InstanceCtor<T>
where
    T: ExtensionPoint + ?Sized,
    C: Send + Sync + 'static,
    F: Fn(&InjectionContext) -> Result<C, FlareError> + Send + Sync + 'static,
{
    Box::new(move |ctx| {
        if let Some(hit) = singleton::lookup(type_path) {
            if let Ok(concrete) = hit.identity.clone().downcast::<C>() {
                return Ok(Constructed {
                    instance: coerce(concrete),
                    lifecycle: hit.lifecycle,
                });
            }
        }
        let concrete = Arc::new(ctor(ctx)?);
        let lifecycle = lifecycle_cast.map(|cast| cast(concrete.clone()));
        let identity: Arc<dyn Any + Send + Sync> = concrete.clone();
        let published = singleton::store(
            type_path,
            SingletonEntry {
                identity,
                lifecycle: lifecycle.clone(),
            },
        );
        // 并发构造时以先发布者为准，保证进程内同一实现只有一个单例。
        let winner = published
            .identity
            .downcast::<C>()
            .unwrap_or(concrete);
        Ok(Constructed {
            instance: coerce(winner),
            lifecycle: published.lifecycle,
        })
    })
}
