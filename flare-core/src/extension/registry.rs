//! 扩展注册中心：按接口组织的进程级插件容器。
//!
//! # 模块定位（Why）
//! - 每个扩展点对应唯一一个注册中心，负责类表的一次性加载、按名惰性实例化、
//!   包装链装配、激活筛选与自适应分发句柄的缓存。
//! - 这是全框架装配行为的汇聚点：协议、选路算法、线程池与过滤器都经由这里取得。
//!
//! # 并发模型（How）
//! - 类表以 `OnceLock<RwLock<..>>` 承载：首次访问执行目录扫描与解析，之后为无争用读；
//!   编程式登记走写锁。
//! - 实例表为并发映射，值是带槽级创建锁的单槽缓存，双检保证同名扩展只构造一次。
//! - 构造路径以线程局部解析栈侦测对同一 `(扩展点, 名字)` 的重入，直接报循环错误。
//!
//! # 风险提示（Trade-offs）
//! - 注册中心是进程级单例，多租户隔离不在目标内；测试间共享状态时应使用互不相同的
//!   扩展点类型或名字。

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::constants::{DEFAULT_KEY, REMOVE_VALUE_PREFIX, TRUE_VALUE};
use crate::error::{codes, FlareError};
use crate::extension::adaptive::Adaptive;
use crate::extension::class::{ActivateSpec, ClassKind, ExtensionClass};
use crate::extension::error::ExtensionError;
use crate::extension::holder::Holder;
use crate::extension::inject::{self, InjectionContext};
use crate::extension::loader::{self, LoadedClasses};
use crate::extension::point::{self, ExtensionPoint};
use crate::extension::singleton;
use crate::observability;
use crate::url::Url;

static REGISTRIES: OnceLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = OnceLock::new();

/// 取得扩展点对应的进程级注册中心；同一扩展点总是返回同一个实例。
pub fn extension_registry<T: ExtensionPoint + ?Sized>() -> Arc<ExtensionRegistry<T>> {
    let registries = REGISTRIES.get_or_init(DashMap::new);
    let erased = registries
        .entry(TypeId::of::<T>())
        .or_insert_with(|| {
            inject::register_erased::<T>();
            Arc::new(ExtensionRegistry::<T>::new()) as Arc<dyn Any + Send + Sync>
        })
        .value()
        .clone();
    erased
        .downcast::<ExtensionRegistry<T>>()
        .unwrap_or_else(|_| unreachable!("registry table is keyed by the point TypeId"))
}

/// 销毁全部扩展单例并清空注册中心表。
///
/// 每个实例的 `Lifecycle::destroy` 错误只记录日志，不阻断其余实例的销毁。
pub fn destroy_all() {
    for (type_path, entry) in singleton::drain() {
        if let Some(lifecycle) = entry.lifecycle {
            if let Err(error) = lifecycle.destroy() {
                observability::error(
                    "flare.extension",
                    &format!("error destroying extension `{type_path}`"),
                    Some(&error),
                );
            }
        }
    }
    if let Some(registries) = REGISTRIES.get() {
        registries.clear();
    }
}

thread_local! {
    static RESOLVING: RefCell<Vec<(TypeId, String)>> = const { RefCell::new(Vec::new()) };
}

struct ResolutionGuard;

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn enter_resolution<T: ExtensionPoint + ?Sized>(
    name: &str,
) -> Result<ResolutionGuard, ExtensionError> {
    let key = (TypeId::of::<T>(), name.to_string());
    RESOLVING.with(|stack| {
        if stack.borrow().contains(&key) {
            return Err(ExtensionError::CyclicExtension {
                point: T::NAME,
                name: name.to_string(),
            });
        }
        stack.borrow_mut().push(key);
        Ok(ResolutionGuard)
    })
}

/// `ExtensionRegistry` 管理单个扩展点的类与实例。
pub struct ExtensionRegistry<T: ExtensionPoint + ?Sized> {
    classes: OnceLock<RwLock<LoadedClasses<T>>>,
    instances: DashMap<String, Arc<Holder<T>>>,
    adaptive: Mutex<Option<Result<Adaptive<T>, ExtensionError>>>,
}

impl<T: ExtensionPoint + ?Sized> ExtensionRegistry<T> {
    fn new() -> Self {
        Self {
            classes: OnceLock::new(),
            instances: DashMap::new(),
            adaptive: Mutex::new(None),
        }
    }

    fn classes(&self) -> &RwLock<LoadedClasses<T>> {
        self.classes
            .get_or_init(|| RwLock::new(loader::load_point::<T>()))
    }

    fn holder(&self, name: &str) -> Arc<Holder<T>> {
        self.instances
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Holder::new()))
            .value()
            .clone()
    }

    /// 按名取得扩展实例；`"true"` 为缺省扩展的保留别名。
    ///
    /// # 契约说明（What）
    /// - **后置条件**：同名的两次调用返回同一个实例（`Arc` 指针相等）；
    /// - 名字未注册或已被重复定义毒化时报 `extension.missing`，并附带加载期记录的、
    ///   键名与该名字前缀匹配（忽略大小写）的错误摘要。
    pub fn get(&self, name: &str) -> Result<Arc<T>, FlareError> {
        if name.is_empty() {
            return Err(FlareError::new(
                codes::EXTENSION_MISSING,
                format!("extension name is empty (point `{}`)", T::NAME),
            ));
        }
        if name == TRUE_VALUE {
            return self.get_default();
        }
        let holder = self.holder(name);
        if let Some(instance) = holder.get() {
            return Ok(instance);
        }
        // 重入侦测必须先于槽级锁：同线程对同一名字的再次解析要报循环错误而不是自锁。
        let _resolving = enter_resolution::<T>(name).map_err(FlareError::from)?;
        let _creating = holder.lock();
        if let Some(instance) = holder.get() {
            return Ok(instance);
        }
        let instance = self.create(name)?;
        holder.set(instance.clone());
        Ok(instance)
    }

    /// 取得接口声明的缺省扩展。
    pub fn get_default(&self) -> Result<Arc<T>, FlareError> {
        let default_name = self.classes().read().default_name.clone();
        match default_name {
            Some(name) => self.get(&name),
            None => Err(ExtensionError::NoDefault { point: T::NAME }.into()),
        }
    }

    /// 名字已注册时等价于 `get(name)`，否则回退缺省扩展。
    pub fn get_or_default(&self, name: &str) -> Result<Arc<T>, FlareError> {
        if self.has_extension(name) {
            self.get(name)
        } else {
            self.get_default()
        }
    }

    /// 判断名字是否已注册。
    pub fn has_extension(&self, name: &str) -> bool {
        !name.is_empty() && self.classes().read().classes.contains_key(name)
    }

    /// 全部已注册名字，字典序。
    pub fn supported_extensions(&self) -> Vec<String> {
        self.classes().read().classes.keys().cloned().collect()
    }

    /// 已实例化的名字，字典序；不触发加载。
    pub fn loaded_extensions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .instances
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// 只读取已实例化的扩展，不触发构造。
    pub fn loaded_extension(&self, name: &str) -> Option<Arc<T>> {
        self.instances.get(name).and_then(|holder| holder.get())
    }

    /// 接口声明的缺省扩展名。
    pub fn default_extension_name(&self) -> Option<String> {
        self.classes().read().default_name.clone()
    }

    /// 实现类型路径对应的首个扩展名。
    pub fn extension_name_of(&self, type_path: &str) -> Option<String> {
        self.classes().read().names.get(type_path).cloned()
    }

    /// 编程式登记扩展；同名登记报错。
    pub fn add_extension(&self, name: &str, class: ExtensionClass<T>) -> Result<(), FlareError> {
        let mut table = self.classes().write();
        match class.kind() {
            ClassKind::Adaptive => {
                if let Some(existing) = &table.adaptive {
                    return Err(ExtensionError::MultipleAdaptive {
                        point: T::NAME,
                        existing: existing.type_path().to_string(),
                        duplicate: class.type_path().to_string(),
                    }
                    .into());
                }
                table.adaptive = Some(Arc::new(class));
                *self.adaptive.lock() = None;
                Ok(())
            }
            ClassKind::Wrapper => {
                if !table
                    .wrappers
                    .iter()
                    .any(|existing| existing.type_path() == class.type_path())
                {
                    table.wrappers.push(Arc::new(class));
                }
                Ok(())
            }
            ClassKind::Normal => {
                self.check_name(name)?;
                if let Some(existing) = table.classes.get(name) {
                    return Err(ExtensionError::DuplicateExtension {
                        point: T::NAME,
                        name: name.to_string(),
                        existing: existing.type_path().to_string(),
                        duplicate: class.type_path().to_string(),
                    }
                    .into());
                }
                self.install_normal(&mut table, name, class);
                Ok(())
            }
        }
    }

    /// 编程式替换既有扩展；目标不存在时报错，既有实例缓存会被废弃。
    pub fn replace_extension(
        &self,
        name: &str,
        class: ExtensionClass<T>,
    ) -> Result<(), FlareError> {
        let mut table = self.classes().write();
        match class.kind() {
            ClassKind::Adaptive => {
                if table.adaptive.is_none() {
                    return Err(FlareError::new(
                        codes::EXTENSION_MISSING,
                        format!("no adaptive extension to replace (point `{}`)", T::NAME),
                    ));
                }
                table.adaptive = Some(Arc::new(class));
                *self.adaptive.lock() = None;
                Ok(())
            }
            ClassKind::Wrapper => Err(FlareError::new(
                codes::EXTENSION_DESCRIPTOR,
                format!("wrapper classes cannot be replaced by name (point `{}`)", T::NAME),
            )),
            ClassKind::Normal => {
                self.check_name(name)?;
                let Some(existing) = table.classes.get(name).cloned() else {
                    return Err(FlareError::new(
                        codes::EXTENSION_MISSING,
                        format!("extension `{name}` doesn't exist (point `{}`)", T::NAME),
                    ));
                };
                singleton::remove(existing.type_path());
                self.install_normal(&mut table, name, class);
                if let Some(holder) = self.instances.get(name) {
                    holder.clear();
                }
                Ok(())
            }
        }
    }

    fn check_name(&self, name: &str) -> Result<(), FlareError> {
        if name.is_empty() {
            return Err(FlareError::new(
                codes::EXTENSION_DESCRIPTOR,
                format!("extension name is blank (point `{}`)", T::NAME),
            ));
        }
        if name == TRUE_VALUE || name == DEFAULT_KEY {
            return Err(ExtensionError::ReservedName {
                point: T::NAME,
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn install_normal(
        &self,
        table: &mut LoadedClasses<T>,
        name: &str,
        class: ExtensionClass<T>,
    ) {
        if let Some(spec) = class.activate() {
            if !table.activates.iter().any(|(existing, _)| existing == name) {
                table.activates.push((name.to_string(), *spec));
            }
        }
        table
            .names
            .entry(class.type_path().to_string())
            .or_insert_with(|| name.to_string());
        table.classes.insert(name.to_string(), Arc::new(class));
        table.unacceptable.remove(name);
    }

    /// 取得自适应分发句柄；创建结果（含失败）会被记忆。
    pub fn get_adaptive(&self) -> Result<Adaptive<T>, FlareError> {
        let mut slot = self.adaptive.lock();
        if let Some(memoized) = slot.as_ref() {
            return memoized.clone().map_err(Into::into);
        }
        let result = self.build_adaptive();
        *slot = Some(result.clone());
        result.map_err(Into::into)
    }

    fn build_adaptive(&self) -> Result<Adaptive<T>, ExtensionError> {
        let declared = {
            let table = self.classes().read();
            if let Some(conflict) = &table.adaptive_conflict {
                return Err(conflict.clone());
            }
            table.adaptive.clone()
        };
        match declared {
            Some(class) => {
                let ctx = InjectionContext::new::<T>("adaptive");
                let constructed =
                    class
                        .construct_instance(&ctx)
                        .map_err(|error| ExtensionError::AdaptiveUnavailable {
                            point: T::NAME,
                            detail: error.to_string(),
                        })?;
                if let Some(lifecycle) = &constructed.lifecycle {
                    lifecycle
                        .initialize()
                        .map_err(|error| ExtensionError::AdaptiveUnavailable {
                            point: T::NAME,
                            detail: error.to_string(),
                        })?;
                }
                Ok(Adaptive::declared(constructed.instance))
            }
            None => {
                let default_name = self.classes().read().default_name.clone();
                Ok(Adaptive::synthesized(
                    point::adaptive_keys_of::<T>(),
                    default_name,
                ))
            }
        }
    }

    /// 激活协议的便捷入口：请求名列表取自 URL 参数 `key`，按逗号拆分。
    pub fn get_activate(
        &self,
        url: &Url,
        key: &str,
        group: Option<&str>,
    ) -> Result<Vec<Arc<T>>, FlareError> {
        let requested: Vec<String> = url
            .get_parameter(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let refs: Vec<&str> = requested.iter().map(String::as_str).collect();
        self.get_activate_extension(url, &refs, group)
    }

    /// 激活协议：候选可激活扩展按条件筛选排序，请求名按序拼接。
    ///
    /// # 契约说明（What）
    /// - 请求名含 `-default` 时跳过全部自动激活候选；`-name` 剔除指定名字；
    /// - `default` 占位符把此前累计的请求扩展拼接到自动激活段之前；
    /// - 输出不含任何移除记号，也不含 `default` 字面量；顺序对输入是确定的。
    pub fn get_activate_extension(
        &self,
        url: &Url,
        names: &[&str],
        group: Option<&str>,
    ) -> Result<Vec<Arc<T>>, FlareError> {
        let requested: HashSet<&str> = names.iter().copied().collect();
        let remove_default = format!("{REMOVE_VALUE_PREFIX}{DEFAULT_KEY}");
        let mut activated: Vec<Arc<T>> = Vec::new();
        let mut loaded_names: HashSet<String> = HashSet::new();

        if !requested.contains(remove_default.as_str()) {
            let candidates: Vec<(String, ActivateSpec)> = self.classes().read().activates.clone();
            let mut eligible: Vec<(i32, String)> = Vec::new();
            for (name, spec) in candidates {
                if !group_matches(group, spec.groups)
                    || requested.contains(name.as_str())
                    || requested.contains(format!("{REMOVE_VALUE_PREFIX}{name}").as_str())
                    || loaded_names.contains(&name)
                    || !is_active(spec.values, url)
                {
                    continue;
                }
                eligible.push((spec.order, name));
            }
            eligible.sort();
            for (_, name) in eligible {
                activated.push(self.get(&name)?);
                loaded_names.insert(name);
            }
        }

        let mut appended: Vec<Arc<T>> = Vec::new();
        for name in names {
            if name.starts_with(REMOVE_VALUE_PREFIX)
                || requested.contains(format!("{REMOVE_VALUE_PREFIX}{name}").as_str())
            {
                continue;
            }
            if loaded_names.contains(*name) {
                observability::warn(
                    "flare.extension",
                    &format!(
                        "duplicated activate extension `{name}` for point `{}`, ignored",
                        T::NAME
                    ),
                );
                continue;
            }
            if *name == DEFAULT_KEY {
                if !appended.is_empty() {
                    let mut spliced = std::mem::take(&mut appended);
                    spliced.extend(activated.drain(..));
                    activated = spliced;
                }
            } else {
                appended.push(self.get(name)?);
            }
            loaded_names.insert((*name).to_string());
        }
        activated.extend(appended);
        Ok(activated)
    }

    /// 丢弃本注册中心的实例缓存；类表保持不变。
    pub fn destroy(&self) {
        self.instances.clear();
    }

    fn create(&self, name: &str) -> Result<Arc<T>, FlareError> {
        let (class, mut wrappers) = {
            let table = self.classes().read();
            let class = match table.classes.get(name) {
                Some(class) if !table.unacceptable.contains(name) => class.clone(),
                _ => return Err(self.missing(&table, name).into()),
            };
            (class, table.wrappers.clone())
        };

        let ctx = InjectionContext::new::<T>(name);
        let mut constructed = class
            .construct_instance(&ctx)
            .map_err(|error| self.instantiation_error(name, error))?;

        // 包装链：升序排序后反转，最小 order（最高优先级）最后装配，落在最外层。
        wrappers.sort_by_key(|wrapper| wrapper.wrapper_spec().map(|spec| spec.order).unwrap_or(0));
        wrappers.reverse();
        for wrapper in wrappers {
            let admitted = wrapper
                .wrapper_spec()
                .map(|spec| spec.admits(name))
                .unwrap_or(true);
            if admitted {
                constructed = wrapper
                    .construct_wrapper(constructed.instance, &ctx)
                    .map_err(|error| self.instantiation_error(name, error))?;
            }
        }

        if let Some(lifecycle) = &constructed.lifecycle {
            lifecycle
                .initialize()
                .map_err(|error| self.instantiation_error(name, error))?;
        }
        Ok(constructed.instance)
    }

    fn missing(&self, table: &LoadedClasses<T>, name: &str) -> ExtensionError {
        let lowered = name.to_lowercase();
        let causes = table
            .errors
            .iter()
            .filter(|(key, _)| key.to_lowercase().starts_with(&lowered))
            .map(|(key, error)| format!("{key}: {error}"))
            .collect();
        ExtensionError::NoSuchExtension {
            point: T::NAME,
            name: name.to_string(),
            causes,
        }
    }

    fn instantiation_error(&self, name: &str, error: FlareError) -> FlareError {
        let wrapped = ExtensionError::InstantiationFailed {
            point: T::NAME,
            name: name.to_string(),
            detail: error.to_string(),
        };
        FlareError::new(codes::EXTENSION_INSTANTIATION, wrapped.to_string()).with_cause(error)
    }
}

fn group_matches(group: Option<&str>, groups: &[&str]) -> bool {
    match group {
        None | Some("") => true,
        Some(group) => groups.iter().any(|candidate| *candidate == group),
    }
}

/// URL 触发键匹配：键等于 `k` 或以 `.k` 结尾，值满足可选的 `k:v` 约束，否则要求非空。
fn is_active(values: &[&str], url: &Url) -> bool {
    if values.is_empty() {
        return true;
    }
    for entry in values {
        let (key, constraint) = match entry.split_once(':') {
            Some((key, constraint)) => (key, Some(constraint)),
            None => (*entry, None),
        };
        for (parameter, value) in url.parameters() {
            let key_matches =
                parameter.as_str() == key || parameter.ends_with(&format!(".{key}"));
            if !key_matches {
                continue;
            }
            let value_matches = match constraint {
                Some(expected) => value.as_str() == expected,
                None => !value.is_empty(),
            };
            if value_matches {
                return true;
            }
        }
    }
    false
}
