//! 描述符加载器：把目录中的文本行变成类表。
//!
//! # 模块定位（Why）
//! - 扩展点的实现清单以 UTF-8 文本文件发布，文件基名即扩展点限定名，一行一条实现；
//!   加载器负责按策略扫描目录、解析行并对照类型目录完成归类。
//! - 单行失败只记录到错误表并继续加载，保证一个坏行不拖垮整个扩展点。
//!
//! # 逻辑解析（How）
//! - 行格式：`name=类型路径` 或裸 `类型路径`；`#` 起注释到行尾；空行忽略；
//!   `name` 缺省时由实现类型的简单名派生（去掉扩展点简单名后缀并小写）。
//! - 每个策略依次尝试内嵌资源与各扩展根目录下的 `前缀 + 基名` 文件，另对基名做一次
//!   历史品牌前缀替换（`flare.` 换作 `blaze.`），以接纳旧社区描述符。
//!
//! # 风险提示（Trade-offs）
//! - 类表构建是一次性的，加载后修改策略或目录不会回溯生效；
//! - 重复定义在未开启覆盖的策略下会"毒化"该名字，后续查询将失败并附带归档原因。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::sync::Arc;

use crate::constants::{DEFAULT_KEY, TRUE_VALUE};
use crate::extension::catalog;
use crate::extension::class::{ActivateSpec, ClassKind, ExtensionClass};
use crate::extension::error::ExtensionError;
use crate::extension::point::{self, ExtensionPoint};
use crate::extension::strategy::{self, LoadingStrategy};
use crate::observability;

/// 历史品牌前缀，旧社区描述符文件以它开头。
const LEGACY_BRAND_PREFIX: &str = "blaze.";
/// 当前品牌前缀。
const BRAND_PREFIX: &str = "flare.";

/// 随 crate 内嵌发布的框架描述符。
const EMBEDDED: &[(&str, &str)] = &[
    (
        "META-INF/flare/internal/flare.cluster.LoadBalance",
        include_str!("../../resources/META-INF/flare/internal/flare.cluster.LoadBalance"),
    ),
    (
        "META-INF/flare/internal/flare.executor.ThreadPool",
        include_str!("../../resources/META-INF/flare/internal/flare.executor.ThreadPool"),
    ),
    (
        "META-INF/flare/internal/flare.extension.ExtensionInjector",
        include_str!("../../resources/META-INF/flare/internal/flare.extension.ExtensionInjector"),
    ),
];

/// 扩展点加载完成后的类表。
pub(crate) struct LoadedClasses<T: ?Sized> {
    /// 普通实现：名字到登记记录。
    pub classes: BTreeMap<String, Arc<ExtensionClass<T>>>,
    /// 类型路径到首个名字的逆向索引。
    pub names: HashMap<String, String>,
    /// 可激活实现：`(名字, 激活描述)`，保持登记顺序。
    pub activates: Vec<(String, ActivateSpec)>,
    /// 包装器集合，保持登记顺序。
    pub wrappers: Vec<Arc<ExtensionClass<T>>>,
    /// 手写自适应实现。
    pub adaptive: Option<Arc<ExtensionClass<T>>>,
    /// 自适应槽位冲突；存在时 `get_adaptive` 直接失败。
    pub adaptive_conflict: Option<ExtensionError>,
    /// 行级加载错误，键为原始行文本或受影响的名字。
    pub errors: BTreeMap<String, ExtensionError>,
    /// 因重复定义被毒化的名字。
    pub unacceptable: HashSet<String>,
    /// 接口声明的缺省扩展名。
    pub default_name: Option<String>,
}

impl<T: ?Sized> LoadedClasses<T> {
    fn new(default_name: Option<String>) -> Self {
        Self {
            classes: BTreeMap::new(),
            names: HashMap::new(),
            activates: Vec::new(),
            wrappers: Vec::new(),
            adaptive: None,
            adaptive_conflict: None,
            errors: BTreeMap::new(),
            unacceptable: HashSet::new(),
            default_name,
        }
    }
}

/// 一次性加载扩展点的类表。
pub(crate) fn load_point<T: ExtensionPoint + ?Sized>() -> LoadedClasses<T> {
    let mut loaded = LoadedClasses::new(validated_default::<T>());
    for strategy in strategy::loading_strategies() {
        for file_name in point_file_names::<T>() {
            load_directory(&mut loaded, &strategy, &file_name);
        }
    }
    loaded
}

/// 校验接口声明的缺省名；保留字不生效。
fn validated_default<T: ExtensionPoint + ?Sized>() -> Option<String> {
    let declared = T::DEFAULT_NAME?.trim();
    if declared.is_empty() {
        return None;
    }
    if declared == TRUE_VALUE || declared == DEFAULT_KEY {
        observability::warn(
            "flare.extension",
            &format!(
                "default name `{declared}` of point `{}` is reserved, ignored",
                T::NAME
            ),
        );
        return None;
    }
    Some(declared.to_string())
}

/// 扩展点对应的描述符基名，含历史品牌替换。
fn point_file_names<T: ExtensionPoint + ?Sized>() -> Vec<String> {
    let mut names = vec![T::NAME.to_string()];
    if let Some(rest) = T::NAME.strip_prefix(BRAND_PREFIX) {
        names.push(format!("{LEGACY_BRAND_PREFIX}{rest}"));
    }
    names
}

fn load_directory<T: ExtensionPoint + ?Sized>(
    loaded: &mut LoadedClasses<T>,
    strategy: &LoadingStrategy,
    file_name: &str,
) {
    let relative = format!("{}{file_name}", strategy.directory);

    let embedded = EMBEDDED
        .iter()
        .find(|(path, _)| *path == relative)
        .map(|(path, text)| ((*path).to_string(), (*text).to_string()));

    let mut from_fs = Vec::new();
    for root in strategy::extension_directories() {
        let path = root.join(&relative);
        if !path.is_file() {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(text) => from_fs.push((path.display().to_string(), text)),
            Err(err) => observability::error(
                "flare.extension",
                &format!(
                    "failed to read descriptor `{}` for point `{}`",
                    path.display(),
                    T::NAME
                ),
                Some(&err),
            ),
        }
    }

    let mut sources = Vec::new();
    if strategy.prefer_embedded {
        sources.extend(embedded);
        sources.extend(from_fs);
    } else {
        sources.extend(from_fs);
        sources.extend(embedded);
    }

    for (origin, text) in sources {
        load_resource(loaded, strategy, &origin, &text);
    }
}

fn load_resource<T: ExtensionPoint + ?Sized>(
    loaded: &mut LoadedClasses<T>,
    strategy: &LoadingStrategy,
    origin: &str,
    text: &str,
) {
    for raw_line in text.lines() {
        let line = match raw_line.find('#') {
            Some(index) => &raw_line[..index],
            None => raw_line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        if let Err(error) = load_line(loaded, strategy, line) {
            observability::warn(
                "flare.extension",
                &format!("skip extension line `{line}` from `{origin}`: {error}"),
            );
            loaded.errors.insert(line.to_string(), error);
        }
    }
}

fn load_line<T: ExtensionPoint + ?Sized>(
    loaded: &mut LoadedClasses<T>,
    strategy: &LoadingStrategy,
    line: &str,
) -> Result<(), ExtensionError> {
    let (declared_names, type_path) = match line.split_once('=') {
        Some((name, path)) => (Some(name.trim()), path.trim()),
        None => (None, line),
    };
    if type_path.is_empty() {
        return Err(ExtensionError::DescriptorLine {
            point: T::NAME,
            line: line.to_string(),
            detail: "missing type path".to_string(),
        });
    }
    if is_excluded(type_path, strategy.excluded_prefixes) {
        return Ok(());
    }

    let class = catalog::resolve::<T>(type_path).ok_or_else(|| ExtensionError::DescriptorLine {
        point: T::NAME,
        line: line.to_string(),
        detail: format!("type `{type_path}` is not registered in the type catalog"),
    })?;

    match class.kind() {
        ClassKind::Adaptive => cache_adaptive(loaded, strategy, line, class),
        ClassKind::Wrapper => {
            cache_wrapper(loaded, class);
            Ok(())
        }
        ClassKind::Normal => {
            let names = match declared_names.filter(|name| !name.is_empty()) {
                Some(declared) => declared
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
                None => vec![derive_name::<T>(type_path).ok_or_else(|| {
                    ExtensionError::DescriptorLine {
                        point: T::NAME,
                        line: line.to_string(),
                        detail: format!("no extension name derivable from `{type_path}`"),
                    }
                })?],
            };
            if let Some(reserved) = names
                .iter()
                .find(|name| name.as_str() == TRUE_VALUE || name.as_str() == DEFAULT_KEY)
            {
                return Err(ExtensionError::ReservedName {
                    point: T::NAME,
                    name: reserved.clone(),
                });
            }
            if let (Some(first), Some(spec)) = (names.first(), class.activate()) {
                if !loaded.activates.iter().any(|(name, _)| name == first) {
                    loaded.activates.push((first.clone(), *spec));
                }
            }
            for name in names {
                loaded
                    .names
                    .entry(type_path.to_string())
                    .or_insert_with(|| name.clone());
                save_in_classes(loaded, strategy, &name, class.clone())?;
            }
            Ok(())
        }
    }
}

fn cache_adaptive<T: ExtensionPoint + ?Sized>(
    loaded: &mut LoadedClasses<T>,
    strategy: &LoadingStrategy,
    line: &str,
    class: Arc<ExtensionClass<T>>,
) -> Result<(), ExtensionError> {
    match &loaded.adaptive {
        None => {
            loaded.adaptive = Some(class);
            Ok(())
        }
        Some(existing) if existing.type_path() == class.type_path() => Ok(()),
        Some(_) if strategy.overridden => {
            loaded.adaptive = Some(class);
            Ok(())
        }
        Some(existing) => {
            let conflict = ExtensionError::MultipleAdaptive {
                point: T::NAME,
                existing: existing.type_path().to_string(),
                duplicate: class.type_path().to_string(),
            };
            loaded.adaptive_conflict = Some(conflict.clone());
            loaded.errors.insert(line.to_string(), conflict.clone());
            Err(conflict)
        }
    }
}

fn cache_wrapper<T: ExtensionPoint + ?Sized>(
    loaded: &mut LoadedClasses<T>,
    class: Arc<ExtensionClass<T>>,
) {
    if !loaded
        .wrappers
        .iter()
        .any(|existing| existing.type_path() == class.type_path())
    {
        loaded.wrappers.push(class);
    }
}

fn save_in_classes<T: ExtensionPoint + ?Sized>(
    loaded: &mut LoadedClasses<T>,
    strategy: &LoadingStrategy,
    name: &str,
    class: Arc<ExtensionClass<T>>,
) -> Result<(), ExtensionError> {
    match loaded.classes.get(name) {
        None => {
            loaded.classes.insert(name.to_string(), class);
            Ok(())
        }
        Some(existing) if existing.type_path() == class.type_path() => Ok(()),
        Some(_) if strategy.overridden => {
            loaded.classes.insert(name.to_string(), class);
            Ok(())
        }
        Some(existing) => {
            // 重复定义不可接受：毒化名字，保留双方类型便于排障。
            loaded.unacceptable.insert(name.to_string());
            let error = ExtensionError::DuplicateExtension {
                point: T::NAME,
                name: name.to_string(),
                existing: existing.type_path().to_string(),
                duplicate: class.type_path().to_string(),
            };
            loaded.errors.insert(name.to_string(), error.clone());
            Err(error)
        }
    }
}

fn is_excluded(type_path: &str, excluded: &[&str]) -> bool {
    excluded
        .iter()
        .any(|prefix| type_path == *prefix || type_path.starts_with(&format!("{prefix}::")))
}

/// 由实现类型简单名派生扩展名：去掉扩展点简单名后缀并小写。
fn derive_name<T: ExtensionPoint + ?Sized>(type_path: &str) -> Option<String> {
    let simple = type_path.rsplit("::").next().unwrap_or(type_path);
    let point_simple = point::simple_name(T::NAME);
    let stem = simple.strip_suffix(point_simple).unwrap_or(simple);
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Naming: Send + Sync {}
    impl ExtensionPoint for dyn Naming {
        const NAME: &'static str = "flare.test.LoadBalance";
    }

    #[test]
    fn derive_name_strips_point_suffix() {
        assert_eq!(
            derive_name::<dyn Naming>("demo::LeastActiveLoadBalance"),
            Some("leastactive".to_string())
        );
        assert_eq!(
            derive_name::<dyn Naming>("demo::Custom"),
            Some("custom".to_string())
        );
        assert_eq!(derive_name::<dyn Naming>("demo::LoadBalance"), None);
    }

    #[test]
    fn legacy_brand_file_name_is_probed() {
        let names = point_file_names::<dyn Naming>();
        assert_eq!(
            names,
            vec![
                "flare.test.LoadBalance".to_string(),
                "blaze.test.LoadBalance".to_string()
            ]
        );
    }

    #[test]
    fn excluded_prefix_matches_path_segments() {
        assert!(is_excluded("legacy::Impl", &["legacy"]));
        assert!(!is_excluded("legacy_more::Impl", &["legacy"]));
    }
}
