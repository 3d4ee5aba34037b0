use std::path::PathBuf;
use std::sync::OnceLock;

use parking_lot::RwLock;

/// `LoadingStrategy` 描述一类描述符目录的加载配方。
///
/// # 设计背景（Why）
/// - 描述符文件分布在多个目录前缀下（框架内置、标准扩展、通用 services 目录），
///   各目录的覆盖权限与来源偏好不同，需要以策略显式表达。
///
/// # 契约说明（What）
/// - `directory`：目录前缀，必须以 `/` 结尾；
/// - `prefer_embedded`：优先读取随 crate 内嵌的描述符，再读取文件系统目录；
/// - `overridden`：允许本策略中的定义覆盖先前策略同名定义；
/// - `excluded_prefixes`：跳过以列出前缀开头的类型路径；
/// - `priority`：数值越小越先加载；排序保持稳定。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadingStrategy {
    pub name: &'static str,
    pub directory: &'static str,
    pub prefer_embedded: bool,
    pub overridden: bool,
    pub excluded_prefixes: &'static [&'static str],
    pub priority: i32,
}

/// 框架缺省的三条加载策略。
pub fn default_strategies() -> Vec<LoadingStrategy> {
    vec![
        LoadingStrategy {
            name: "internal",
            directory: "META-INF/flare/internal/",
            prefer_embedded: true,
            overridden: false,
            excluded_prefixes: &[],
            priority: -100,
        },
        LoadingStrategy {
            name: "flare",
            directory: "META-INF/flare/",
            prefer_embedded: false,
            overridden: true,
            excluded_prefixes: &[],
            priority: 0,
        },
        LoadingStrategy {
            name: "services",
            directory: "META-INF/services/",
            prefer_embedded: false,
            overridden: false,
            excluded_prefixes: &[],
            priority: 100,
        },
    ]
}

static STRATEGIES: OnceLock<RwLock<Vec<LoadingStrategy>>> = OnceLock::new();
static DIRECTORIES: OnceLock<RwLock<Vec<PathBuf>>> = OnceLock::new();

fn strategies_cell() -> &'static RwLock<Vec<LoadingStrategy>> {
    STRATEGIES.get_or_init(|| RwLock::new(default_strategies()))
}

fn directories_cell() -> &'static RwLock<Vec<PathBuf>> {
    DIRECTORIES.get_or_init(|| RwLock::new(Vec::new()))
}

/// 读取当前策略表，按优先级稳定排序。
pub fn loading_strategies() -> Vec<LoadingStrategy> {
    let mut strategies = strategies_cell().read().clone();
    strategies.sort_by_key(|strategy| strategy.priority);
    strategies
}

/// 进程级覆盖策略表；空表不生效，保持原表。
pub fn set_loading_strategies(strategies: Vec<LoadingStrategy>) {
    if strategies.is_empty() {
        return;
    }
    *strategies_cell().write() = strategies;
}

/// 进程级设置扩展描述符根目录；加载器在每个根目录下按策略前缀寻找文件。
///
/// 已经完成首次加载的扩展点不会回溯重载，与一次性类表缓存的语义一致。
pub fn set_extension_directories(directories: Vec<PathBuf>) {
    *directories_cell().write() = directories;
}

/// 追加一个扩展描述符根目录。
pub fn add_extension_directory(directory: PathBuf) {
    directories_cell().write().push(directory);
}

pub(crate) fn extension_directories() -> Vec<PathBuf> {
    directories_cell().read().clone()
}
