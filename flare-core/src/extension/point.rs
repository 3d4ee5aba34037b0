/// `ExtensionPoint` 将一个 `dyn Trait` 擦除类型标记为可扩展接口。
///
/// # 设计背景（Why）
/// - 注册中心按接口类型组织，每个扩展点需要一个稳定的限定名作为描述符文件的基名；
/// - 缺省扩展名与自适应键属于接口级元数据，集中声明可以让分发逻辑与实现解耦。
///
/// # 逻辑解析（How）
/// - 为 `dyn LoadBalance` 这类对象类型实现本 Trait，而非为具体实现类型实现；
/// - `ADAPTIVE_KEYS` 为空时，自适应键在运行时由限定名的简单名按驼峰边界拆分、
///   小写并以 `.` 连接派生（`LoadBalance` 派生出 `load.balance`）。
///
/// # 契约说明（What）
/// - **前置条件**：扩展点 Trait 必须以 `Send + Sync` 为超 Trait，保证实例可跨线程共享；
/// - `NAME` 必须进程内唯一，推荐 `flare.<领域>.<接口简单名>` 形式；
/// - `DEFAULT_NAME` 不得使用保留字 `true` 与 `default`。
///
/// # 风险提示（Trade-offs）
/// - 元数据以关联常量表达，运行期不可变；需要动态缺省值的场景应在 URL 层覆盖。
pub trait ExtensionPoint: Send + Sync + 'static {
    /// 扩展点限定名，同时充当描述符文件的基名。
    const NAME: &'static str;
    /// 缺省扩展名；`None` 表示接口未声明缺省实现。
    const DEFAULT_NAME: Option<&'static str> = None;
    /// 自适应分发读取 URL 参数时使用的键序列；为空时按简单名派生。
    const ADAPTIVE_KEYS: &'static [&'static str] = &[];
}

/// 取限定名最后一个 `.` 段作为简单名。
pub(crate) fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

/// 按驼峰边界拆分简单名并以 `.` 连接，派生缺省的自适应键。
pub(crate) fn derive_adaptive_key(qualified: &str) -> String {
    let simple = simple_name(qualified);
    let mut key = String::with_capacity(simple.len() + 4);
    for (index, ch) in simple.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index != 0 {
                key.push('.');
            }
            key.push(ch.to_ascii_lowercase());
        } else {
            key.push(ch);
        }
    }
    key
}

/// 解析扩展点实际生效的自适应键序列。
pub(crate) fn adaptive_keys_of<T: ExtensionPoint + ?Sized>() -> Vec<String> {
    if T::ADAPTIVE_KEYS.is_empty() {
        vec![derive_adaptive_key(T::NAME)]
    } else {
        T::ADAPTIVE_KEYS.iter().map(|key| (*key).to_string()).collect()
    }
}
