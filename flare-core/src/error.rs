use core::fmt;

/// `FlareError` 表示 `flare-core` 统一的错误域。
///
/// # 设计背景（Why）
/// - 框架需要跨层传递稳定的错误码，以便日志、指标与告警系统能够进行机器可读的根因识别。
/// - 扩展加载、集群选路与线程池拒绝分属不同子系统，统一错误域可以让调用方以一致的方式
///   判定与观测失败路径。
///
/// # 逻辑解析（How）
/// - 结构体以 Builder 风格的方法累积上下文，例如 `with_cause`。
/// - `code` 字段承载稳定错误码，`message` 面向人类调试；`cause` 保留底层错误链。
///
/// # 契约说明（What）
/// - **前置条件**：调用方应保证错误码在 [`codes`] 模块中声明，或遵守约定的 `domain.reason` 形式。
/// - **后置条件**：所有构造方法都会产生 `FlareError` 拥有的所有权，确保可以跨线程移动与重试。
///
/// # 设计取舍与风险（Trade-offs）
/// - 采用 `String` 储存消息，牺牲少量拷贝成本换取在日志与跨组件通信上的灵活性。
/// - `cause` 为可选字段，轻量场景（如单纯的参数校验失败）无需携带底层错误。
#[derive(Debug)]
pub struct FlareError {
    code: &'static str,
    message: String,
    cause: Option<ErrorCause>,
}

/// `ErrorCause` 封装底层原因，保持 `Send + Sync` 以方便跨线程传递。
pub type ErrorCause = Box<dyn std::error::Error + Send + Sync + 'static>;

impl FlareError {
    /// 使用稳定错误码与消息创建 `FlareError`。
    ///
    /// # 契约说明
    /// - **参数**：`code` 必须是全局唯一且稳定的字符串；`message` 为任意人类可读文本。
    /// - **前置条件**：`code` 应遵循 `domain.reason` 命名；`message` 建议避免敏感信息。
    /// - **后置条件**：返回的实例尚未附带任何底层原因。
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取人类可读的错误描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 附带一个底层原因，形成错误链。
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 获取可选的底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for FlareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for FlareError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// 框架内置的错误码常量集合，确保可观测性系统具有稳定识别符。
pub mod codes {
    /// URL 描述符解析失败。
    pub const URL_PARSE: &str = "url.parse";
    /// 指定名字的扩展不存在或已被判定为不可接受。
    pub const EXTENSION_MISSING: &str = "extension.missing";
    /// 同名扩展指向了两个不同的实现。
    pub const EXTENSION_DUPLICATE: &str = "extension.duplicate";
    /// 扩展名为保留字（`true` / `default`）。
    pub const EXTENSION_NAME_RESERVED: &str = "extension.name_reserved";
    /// 同一扩展点声明了多个自适应实现。
    pub const EXTENSION_ADAPTIVE_CONFLICT: &str = "extension.adaptive_conflict";
    /// 自适应实例创建失败（结果会被记忆并在后续调用中重放）。
    pub const EXTENSION_ADAPTIVE_UNAVAILABLE: &str = "extension.adaptive_unavailable";
    /// 自适应分发在 URL 与缺省名中都未能解析出扩展名。
    pub const EXTENSION_ADAPTIVE_UNRESOLVED: &str = "extension.adaptive_unresolved";
    /// 扩展实例化失败。
    pub const EXTENSION_INSTANTIATION: &str = "extension.instantiation";
    /// 构造期间检测到对同一扩展的重入解析。
    pub const EXTENSION_CYCLE: &str = "extension.cycle";
    /// 扩展点未声明缺省扩展名。
    pub const EXTENSION_NO_DEFAULT: &str = "extension.no_default";
    /// 描述符行解析或类型登记解析失败。
    pub const EXTENSION_DESCRIPTOR: &str = "extension.descriptor";
    /// 依赖注入未能提供目标实例。
    pub const EXTENSION_INJECTION: &str = "extension.injection";
    /// 候选端点列表为空。
    pub const CLUSTER_NO_ENDPOINTS: &str = "cluster.no_endpoints";
    /// 线程池拒绝任务。
    pub const EXECUTOR_REJECTED: &str = "executor.rejected";
    /// 线程池已经关闭。
    pub const EXECUTOR_SHUTDOWN: &str = "executor.shutdown";
}
