//! # 扩展子系统错误域
//!
//! ## 角色定位（Why）
//! - 为注册中心对外暴露的错误语义提供集中定义，确保与 [`FlareError`] 的稳定错误码对齐；
//! - 归档描述符解析、实例化与自适应分发等不同类别，方便运维与观测。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error` 以兼容 `std::error::Error`；
//! - 可恢复错误（单行描述符失败、注入失败）只进入记录表或日志，不在此处终止加载；
//! - 需要记忆并重放的错误（自适应槽位）保持 `Clone`，避免因错误链不可克隆而丢失上下文。

use thiserror::Error;

use crate::error::{codes, FlareError};

/// 扩展子系统核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合扩展发现、实例化与自适应分发关键路径的异常，并为上层统一转换为
///   [`FlareError`] 做准备；细粒度枚举帮助调用方快速定位故障来源。
/// - **契约 (What)**：
///   - 所有变体均为 `Clone + Send + Sync + 'static`，可安全跨线程传播并被记忆重放；
///   - 通过 [`From<ExtensionError>`](From) 自动转换为统一错误域，便于 `?` 传播。
/// - **设计权衡 (Trade-offs)**：上下文以 `String` 保存，牺牲少量堆分配换取可读性；
///   记录表中的底层原因以格式化文本归档而非保留原错误对象，换取 `Clone` 能力。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtensionError {
    /// 指定名字的扩展不存在，或其名字已因重复定义被判定为不可接受。
    #[error("no such extension `{name}` for point `{point}`{}", format_causes(.causes))]
    NoSuchExtension {
        point: &'static str,
        name: String,
        /// 加载期记录的、键名与 `name` 前缀匹配的错误摘要。
        causes: Vec<String>,
    },

    /// 两个不同的实现类型争用同一个扩展名。
    #[error("duplicate extension name `{name}` for point `{point}`: `{existing}` vs `{duplicate}`")]
    DuplicateExtension {
        point: &'static str,
        name: String,
        existing: String,
        duplicate: String,
    },

    /// 扩展名使用了保留字。
    #[error("extension name `{name}` is reserved for point `{point}`")]
    ReservedName { point: &'static str, name: String },

    /// 同一扩展点出现了多个自适应实现。
    #[error("more than one adaptive class for point `{point}`: `{existing}` vs `{duplicate}`")]
    MultipleAdaptive {
        point: &'static str,
        existing: String,
        duplicate: String,
    },

    /// 自适应实例创建失败；该结果会被记忆并在后续调用中原样重放。
    #[error("failed to create adaptive instance for point `{point}`: {detail}")]
    AdaptiveUnavailable { point: &'static str, detail: String },

    /// 自适应分发在附件、URL 键与缺省名之间未能解析出扩展名。
    #[error(
        "failed to resolve extension name for point `{point}` from url `{url}` using keys {keys:?}"
    )]
    AdaptiveUnresolved {
        point: &'static str,
        url: String,
        keys: Vec<String>,
    },

    /// 扩展实例化失败。
    #[error("extension instance (name: `{name}`, point: `{point}`) couldn't be created: {detail}")]
    InstantiationFailed {
        point: &'static str,
        name: String,
        detail: String,
    },

    /// 构造期间检测到对同一 `(扩展点, 名字)` 的重入解析。
    #[error("cyclic resolution of extension `{name}` for point `{point}`")]
    CyclicExtension { point: &'static str, name: String },

    /// 扩展点未声明缺省扩展名。
    #[error("point `{point}` declares no default extension")]
    NoDefault { point: &'static str },

    /// 单行描述符解析或类型登记解析失败。
    #[error("failed to load extension line `{line}` for point `{point}`: {detail}")]
    DescriptorLine {
        point: &'static str,
        line: String,
        detail: String,
    },

    /// 依赖注入未能提供目标实例。
    #[error("no injectable instance `{name}` of point `{wanted}` while building `{point}`")]
    InjectionFailed {
        point: &'static str,
        wanted: &'static str,
        name: String,
    },
}

fn format_causes(causes: &[String]) -> String {
    if causes.is_empty() {
        return String::new();
    }
    let mut text = String::from(", possible causes: ");
    for (index, cause) in causes.iter().enumerate() {
        text.push_str(&format!("({}) {cause} ", index + 1));
    }
    text.truncate(text.trim_end().len());
    text
}

impl ExtensionError {
    /// 选取统一错误域中的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ExtensionError::NoSuchExtension { .. } => codes::EXTENSION_MISSING,
            ExtensionError::DuplicateExtension { .. } => codes::EXTENSION_DUPLICATE,
            ExtensionError::ReservedName { .. } => codes::EXTENSION_NAME_RESERVED,
            ExtensionError::MultipleAdaptive { .. } => codes::EXTENSION_ADAPTIVE_CONFLICT,
            ExtensionError::AdaptiveUnavailable { .. } => codes::EXTENSION_ADAPTIVE_UNAVAILABLE,
            ExtensionError::AdaptiveUnresolved { .. } => codes::EXTENSION_ADAPTIVE_UNRESOLVED,
            ExtensionError::InstantiationFailed { .. } => codes::EXTENSION_INSTANTIATION,
            ExtensionError::CyclicExtension { .. } => codes::EXTENSION_CYCLE,
            ExtensionError::NoDefault { .. } => codes::EXTENSION_NO_DEFAULT,
            ExtensionError::DescriptorLine { .. } => codes::EXTENSION_DESCRIPTOR,
            ExtensionError::InjectionFailed { .. } => codes::EXTENSION_INJECTION,
        }
    }
}

impl From<ExtensionError> for FlareError {
    /// 将扩展错误转换为统一的领域错误。
    ///
    /// # 教案式说明
    /// - **执行 (How)**：按变体选取稳定错误码，保留可读描述，并把原始枚举挂入错误链。
    /// - **契约 (What)**：返回的 [`FlareError`] 至少包含错误码与消息，调用方可继续追加上下文。
    fn from(value: ExtensionError) -> Self {
        let message = value.to_string();
        FlareError::new(value.code(), message).with_cause(value)
    }
}
