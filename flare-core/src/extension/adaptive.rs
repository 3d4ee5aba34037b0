use std::sync::Arc;

use crate::error::FlareError;
use crate::extension::error::ExtensionError;
use crate::extension::point::ExtensionPoint;
use crate::extension::registry::extension_registry;
use crate::invocation::Invocation;
use crate::url::Url;

/// `Adaptive` 是扩展点的自适应分发句柄。
///
/// # 设计背景（Why）
/// - 原始体系在运行期合成一个实现接口的分发类并交给编译器加载；没有运行时代码生成的
///   目标环境用"值键分发表"达成同一契约：登记期预先计算键序列与缺省名，调用期查表。
/// - 当扩展点声明了手写自适应实现时，该实现取代合成分发，句柄直接持有其实例。
///
/// # 逻辑解析（How）
/// - 合成形态逐个尝试键序列：先查调用附件（允许单次调用覆盖选路），再查 URL 参数；
///   全部未命中时回退接口缺省名；仍无结果则在调用期报错。
/// - 解析出的名字通过进程级注册中心取得实例并完成委派。
///
/// # 契约说明（What）
/// - **前置条件**：URL 为本次调用的配置快照；附件覆盖只对本次调用生效。
/// - **后置条件**：同样的 `(URL, 附件)` 输入总是解析到同一个扩展名。
///
/// # 风险提示（Trade-offs）
/// - 与合成代码相比，查表分发多一次注册中心查询；实例缓存使其仍为常数开销。
pub struct Adaptive<T: ExtensionPoint + ?Sized> {
    kind: AdaptiveKind<T>,
}

enum AdaptiveKind<T: ?Sized> {
    Declared(Arc<T>),
    Synthesized {
        keys: Vec<String>,
        default_name: Option<String>,
    },
}

impl<T: ExtensionPoint + ?Sized> Clone for Adaptive<T> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            AdaptiveKind::Declared(instance) => AdaptiveKind::Declared(instance.clone()),
            AdaptiveKind::Synthesized { keys, default_name } => AdaptiveKind::Synthesized {
                keys: keys.clone(),
                default_name: default_name.clone(),
            },
        };
        Self { kind }
    }
}

impl<T: ExtensionPoint + ?Sized> Adaptive<T> {
    pub(crate) fn declared(instance: Arc<T>) -> Self {
        Self {
            kind: AdaptiveKind::Declared(instance),
        }
    }

    pub(crate) fn synthesized(keys: Vec<String>, default_name: Option<String>) -> Self {
        Self {
            kind: AdaptiveKind::Synthesized { keys, default_name },
        }
    }

    /// 手写自适应实例；合成形态返回 `None`。
    pub fn declared_instance(&self) -> Option<Arc<T>> {
        match &self.kind {
            AdaptiveKind::Declared(instance) => Some(instance.clone()),
            AdaptiveKind::Synthesized { .. } => None,
        }
    }

    /// 仅依据 URL 解析目标实例。
    pub fn resolve(&self, url: &Url) -> Result<Arc<T>, FlareError> {
        self.resolve_with(url, None)
    }

    /// 依据 URL 与可选的调用描述解析目标实例；附件优先于 URL 参数。
    pub fn resolve_with(
        &self,
        url: &Url,
        invocation: Option<&Invocation>,
    ) -> Result<Arc<T>, FlareError> {
        match &self.kind {
            AdaptiveKind::Declared(instance) => Ok(instance.clone()),
            AdaptiveKind::Synthesized { keys, default_name } => {
                let mut chosen: Option<String> = None;
                for key in keys {
                    let from_attachment =
                        invocation.and_then(|invocation| invocation.attachment(key));
                    if let Some(value) = from_attachment.or_else(|| url.get_parameter(key)) {
                        chosen = Some(value.to_string());
                        break;
                    }
                }
                let name = match chosen.or_else(|| default_name.clone()) {
                    Some(name) => name,
                    None => {
                        return Err(ExtensionError::AdaptiveUnresolved {
                            point: T::NAME,
                            url: url.to_string(),
                            keys: keys.clone(),
                        }
                        .into())
                    }
                };
                extension_registry::<T>().get(&name)
            }
        }
    }
}
