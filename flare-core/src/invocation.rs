use std::collections::BTreeMap;

/// `Invocation` 描述一次调用的方法名与随路附件。
///
/// # 设计背景（Why）
/// - 自适应分发允许调用方通过附件临时覆盖 URL 中的选路键；
/// - 集群选路需要方法名来查询方法级权重与活跃计数。
///
/// # 契约说明（What）
/// - 附件键值均为 UTF-8 字符串；空字符串视同缺失，与 [`Url`](crate::url::Url) 的参数语义一致。
/// - 本类型按值克隆，调用管线可安全地跨线程传递快照。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Invocation {
    method_name: String,
    attachments: BTreeMap<String, String>,
}

impl Invocation {
    /// 以方法名构造调用描述。
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            attachments: BTreeMap::new(),
        }
    }

    /// 方法名。
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Builder 风格的附件追加。
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }

    /// 写入附件。
    pub fn set_attachment(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attachments.insert(key.into(), value.into());
    }

    /// 读取附件；空字符串视同缺失。
    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments
            .get(key)
            .map(|value| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// 以不可变引用形式暴露全部附件。
    pub fn attachments(&self) -> &BTreeMap<String, String> {
        &self.attachments
    }
}
