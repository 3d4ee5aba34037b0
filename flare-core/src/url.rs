use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::{codes, FlareError};

/// `Url` 表达框架统一的配置与寻址描述符。
///
/// # 设计背景（Why）
/// - 借鉴 Envoy Cluster、gRPC Channel Arguments 与注册中心地址的通用做法，将协议、地址与
///   可选项集中在统一的键值结构中，避免接口碎片化。
/// - 扩展点的自适应分发、集群权重与线程池装配都以 URL 为唯一输入，因此这里是全框架的
///   配置主干。
///
/// # 逻辑解析（How）
/// - `parse` 接受 `scheme://host:port/path?k=v&...` 形式的文本并拆解各段；
/// - 参数表使用 `BTreeMap`，保证遍历顺序稳定，利于配置 diff 与测试断言；
/// - 方法级参数以 `"{method}.{key}"` 存放，`get_method_parameter` 先查方法键再回退全局键。
///
/// # 契约说明（What）
/// - 所有键与值均为 UTF-8 字符串，键名建议使用小写；本类型不做 schema 校验。
/// - `get_parameter` 将空字符串视同缺失，与激活匹配的"非空"规则保持一致；
///   需要原始值时请使用 [`Url::parameters`]。
///
/// # 设计取舍与风险（Trade-offs）
/// - 使用 `BTreeMap` 牺牲部分插入性能换取确定性顺序；
/// - 未实现百分号转义等完整 URL 语法，超出框架配置场景的输入应在外层预处理。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Url {
    scheme: String,
    host: String,
    port: u16,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl Url {
    /// 以各段显式构造 URL。
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            path: path.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// 解析 `scheme://host:port/path?k=v&...` 形式的文本。
    ///
    /// # 契约说明
    /// - **前置条件**：`scheme` 与 `host` 段必须存在；端口、路径与查询串均可缺省。
    /// - **后置条件**：成功时返回拥有所有权的 `Url`；失败时返回 `url.parse` 错误并附带原文。
    pub fn parse(text: &str) -> Result<Self, FlareError> {
        let (scheme, rest) = text.split_once("://").ok_or_else(|| {
            FlareError::new(codes::URL_PARSE, format!("missing scheme in `{text}`"))
        })?;
        if scheme.is_empty() {
            return Err(FlareError::new(
                codes::URL_PARSE,
                format!("empty scheme in `{text}`"),
            ));
        }
        let (main, query) = match rest.split_once('?') {
            Some((main, query)) => (main, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = match main.split_once('/') {
            Some((authority, path)) => (authority, path.to_string()),
            None => (main, String::new()),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_text)) => {
                let port = port_text.parse::<u16>().map_err(|parse| {
                    FlareError::new(codes::URL_PARSE, format!("bad port in `{text}`"))
                        .with_cause(parse)
                })?;
                (host.to_string(), port)
            }
            None => (authority.to_string(), 0),
        };
        if host.is_empty() {
            return Err(FlareError::new(
                codes::URL_PARSE,
                format!("empty host in `{text}`"),
            ));
        }

        let mut url = Url::new(scheme, host, port, path);
        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                match pair.split_once('=') {
                    Some((key, value)) => url.set_parameter(key, value),
                    None => url.set_parameter(pair, ""),
                }
            }
        }
        Ok(url)
    }

    /// 协议段。
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// 主机段。
    pub fn host(&self) -> &str {
        &self.host
    }

    /// 端口，缺省为 0。
    pub fn port(&self) -> u16 {
        self.port
    }

    /// 路径段（不含前导 `/`）。
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port` 形式的寻址标识，用于活跃计数等以端点为键的表。
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 以不可变引用形式暴露参数表，供调试或一次性遍历。
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// 插入或覆盖参数。
    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(key.into(), value.into());
    }

    /// Builder 风格的参数追加，便于链式构造。
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(key, value);
        self
    }

    /// 读取参数值；空字符串视同缺失。
    pub fn get_parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(|value| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// 读取方法级参数，先查 `"{method}.{key}"`，再回退全局键。
    pub fn get_method_parameter(&self, method: &str, key: &str) -> Option<&str> {
        self.get_parameter(&format!("{method}.{key}"))
            .or_else(|| self.get_parameter(key))
    }

    /// 解析布尔参数，接受 `true/false`。
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_parameter(key)
            .and_then(|value| value.parse::<bool>().ok())
    }

    /// 解析无符号整数参数。
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_parameter(key)
            .and_then(|value| value.parse::<u64>().ok())
    }

    /// 解析有符号整数参数，线程池队列容量等允许负值的场景使用。
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_parameter(key)
            .and_then(|value| value.parse::<i64>().ok())
    }

    /// 按毫秒解析持续时间。
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get_u64(key).map(Duration::from_millis)
    }

    /// 解析正整数参数；缺失、非法或非正值时返回缺省值。
    pub fn get_positive(&self, key: &str, default: usize) -> usize {
        match self.get_u64(key) {
            Some(value) if value > 0 => usize::try_from(value).unwrap_or(default),
            _ => default,
        }
    }

    /// 解析方法级无符号整数参数。
    pub fn get_method_u64(&self, method: &str, key: &str) -> Option<u64> {
        self.get_method_parameter(method, key)
            .and_then(|value| value.parse::<u64>().ok())
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        let mut lead = '?';
        for (key, value) in &self.parameters {
            write!(f, "{lead}{key}={value}")?;
            lead = '&';
        }
        Ok(())
    }
}
