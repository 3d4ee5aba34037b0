#![doc = "flare-core: 分布式 RPC 框架的扩展加载与选路内核。"]
#![doc = ""]
#![doc = "框架行为在运行期由可插拔实现装配而成：协议、传输、序列化、过滤器、"]
#![doc = "选路算法、线程池工厂与缓存后端都经由按接口组织的扩展注册中心取得，"]
#![doc = "并以 URL 形式的描述符完成按调用选择。本 crate 提供三个紧耦合子系统："]
#![doc = "扩展注册中心（发现、注入、包装、激活与自适应分发）、最少活跃集群选路"]
#![doc = "与线程池工厂。"]

pub mod cache;
pub mod cluster;
pub mod constants;
pub mod error;
pub mod executor;
pub mod extension;
pub mod filter;
pub mod invocation;
pub mod observability;
pub mod url;

pub use cache::{Cache, CacheFactory};
pub use cluster::{
    begin_call, endpoint_weight, status_of, ActiveGuard, Endpoint, EndpointStatus,
    LeastActiveLoadBalance, LoadBalance, RandomLoadBalance, RandomSource, SeededRandom,
    StaticEndpoint, ThreadRandom,
};
pub use error::{ErrorCause, FlareError};
pub use executor::{
    AbortPolicyWithReport, CachedThreadPool, EagerThreadPool, Executor, ExecutorConfig,
    ExecutorSnapshot, FixedThreadPool, LimitedThreadPool, NamedThreadFactory, QueueCapacity,
    ThreadPool,
};
pub use extension::{
    add_extension_directory, destroy_all, extension_registry, Adaptive, ActivateSpec, ClassKind,
    ExtensionClass, ExtensionError, ExtensionInjector, ExtensionPoint, ExtensionRegistry,
    InjectionContext, Lifecycle, LoadingStrategy, RegistryInjector, WrapperSpec,
    set_extension_directories, set_loading_strategies,
};
pub use filter::Filter;
pub use invocation::Invocation;
pub use observability::{set_logger, LogSeverity, Logger, NoopLogger};
pub use url::Url;
