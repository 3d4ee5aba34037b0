use crate::error::FlareError;

/// `Lifecycle` 是扩展实例可选实现的生命周期能力。
///
/// # 契约说明（What）
/// - `initialize` 在实例构造、注入与包装完成之后被调用一次；返回错误视同实例化失败。
/// - `destroy` 在进程收尾阶段被调用；错误只记录日志，不阻断其余实例的销毁。
///
/// # 风险提示（Trade-offs）
/// - 回调为同步方法，保证销毁顺序可预测；耗时清理应由实现方自行移交后台线程。
pub trait Lifecycle: Send + Sync + 'static {
    /// 实例就绪回调。
    fn initialize(&self) -> Result<(), FlareError>;

    /// 实例销毁回调。
    fn destroy(&self) -> Result<(), FlareError>;
}
