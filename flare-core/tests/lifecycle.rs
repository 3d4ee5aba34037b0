//! 生命周期回调与进程收尾：initialize 时机、destroy 的尽力而为语义。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use flare_core::extension::{destroy_all, extension_registry, ExtensionClass, ExtensionPoint, Lifecycle};
use flare_core::FlareError;

static INITIALIZED: AtomicUsize = AtomicUsize::new(0);
static DESTROYED: AtomicUsize = AtomicUsize::new(0);
static FAULTY_DESTROYED: AtomicBool = AtomicBool::new(false);

trait Reporter: Send + Sync {
    fn id(&self) -> &'static str;
}

impl ExtensionPoint for dyn Reporter {
    const NAME: &'static str = "flare.test.Reporter";
}

struct MetricsReporter;

impl Reporter for MetricsReporter {
    fn id(&self) -> &'static str {
        "metrics"
    }
}

impl Lifecycle for MetricsReporter {
    fn initialize(&self) -> Result<(), FlareError> {
        INITIALIZED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self) -> Result<(), FlareError> {
        DESTROYED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FaultyReporter;

impl Reporter for FaultyReporter {
    fn id(&self) -> &'static str {
        "faulty"
    }
}

impl Lifecycle for FaultyReporter {
    fn initialize(&self) -> Result<(), FlareError> {
        Ok(())
    }

    fn destroy(&self) -> Result<(), FlareError> {
        FAULTY_DESTROYED.store(true, Ordering::SeqCst);
        Err(FlareError::new("test.destroy", "simulated teardown failure"))
    }
}

#[test]
fn lifecycle_runs_initialize_once_and_destroy_for_all() {
    let registry = extension_registry::<dyn Reporter>();
    registry
        .add_extension(
            "metrics",
            ExtensionClass::normal_with_lifecycle(
                "lifecycle_test::MetricsReporter",
                |_ctx| Ok(MetricsReporter),
                |reporter| reporter,
            ),
        )
        .expect("登记 metrics");
    registry
        .add_extension(
            "faulty",
            ExtensionClass::normal_with_lifecycle(
                "lifecycle_test::FaultyReporter",
                |_ctx| Ok(FaultyReporter),
                |reporter| reporter,
            ),
        )
        .expect("登记 faulty");

    let first = registry.get("metrics").expect("实例化");
    let again = registry.get("metrics").expect("复用");
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(INITIALIZED.load(Ordering::SeqCst), 1, "initialize 只应执行一次");
    assert_eq!(first.id(), "metrics");

    registry.get("faulty").expect("实例化 faulty");

    // faulty 的 destroy 返回错误，但不应阻断 metrics 的销毁。
    destroy_all();
    assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    assert!(FAULTY_DESTROYED.load(Ordering::SeqCst));
}
