//! 扩展注册中心的端到端行为：描述符加载、单例语义、包装链、自适应分发与激活协议。

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use flare_core::cluster::LoadBalance;
use flare_core::error::codes;
use flare_core::extension::catalog;
use flare_core::extension::{
    extension_registry, set_extension_directories, ActivateSpec, ExtensionClass, ExtensionPoint,
    WrapperSpec,
};
use flare_core::{Filter, FlareError, Invocation, Url};
use tempfile::TempDir;

// ─── 测试扩展点与实现 ──────────────────────────────────────────────

trait Protocol: Send + Sync {
    fn describe(&self) -> String;
}

impl ExtensionPoint for dyn Protocol {
    const NAME: &'static str = "flare.test.Protocol";
    const DEFAULT_NAME: Option<&'static str> = Some("tcp");
}

struct TcpProtocol;
impl Protocol for TcpProtocol {
    fn describe(&self) -> String {
        "tcp".to_string()
    }
}

struct InprocProtocol;
impl Protocol for InprocProtocol {
    fn describe(&self) -> String {
        "inproc".to_string()
    }
}

trait Transport: Send + Sync {
    fn describe(&self) -> String;
}

impl ExtensionPoint for dyn Transport {
    const NAME: &'static str = "flare.test.Transport";
    const DEFAULT_NAME: Option<&'static str> = Some("plain");
}

struct PlainTransport;
impl Transport for PlainTransport {
    fn describe(&self) -> String {
        "plain".to_string()
    }
}

struct BareTransport;
impl Transport for BareTransport {
    fn describe(&self) -> String {
        "bare".to_string()
    }
}

struct TaggedTransport {
    tag: &'static str,
    inner: Arc<dyn Transport>,
}
impl Transport for TaggedTransport {
    fn describe(&self) -> String {
        format!("{}({})", self.tag, self.inner.describe())
    }
}

trait Codec: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &'static str;
}

impl ExtensionPoint for dyn Codec {
    const NAME: &'static str = "flare.test.Codec";
}

macro_rules! codec {
    ($name:ident, $id:literal) => {
        #[derive(Debug)]
        struct $name;
        impl Codec for $name {
            fn id(&self) -> &'static str {
                $id
            }
        }
    };
}
codec!(JsonCodec, "json");
codec!(OtherCodec, "other");
codec!(RawCodec, "raw");
codec!(OldCodec, "old");

struct NamedFilter;
impl Filter for NamedFilter {
    fn filter(&self, _url: &Url, _invocation: &Invocation) -> Result<(), FlareError> {
        Ok(())
    }
}

trait Picker: Send + Sync {
    fn balance(&self) -> Arc<dyn LoadBalance>;
}

impl ExtensionPoint for dyn Picker {
    const NAME: &'static str = "flare.test.Picker";
}

struct RandomPicker {
    balance: Arc<dyn LoadBalance>,
}
impl Picker for RandomPicker {
    fn balance(&self) -> Arc<dyn LoadBalance> {
        self.balance.clone()
    }
}

trait Loopy: Send + Sync + std::fmt::Debug {}

impl ExtensionPoint for dyn Loopy {
    const NAME: &'static str = "flare.test.Loopy";
}

#[derive(Debug)]
struct SelfReferential;
impl Loopy for SelfReferential {}

// ─── 一次性环境装配 ────────────────────────────────────────────────

static SETUP: OnceLock<TempDir> = OnceLock::new();

fn setup() {
    SETUP.get_or_init(|| {
        let root = TempDir::new().expect("临时扩展目录");

        let flare_dir = root.path().join("META-INF/flare");
        fs::create_dir_all(&flare_dir).expect("创建目录");
        fs::write(
            flare_dir.join("flare.test.Protocol"),
            "# 测试协议\ntcp=proto_test::TcpProtocol\ninproc=proto_test::InprocProtocol\n",
        )
        .expect("写描述符");

        let services_dir = root.path().join("META-INF/services");
        fs::create_dir_all(&services_dir).expect("创建目录");
        fs::write(
            services_dir.join("flare.test.Codec"),
            "json=codec_test::JsonCodec # 首选实现\n\
             json=codec_test::OtherCodec\n\
             codec_test::RawCodec\n\
             bogus=codec_test::Missing\n",
        )
        .expect("写描述符");
        fs::write(
            services_dir.join("blaze.test.Codec"),
            "old=codec_test::OldCodec\n",
        )
        .expect("写历史描述符");

        catalog::register(ExtensionClass::<dyn Protocol>::normal(
            "proto_test::TcpProtocol",
            |_ctx| Ok(TcpProtocol),
            |protocol| protocol,
        ));
        catalog::register(ExtensionClass::<dyn Protocol>::normal(
            "proto_test::InprocProtocol",
            |_ctx| Ok(InprocProtocol),
            |protocol| protocol,
        ));
        catalog::register(ExtensionClass::<dyn Codec>::normal(
            "codec_test::JsonCodec",
            |_ctx| Ok(JsonCodec),
            |codec| codec,
        ));
        catalog::register(ExtensionClass::<dyn Codec>::normal(
            "codec_test::OtherCodec",
            |_ctx| Ok(OtherCodec),
            |codec| codec,
        ));
        catalog::register(ExtensionClass::<dyn Codec>::normal(
            "codec_test::RawCodec",
            |_ctx| Ok(RawCodec),
            |codec| codec,
        ));
        catalog::register(ExtensionClass::<dyn Codec>::normal(
            "codec_test::OldCodec",
            |_ctx| Ok(OldCodec),
            |codec| codec,
        ));

        set_extension_directories(vec![root.path().to_path_buf()]);

        // 包装链与激活协议走编程式登记。
        let transports = extension_registry::<dyn Transport>();
        transports
            .add_extension(
                "plain",
                ExtensionClass::normal("transport_test::PlainTransport", |_ctx| Ok(PlainTransport), |t| t),
            )
            .expect("登记 plain");
        transports
            .add_extension(
                "bare",
                ExtensionClass::normal("transport_test::BareTransport", |_ctx| Ok(BareTransport), |t| t),
            )
            .expect("登记 bare");
        transports
            .add_extension(
                "",
                ExtensionClass::wrapper(
                    "transport_test::AccessLogWrapper",
                    WrapperSpec::new(1).with_mismatches(&["bare"]),
                    |inner, _ctx| Ok(TaggedTransport { tag: "log", inner }),
                    |t| t,
                ),
            )
            .expect("登记 log 包装器");
        transports
            .add_extension(
                "",
                ExtensionClass::wrapper(
                    "transport_test::MetricsWrapper",
                    WrapperSpec::new(2),
                    |inner, _ctx| Ok(TaggedTransport { tag: "metrics", inner }),
                    |t| t,
                ),
            )
            .expect("登记 metrics 包装器");

        let filters = extension_registry::<dyn Filter>();
        for (name, spec) in [
            ("cache", Some(ActivateSpec::new(&["consumer", "provider"], 10))),
            ("validation", Some(ActivateSpec::new(&["consumer", "provider"], 20))),
            ("token", Some(ActivateSpec::new(&["provider"], 30))),
            (
                "monitor",
                Some(ActivateSpec::new(&["consumer"], 40).with_values(&["monitor"])),
            ),
            ("demo", None),
            ("demo2", None),
        ] {
            let type_path: &'static str =
                Box::leak(format!("filter_test::{name}Filter").into_boxed_str());
            let mut class =
                ExtensionClass::<dyn Filter>::normal(type_path, |_ctx| Ok(NamedFilter), |f| f);
            if let Some(spec) = spec {
                class = class.with_activate(spec);
            }
            filters.add_extension(name, class).expect("登记过滤器");
        }

        root
    });
}

fn plain_url() -> Url {
    Url::new("flare", "127.0.0.1", 20880, "demo.EchoService")
}

// ─── 描述符加载与单例语义 ──────────────────────────────────────────

#[test]
fn descriptor_backed_point_resolves_names_and_default() {
    setup();
    let registry = extension_registry::<dyn Protocol>();

    assert_eq!(
        registry.supported_extensions(),
        vec!["inproc".to_string(), "tcp".to_string()]
    );
    assert_eq!(registry.default_extension_name(), Some("tcp".to_string()));

    let by_alias = registry.get("true").expect("缺省别名");
    let by_name = registry.get("tcp").expect("按名获取");
    assert!(Arc::ptr_eq(&by_alias, &by_name));

    let inproc = registry.get("inproc").expect("第二实现");
    assert!(!Arc::ptr_eq(&by_name, &inproc));
    assert_eq!(inproc.describe(), "inproc");
}

#[test]
fn repeated_get_returns_identical_instance() {
    setup();
    let registry = extension_registry::<dyn Protocol>();
    let first = registry.get("tcp").expect("first");
    let second = registry.get("tcp").expect("second");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn concurrent_get_observes_one_singleton() {
    setup();
    let registry = extension_registry::<dyn Protocol>();
    let mut handles = Vec::new();
    for _ in 0..8 {
        handles.push(std::thread::spawn(|| {
            extension_registry::<dyn Protocol>()
                .get("inproc")
                .expect("并发获取")
        }));
    }
    let reference = registry.get("inproc").expect("基准");
    for handle in handles {
        let got = handle.join().expect("join");
        assert!(Arc::ptr_eq(&reference, &got));
    }
}

#[test]
fn get_or_default_falls_back_for_unknown_name() {
    setup();
    let registry = extension_registry::<dyn Protocol>();
    let fallback = registry.get_or_default("no-such").expect("回退缺省");
    assert_eq!(fallback.describe(), "tcp");
    assert!(registry.has_extension("inproc"));
    assert!(!registry.has_extension("no-such"));
}

#[test]
fn loaded_extensions_reflect_instantiation_only() {
    setup();
    let registry = extension_registry::<dyn Codec>();
    assert!(registry.loaded_extension("raw").is_none());
    let raw = registry.get("raw").expect("裸路径行派生名字");
    assert_eq!(raw.id(), "raw");
    assert!(registry.loaded_extensions().contains(&"raw".to_string()));
    let peeked = registry.loaded_extension("raw").expect("已实例化");
    assert!(Arc::ptr_eq(&raw, &peeked));
}

#[test]
fn extension_name_round_trips_through_type_path() {
    setup();
    let registry = extension_registry::<dyn Protocol>();
    registry.get("inproc").expect("实例化");
    assert_eq!(
        registry.extension_name_of("proto_test::InprocProtocol"),
        Some("inproc".to_string())
    );
}

// ─── 行级失败、重复定义与历史目录 ──────────────────────────────────

#[test]
fn duplicate_definition_poisons_the_name_with_causes() {
    setup();
    let registry = extension_registry::<dyn Codec>();
    let error = registry.get("json").expect_err("重复定义必须失败");
    assert_eq!(error.code(), codes::EXTENSION_MISSING);
    let text = error.to_string();
    assert!(text.contains("json"), "错误应指认名字: {text}");
    assert!(text.contains("possible causes"), "错误应附原因: {text}");
    assert!(text.contains("codec_test::OtherCodec"), "错误应点名冲突类型: {text}");
}

#[test]
fn unresolved_line_is_recorded_but_other_lines_survive(){
    setup();
    let registry = extension_registry::<dyn Codec>();
    // bogus 行解析失败，raw 与 old 照常可用。
    let error = registry.get("bogus").expect_err("未登记类型");
    assert!(error.to_string().contains("bogus"));
    assert!(registry.get("raw").is_ok());
}

#[test]
fn legacy_brand_descriptor_is_accepted() {
    setup();
    let registry = extension_registry::<dyn Codec>();
    assert!(registry.has_extension("old"));
    assert_eq!(registry.get("old").expect("历史文件").id(), "old");
}

// ─── 包装链 ────────────────────────────────────────────────────────

#[test]
fn wrappers_fold_with_highest_priority_outermost() {
    setup();
    let registry = extension_registry::<dyn Transport>();
    let wrapped = registry.get("plain").expect("包装后的实例");
    // order=1 的 log 包装器优先级更高，应在最外层。
    assert_eq!(wrapped.describe(), "log(metrics(plain))");
}

#[test]
fn wrapper_mismatch_filter_excludes_named_extension() {
    setup();
    let registry = extension_registry::<dyn Transport>();
    let bare = registry.get("bare").expect("实例");
    assert_eq!(bare.describe(), "metrics(bare)");
}

#[test]
fn wrapper_composition_is_stable_across_calls() {
    setup();
    let registry = extension_registry::<dyn Transport>();
    let first = registry.get("plain").expect("first");
    let second = registry.get("plain").expect("second");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.describe(), second.describe());
}

// ─── 自适应分发 ────────────────────────────────────────────────────

#[test]
fn synthesized_adaptive_reads_derived_url_key() {
    setup();
    let adaptive = extension_registry::<dyn Protocol>()
        .get_adaptive()
        .expect("合成分发");
    assert!(adaptive.declared_instance().is_none());

    let url = plain_url().with_parameter("protocol", "inproc");
    let chosen = adaptive.resolve(&url).expect("按键解析");
    assert_eq!(chosen.describe(), "inproc");

    let chosen_default = adaptive.resolve(&plain_url()).expect("回退缺省");
    assert_eq!(chosen_default.describe(), "tcp");
}

#[test]
fn adaptive_attachment_overrides_url_parameter() {
    setup();
    let adaptive = extension_registry::<dyn Protocol>()
        .get_adaptive()
        .expect("合成分发");
    let url = plain_url().with_parameter("protocol", "tcp");
    let invocation = Invocation::new("echo").with_attachment("protocol", "inproc");
    let chosen = adaptive.resolve_with(&url, Some(&invocation)).expect("附件覆盖");
    assert_eq!(chosen.describe(), "inproc");
}

#[test]
fn adaptive_resolution_matches_direct_lookup() {
    setup();
    let registry = extension_registry::<dyn Protocol>();
    let adaptive = registry.get_adaptive().expect("句柄");
    let url = plain_url().with_parameter("protocol", "inproc");
    let resolved = adaptive.resolve(&url).expect("解析");
    let direct = registry.get("inproc").expect("直接获取");
    assert!(Arc::ptr_eq(&resolved, &direct));
}

#[test]
fn adaptive_without_key_or_default_fails_at_call_time() {
    setup();
    let adaptive = extension_registry::<dyn Codec>()
        .get_adaptive()
        .expect("合成分发");
    let error = adaptive.resolve(&plain_url()).expect_err("无键无缺省");
    assert_eq!(error.code(), codes::EXTENSION_ADAPTIVE_UNRESOLVED);
}

#[test]
fn declared_adaptive_replaces_synthesized_dispatch() {
    setup();
    let registry = extension_registry::<dyn Transport>();
    registry
        .add_extension(
            "",
            ExtensionClass::adaptive(
                "transport_test::ManualAdaptiveTransport",
                |_ctx| Ok(PlainTransport),
                |t| t,
            ),
        )
        .expect("登记手写自适应");
    let adaptive = registry.get_adaptive().expect("手写分发");
    let declared = adaptive.declared_instance().expect("应为手写实例");
    let via_resolve = adaptive
        .resolve(&plain_url().with_parameter("transport", "bare"))
        .expect("手写分发忽略 URL");
    assert!(Arc::ptr_eq(&declared, &via_resolve));
}

// ─── 激活协议 ──────────────────────────────────────────────────────

#[test]
fn activation_orders_defaults_by_declared_order() {
    setup();
    let registry = extension_registry::<dyn Filter>();
    let url = plain_url();
    let active = registry
        .get_activate_extension(&url, &[], Some("consumer"))
        .expect("缺省激活");
    let cache = registry.get("cache").expect("cache");
    let validation = registry.get("validation").expect("validation");
    assert_eq!(active.len(), 2);
    assert!(Arc::ptr_eq(&active[0], &cache));
    assert!(Arc::ptr_eq(&active[1], &validation));
}

#[test]
fn activation_splices_requested_names_around_default_token() {
    setup();
    let registry = extension_registry::<dyn Filter>();
    let url = plain_url();
    let active = registry
        .get_activate_extension(&url, &["demo", "default", "demo2"], Some("consumer"))
        .expect("拼接");
    let expected = ["demo", "cache", "validation", "demo2"];
    assert_eq!(active.len(), expected.len());
    for (index, name) in expected.iter().enumerate() {
        let reference = registry.get(name).expect(name);
        assert!(
            Arc::ptr_eq(&active[index], &reference),
            "位置 {index} 应为 {name}"
        );
    }
}

#[test]
fn activation_minus_default_disables_all_defaults() {
    setup();
    let registry = extension_registry::<dyn Filter>();
    let url = plain_url().with_parameter("filter", "-default");
    let active = registry
        .get_activate(&url, "filter", Some("consumer"))
        .expect("剔除缺省");
    assert!(active.is_empty());
}

#[test]
fn activation_minus_name_removes_single_default() {
    setup();
    let registry = extension_registry::<dyn Filter>();
    let url = plain_url();
    let active = registry
        .get_activate_extension(&url, &["-cache"], Some("consumer"))
        .expect("剔除单个");
    let validation = registry.get("validation").expect("validation");
    assert_eq!(active.len(), 1);
    assert!(Arc::ptr_eq(&active[0], &validation));
}

#[test]
fn activation_filters_by_group() {
    setup();
    let registry = extension_registry::<dyn Filter>();
    let url = plain_url();
    let provider_side = registry
        .get_activate_extension(&url, &[], Some("provider"))
        .expect("提供端");
    let token = registry.get("token").expect("token");
    assert!(provider_side.iter().any(|f| Arc::ptr_eq(f, &token)));

    let consumer_side = registry
        .get_activate_extension(&url, &[], Some("consumer"))
        .expect("消费端");
    assert!(!consumer_side.iter().any(|f| Arc::ptr_eq(f, &token)));
}

#[test]
fn activation_value_key_requires_matching_url_parameter() {
    setup();
    let registry = extension_registry::<dyn Filter>();
    let monitor = registry.get("monitor").expect("monitor");

    let without = registry
        .get_activate_extension(&plain_url(), &[], Some("consumer"))
        .expect("无触发键");
    assert!(!without.iter().any(|f| Arc::ptr_eq(f, &monitor)));

    let with = registry
        .get_activate_extension(
            &plain_url().with_parameter("echo.monitor", "true"),
            &[],
            Some("consumer"),
        )
        .expect("后缀键触发");
    assert!(with.iter().any(|f| Arc::ptr_eq(f, &monitor)));
}

// ─── 缓存工厂契约 ──────────────────────────────────────────────────

#[test]
fn cache_factory_contract_resolves_through_registry() {
    use flare_core::{Cache, CacheFactory};

    setup();
    let registry = extension_registry::<dyn CacheFactory>();
    // 核心只携带工厂契约，存储实现由宿主登记；缺省名 lru 在此前应查无实现。
    assert_eq!(registry.default_extension_name(), Some("lru".to_string()));
    assert!(!registry.has_extension("lru"));
    assert_eq!(
        registry.get_default().expect_err("无内置存储实现").code(),
        codes::EXTENSION_MISSING
    );

    use parking_lot::Mutex;

    struct MapCache(Mutex<std::collections::BTreeMap<String, Arc<dyn std::any::Any + Send + Sync>>>);
    impl Cache for MapCache {
        fn put(&self, key: String, value: Arc<dyn std::any::Any + Send + Sync>) {
            self.0.lock().insert(key, value);
        }
        fn get(&self, key: &str) -> Option<Arc<dyn std::any::Any + Send + Sync>> {
            self.0.lock().get(key).cloned()
        }
    }
    #[derive(Debug)]
    struct MapCacheFactory;
    impl CacheFactory for MapCacheFactory {
        fn cache(
            &self,
            _url: &Url,
            _invocation: &Invocation,
        ) -> Result<Arc<dyn Cache>, FlareError> {
            Ok(Arc::new(MapCache(Mutex::new(Default::default()))))
        }
    }

    registry
        .add_extension(
            "lru",
            ExtensionClass::normal("cache_test::MapCacheFactory", |_ctx| Ok(MapCacheFactory), |f| f),
        )
        .expect("宿主登记存储实现");

    let adaptive = registry.get_adaptive().expect("自适应句柄");
    let factory = adaptive
        .resolve(&plain_url().with_parameter("cache", "lru"))
        .expect("按 cache 键解析");
    let cache = factory
        .cache(&plain_url(), &Invocation::new("echo"))
        .expect("物化缓存");
    cache.put("k".to_string(), Arc::new(42u64));
    let hit = cache.get("k").expect("命中");
    assert_eq!(hit.downcast_ref::<u64>(), Some(&42));
}

// ─── 注入与循环侦测 ────────────────────────────────────────────────

#[test]
fn constructor_injection_pulls_named_dependency() {
    setup();
    let registry = extension_registry::<dyn Picker>();
    registry
        .add_extension(
            "random",
            ExtensionClass::normal(
                "picker_test::RandomPicker",
                |ctx| {
                    let balance = ctx.inject_named::<dyn LoadBalance>("random")?;
                    Ok(RandomPicker { balance })
                },
                |picker| picker,
            ),
        )
        .expect("登记");
    let picker = registry.get("random").expect("注入成功");
    let direct = extension_registry::<dyn LoadBalance>()
        .get("random")
        .expect("选路实例");
    assert!(Arc::ptr_eq(&picker.balance(), &direct));
}

#[test]
fn cyclic_resolution_is_detected() {
    setup();
    let registry = extension_registry::<dyn Loopy>();
    registry
        .add_extension(
            "loop",
            ExtensionClass::normal(
                "loopy_test::SelfReferential",
                |_ctx| {
                    extension_registry::<dyn Loopy>().get("loop")?;
                    Ok(SelfReferential)
                },
                |loopy| loopy,
            ),
        )
        .expect("登记");
    let error = registry.get("loop").expect_err("必须报循环");
    assert_eq!(error.code(), codes::EXTENSION_INSTANTIATION);
    assert!(error.to_string().contains("cyclic resolution"));
}

#[test]
fn add_extension_rejects_duplicates_and_reserved_names() {
    setup();
    let registry = extension_registry::<dyn Protocol>();
    let duplicate = registry.add_extension(
        "tcp",
        ExtensionClass::normal("proto_test::TcpProtocol2", |_ctx| Ok(TcpProtocol), |p| p),
    );
    assert_eq!(duplicate.expect_err("同名登记").code(), codes::EXTENSION_DUPLICATE);

    let reserved = registry.add_extension(
        "true",
        ExtensionClass::normal("proto_test::TrueProtocol", |_ctx| Ok(TcpProtocol), |p| p),
    );
    assert_eq!(
        reserved.expect_err("保留字").code(),
        codes::EXTENSION_NAME_RESERVED
    );
}

#[test]
fn replace_extension_discards_cached_instance() {
    setup();
    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    trait Seq: Send + Sync {
        fn generation(&self) -> usize;
    }
    impl ExtensionPoint for dyn Seq {
        const NAME: &'static str = "flare.test.Seq";
    }
    struct Counted(usize);
    impl Seq for Counted {
        fn generation(&self) -> usize {
            self.0
        }
    }

    let registry = extension_registry::<dyn Seq>();
    registry
        .add_extension(
            "counted",
            ExtensionClass::normal(
                "seq_test::CountedV1",
                |_ctx| Ok(Counted(BUILDS.fetch_add(1, Ordering::SeqCst))),
                |seq| seq,
            ),
        )
        .expect("登记");
    let first = registry.get("counted").expect("v1");
    assert_eq!(first.generation(), 0);

    registry
        .replace_extension(
            "counted",
            ExtensionClass::normal(
                "seq_test::CountedV2",
                |_ctx| Ok(Counted(BUILDS.fetch_add(1, Ordering::SeqCst) + 100)),
                |seq| seq,
            ),
        )
        .expect("替换");
    let second = registry.get("counted").expect("v2");
    assert!(second.generation() >= 100, "替换后应重建实例");

    let missing = registry.replace_extension(
        "absent",
        ExtensionClass::normal("seq_test::CountedV3", |_ctx| Ok(Counted(0)), |seq| seq),
    );
    assert_eq!(missing.expect_err("不存在").code(), codes::EXTENSION_MISSING);
}
