use std::backtrace::Backtrace;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{DUMP_DIRECTORY_KEY, DUMP_DISABLED_KEY};
use crate::error::{codes, FlareError};
use crate::observability;
use crate::url::Url;

use super::pool::ExecutorSnapshot;

/// 两次诊断转储之间的最小间隔：十分钟。
const DUMP_INTERVAL_MS: u64 = 10 * 60 * 1000;

static LAST_DUMP_MS: AtomicU64 = AtomicU64::new(0);

/// 带报告的拒绝策略：拒绝任务前先产出可定位的诊断信息。
///
/// # 设计背景（Why）
/// - 线程池打满往往是故障的第一信号，只抛错误会丢失现场；拒绝时的池状态快照
///   与转储文件能把"是谁、多满、什么配置"一次性留存。
///
/// # 逻辑解析（How）
/// - 先写告警日志（池名、线程数、活跃数、队列长度、装配 URL）；
/// - 再把快照连同当前线程回溯写入 `{池名}_{毫秒时间戳}.dump` 文件，同名池十分钟内
///   至多转储一次，避免风暴；
/// - 最后以 `executor.rejected` 错误返回给提交方。
///
/// # 契约说明（What）
/// - 转储目录取 URL 的 `dump.directory` 参数，缺省为系统临时目录；
///   `dump.disabled=true` 可整体关闭转储。
/// - 转储失败只记录日志，不影响拒绝错误的返回。
#[derive(Debug)]
pub struct AbortPolicyWithReport {
    name: String,
    url: Url,
}

impl AbortPolicyWithReport {
    /// 以池名与装配 URL 构造策略。
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
        }
    }

    /// 产出报告并返回拒绝错误。
    pub(crate) fn rejected(&self, snapshot: ExecutorSnapshot) -> FlareError {
        let message = format!(
            "Thread pool is EXHAUSTED! Thread Name: {}, Pool Size: {} (active: {}, core: {}, max: {}, largest: {}), Task Queue Size: {}, in {}!",
            self.name,
            snapshot.pool_size,
            snapshot.active_count,
            snapshot.core_size,
            snapshot.max_size,
            snapshot.largest_pool_size,
            snapshot.queue_size,
            self.url,
        );
        observability::warn("flare.executor", &message);
        self.dump(&snapshot);
        FlareError::new(codes::EXECUTOR_REJECTED, message)
    }

    fn dump(&self, snapshot: &ExecutorSnapshot) {
        if self.url.get_bool(DUMP_DISABLED_KEY) == Some(true) {
            return;
        }
        let now = crate::cluster::loadbalance::now_millis();
        let last = LAST_DUMP_MS.load(Ordering::Acquire);
        if now.saturating_sub(last) < DUMP_INTERVAL_MS {
            return;
        }
        if LAST_DUMP_MS
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let directory = self
            .url
            .get_parameter(DUMP_DIRECTORY_KEY)
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        let path = directory.join(format!("{}_{now}.dump", self.name));

        let mut content = String::new();
        content.push_str(&format!("rejection report for thread pool `{}`\n", self.name));
        content.push_str(&format!("url: {}\n", self.url));
        match serde_json::to_string_pretty(snapshot) {
            Ok(body) => {
                content.push_str("snapshot: ");
                content.push_str(&body);
                content.push('\n');
            }
            Err(error) => content.push_str(&format!("snapshot unavailable: {error}\n")),
        }
        content.push_str(&format!(
            "submitter backtrace:\n{}\n",
            Backtrace::force_capture()
        ));

        if let Err(error) = fs::write(&path, content) {
            observability::error(
                "flare.executor",
                &format!("failed to write rejection dump `{}`", path.display()),
                Some(&error),
            );
        } else {
            observability::info(
                "flare.executor",
                &format!("rejection dump written to `{}`", path.display()),
            );
        }
    }
}
