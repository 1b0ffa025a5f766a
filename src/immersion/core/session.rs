//! 页面会话
//!
//! 把扫描器、调度器和词汇存储绑定到一个文档上：首次扫描前等待一段时间，
//! 之后的文档变化通过 `notify_mutation` 合并成一次重新扫描。

use std::cell::{Cell, Ref, RefCell};
use std::rc::{Rc, Weak};

use tokio::sync::Notify;
use tokio::time::{sleep, sleep_until, Instant};

use crate::immersion::config::{ImmersionConfig, SiteFilter};
use crate::immersion::core::gateway::TranslationGateway;
use crate::immersion::core::lookup::RichDefinitionLookup;
use crate::immersion::document::{BlockRegistry, DocumentTree};
use crate::immersion::error::ImmersionResult;
use crate::immersion::pipeline::scheduler::{SchedulerContext, SchedulerStats, TranslationScheduler};
use crate::immersion::pipeline::{BlockScanner, ScanStats};
use crate::immersion::vocabulary::VocabularyStore;

struct SessionInner<T: DocumentTree + 'static> {
    tree: Rc<T>,
    config: ImmersionConfig,
    registry: Rc<RefCell<BlockRegistry<T::Node>>>,
    scheduler: TranslationScheduler<T>,
    scanner: RefCell<BlockScanner>,
    sites: SiteFilter,
    rescan_deadline: Cell<Option<Instant>>,
    rescan_scheduled: Cell<bool>,
    rescan_done: Notify,
    scans: Cell<usize>,
}

/// 一个文档的沉浸式翻译会话
///
/// 必须在 `tokio::task::LocalSet` 中创建和使用。
pub struct PageSession<T: DocumentTree + 'static> {
    inner: Rc<SessionInner<T>>,
}

impl<T: DocumentTree + 'static> PageSession<T> {
    pub fn new(
        tree: Rc<T>,
        config: ImmersionConfig,
        gateway: Rc<dyn TranslationGateway>,
        store: &dyn VocabularyStore,
        lookup: Option<Rc<dyn RichDefinitionLookup>>,
    ) -> ImmersionResult<Self> {
        config.validate()?;
        let sites = SiteFilter::from_config(&config.sites)?;
        let registry = Rc::new(RefCell::new(BlockRegistry::new()));

        let scheduler = TranslationScheduler::spawn(
            SchedulerContext {
                tree: tree.clone(),
                registry: registry.clone(),
                gateway,
                lookup,
                vocabulary: store.get_all(),
            },
            &config,
        );
        scheduler.follow_store(store);

        Ok(Self {
            inner: Rc::new(SessionInner {
                tree,
                scanner: RefCell::new(BlockScanner::new(&config.scan)),
                config,
                registry,
                scheduler,
                sites,
                rescan_deadline: Cell::new(None),
                rescan_scheduled: Cell::new(false),
                rescan_done: Notify::new(),
                scans: Cell::new(0),
            }),
        })
    }

    /// 页面地址是否在站点名单允许范围内
    pub fn is_enabled_for(&self, url: &str) -> bool {
        self.inner.config.enabled && self.inner.sites.is_allowed_url(url)
    }

    /// 等待首次扫描延迟后扫描整个文档，返回加入调度的块数
    pub async fn start(&self) -> usize {
        if !self.inner.config.enabled {
            tracing::info!("沉浸式翻译已关闭，跳过扫描");
            return 0;
        }

        sleep(self.inner.config.initial_scan_delay()).await;
        let accepted = self.inner.scan_now();
        tracing::info!("首次扫描完成: {} 个块进入翻译队列", accepted);
        accepted
    }

    /// 立即扫描一次
    pub fn scan_now(&self) -> usize {
        self.inner.scan_now()
    }

    /// 文档发生变化；防抖窗口内的多次调用只触发一次扫描
    pub fn notify_mutation(&self) {
        let inner = &self.inner;
        if !inner.config.enabled {
            return;
        }

        inner
            .rescan_deadline
            .set(Some(Instant::now() + inner.config.mutation_debounce()));
        if inner.rescan_scheduled.replace(true) {
            return;
        }

        // 等待期间只持有弱引用，会话被丢弃后任务直接结束
        let weak: Weak<SessionInner<T>> = Rc::downgrade(&self.inner);
        tokio::task::spawn_local(async move {
            // 截止时间可能在等待期间被推后
            loop {
                let Some(deadline) = weak.upgrade().and_then(|inner| inner.rescan_deadline.get())
                else {
                    break;
                };
                if Instant::now() >= deadline {
                    break;
                }
                sleep_until(deadline).await;
            }

            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.rescan_deadline.set(None);
            inner.rescan_scheduled.set(false);
            let accepted = inner.scan_now();
            tracing::debug!("重新扫描完成: {} 个新块", accepted);
            inner.rescan_done.notify_waiters();
        });
    }

    /// 把错误状态的块恢复为未扫描并安排一次重新扫描，返回恢复的块数
    pub fn retry_failed(&self) -> usize {
        let reset = self
            .inner
            .registry
            .borrow_mut()
            .reset_errors(self.inner.tree.as_ref());

        if !reset.is_empty() {
            tracing::info!("手动重试 {} 个失败的块", reset.len());
            self.notify_mutation();
        }
        reset.len()
    }

    /// 等待所有已安排的扫描和批次完成
    pub async fn settle(&self) {
        loop {
            if self.inner.rescan_scheduled.get() {
                let done = self.inner.rescan_done.notified();
                if self.inner.rescan_scheduled.get() {
                    done.await;
                }
            }

            self.inner.scheduler.idle().await;

            if !self.inner.rescan_scheduled.get() {
                break;
            }
        }
    }

    /// 首次扫描并等待全部翻译完成
    pub async fn run_to_completion(&self) -> SchedulerStats {
        self.start().await;
        self.settle().await;

        let stats = self.inner.scheduler.stats();
        tracing::info!(
            "翻译完成: {} 个块, {} 个批次, {} 个替换, {} 个块失败",
            stats.blocks_translated,
            stats.batches_dispatched,
            stats.spans_applied,
            stats.blocks_errored
        );
        stats
    }

    pub fn tree(&self) -> &Rc<T> {
        &self.inner.tree
    }

    pub fn config(&self) -> &ImmersionConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> Ref<'_, BlockRegistry<T::Node>> {
        self.inner.registry.borrow()
    }

    pub fn scheduler(&self) -> &TranslationScheduler<T> {
        &self.inner.scheduler
    }

    pub fn scan_stats(&self) -> ScanStats {
        self.inner.scanner.borrow().stats().clone()
    }

    /// 已执行的扫描次数
    pub fn scan_count(&self) -> usize {
        self.inner.scans.get()
    }
}

impl<T: DocumentTree + 'static> SessionInner<T> {
    fn scan_now(&self) -> usize {
        let blocks = {
            let registry = self.registry.borrow();
            self.scanner
                .borrow_mut()
                .scan(self.tree.as_ref(), &registry)
        };
        self.scans.set(self.scans.get() + 1);

        blocks
            .iter()
            .filter(|block| self.scheduler.add(block))
            .count()
    }
}
