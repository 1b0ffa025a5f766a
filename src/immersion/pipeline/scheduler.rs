//! 翻译调度器
//!
//! 累积待翻译的块，按数量、字符数或防抖计时合并成批次，交给唯一的工作任务
//! 依次发送。工作任务运行在 `LocalSet` 上（`spawn_local`），与文档共享同一个
//! 线程，因此文档和注册表只需要 `Rc<RefCell<_>>`。
//!
//! ## 状态
//!
//! - `Idle`: 缓冲区、队列均为空，没有正在处理的批次
//! - `Buffering`: 缓冲区中有块，等待阈值或防抖计时
//! - `Flushing`: 队列中有批次或正在发送
//!
//! ## 保证
//!
//! - 同一时间最多一个批次在途，批次严格先进先出
//! - 两次发送之间至少间隔 `inter_batch_delay`
//! - 发送期间仍然可以继续 `add`
//! - 进入 `Pending` 的块最终一定变为 `Translated`、`Unscanned` 或 `Error`，
//!   调度器被丢弃时尚未完成的块会被恢复为 `Unscanned`

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::immersion::config::{BatchConfig, DisplayConfig, EngineConfig, ImmersionConfig};
use crate::immersion::core::gateway::TranslationGateway;
use crate::immersion::core::lookup::RichDefinitionLookup;
use crate::immersion::document::{block_text, BlockId, BlockRegistry, DocumentTree, ScanState};
use crate::immersion::error::{helpers::log_error, ErrorStats, ImmersionError};
use crate::immersion::matching::MatchEngine;
use crate::immersion::pipeline::batch::{BatchQueue, BatchRequest, BlockTranslation};
use crate::immersion::pipeline::filters::BlockTextFilter;
use crate::immersion::replace::Replacer;
use crate::immersion::vocabulary::{VocabularySnapshot, VocabularyStore};

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Buffering,
    Flushing,
}

/// 调度统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub blocks_added: usize,
    pub blocks_rejected: usize,
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    pub sentences_sent: usize,
    pub blocks_translated: usize,
    pub blocks_reverted: usize,
    pub blocks_errored: usize,
    pub spans_applied: usize,
}

/// 调度器依赖的共享对象
pub struct SchedulerContext<T: DocumentTree> {
    pub tree: Rc<T>,
    pub registry: Rc<RefCell<BlockRegistry<T::Node>>>,
    pub gateway: Rc<dyn TranslationGateway>,
    pub lookup: Option<Rc<dyn RichDefinitionLookup>>,
    pub vocabulary: Arc<VocabularySnapshot>,
}

#[derive(Default)]
struct SchedulerState {
    buffer: Vec<(BlockId, String)>,
    buffer_chars: usize,
    deadline: Option<Instant>,
    queue: BatchQueue,
    is_processing: bool,
    in_flight: Vec<BlockId>,
    last_finished: Option<Instant>,
    next_batch_id: usize,
}

struct SchedulerInner<T: DocumentTree> {
    tree: Rc<T>,
    registry: Rc<RefCell<BlockRegistry<T::Node>>>,
    gateway: Rc<dyn TranslationGateway>,
    lookup: Option<Rc<dyn RichDefinitionLookup>>,
    vocabulary: RefCell<Arc<VocabularySnapshot>>,
    batch: BatchConfig,
    engine: EngineConfig,
    display: DisplayConfig,
    filter: BlockTextFilter,
    replacer: Replacer,
    state: RefCell<SchedulerState>,
    stats: RefCell<SchedulerStats>,
    errors: RefCell<ErrorStats>,
    wake: Notify,
    idle: Notify,
}

/// 最后一个调度器句柄被丢弃时终止工作任务
struct WorkerGuard(JoinHandle<()>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 翻译调度器
///
/// 必须在 `tokio::task::LocalSet` 中创建。所有句柄被丢弃后工作任务随之结束，
/// 尚未完成的块恢复为 `Unscanned`。
pub struct TranslationScheduler<T: DocumentTree + 'static> {
    inner: Rc<SchedulerInner<T>>,
    worker: Rc<WorkerGuard>,
}

impl<T: DocumentTree + 'static> Clone for TranslationScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            worker: self.worker.clone(),
        }
    }
}

impl<T: DocumentTree + 'static> TranslationScheduler<T> {
    /// 按配置创建调度器并启动工作任务
    pub fn spawn(context: SchedulerContext<T>, config: &ImmersionConfig) -> Self {
        let replacer = Replacer::new(MatchEngine::new(&config.matching), &config.display);
        Self::spawn_with_replacer(context, config, replacer)
    }

    /// 使用自定义替换器创建调度器
    pub fn spawn_with_replacer(
        context: SchedulerContext<T>,
        config: &ImmersionConfig,
        replacer: Replacer,
    ) -> Self {
        let inner = Rc::new(SchedulerInner {
            tree: context.tree,
            registry: context.registry,
            gateway: context.gateway,
            lookup: context.lookup,
            vocabulary: RefCell::new(context.vocabulary),
            batch: config.batch.clone(),
            engine: config.engine.clone(),
            display: config.display.clone(),
            filter: BlockTextFilter::new(config.scan.min_block_chars),
            replacer,
            state: RefCell::new(SchedulerState::default()),
            stats: RefCell::new(SchedulerStats::default()),
            errors: RefCell::new(ErrorStats::default()),
            wake: Notify::new(),
            idle: Notify::new(),
        });

        let worker = tokio::task::spawn_local(run_worker(inner.clone()));
        tracing::debug!(
            "翻译调度器已启动: max_items={}, max_chars={}, debounce={}ms",
            config.batch.max_items,
            config.batch.max_chars,
            config.batch.debounce_ms
        );

        Self {
            inner,
            worker: Rc::new(WorkerGuard(worker)),
        }
    }

    /// 加入一个块，返回是否被接受
    pub fn add(&self, node: &T::Node) -> bool {
        let inner = &self.inner;
        let tree = inner.tree.as_ref();
        let text = block_text(tree, node);

        if !inner.filter.is_eligible(&text) {
            inner.stats.borrow_mut().blocks_rejected += 1;
            return false;
        }

        let id = {
            let mut registry = inner.registry.borrow_mut();
            if registry.state_of(tree, node).is_tagged() {
                drop(registry);
                inner.stats.borrow_mut().blocks_rejected += 1;
                return false;
            }
            let id = registry.register(tree, node, &text);
            registry.set_state(tree, id, ScanState::Pending);
            id
        };

        let over_threshold = {
            let mut state = inner.state.borrow_mut();
            state.buffer_chars += text.chars().count();
            state.buffer.push((id, text));
            state.deadline = Some(Instant::now() + inner.batch.debounce());
            inner.over_threshold(&state)
        };
        inner.stats.borrow_mut().blocks_added += 1;

        if over_threshold {
            inner.flush(false);
        }
        inner.wake.notify_one();

        true
    }

    /// 立即把缓冲区全部转为批次
    pub fn flush_now(&self) {
        self.inner.flush(true);
        self.inner.wake.notify_one();
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.inner.phase()
    }

    /// 等待缓冲区、队列和在途批次全部清空
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.phase() == SchedulerPhase::Idle {
                return;
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.stats.borrow().clone()
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.inner.errors.borrow().clone()
    }

    pub fn buffered(&self) -> usize {
        self.inner.state.borrow().buffer.len()
    }

    /// 替换词汇快照，在途批次继续使用旧快照
    pub fn set_vocabulary(&self, vocabulary: Arc<VocabularySnapshot>) {
        *self.inner.vocabulary.borrow_mut() = vocabulary;
    }

    /// 订阅词汇存储的变化
    pub fn follow_store(&self, store: &dyn VocabularyStore) {
        self.set_vocabulary(store.get_all());
        let weak: Weak<SchedulerInner<T>> = Rc::downgrade(&self.inner);
        store.on_change(Box::new(move |snapshot| {
            if let Some(inner) = weak.upgrade() {
                tracing::debug!("词汇表已更新: {} 个条目", snapshot.len());
                *inner.vocabulary.borrow_mut() = snapshot;
            }
        }));
    }
}

impl<T: DocumentTree> SchedulerInner<T> {
    fn over_threshold(&self, state: &SchedulerState) -> bool {
        !state.buffer.is_empty()
            && (state.buffer.len() >= self.batch.max_items
                || state.buffer_chars >= self.batch.max_chars)
    }

    fn phase(&self) -> SchedulerPhase {
        let state = self.state.borrow();
        if state.is_processing || !state.queue.is_empty() {
            SchedulerPhase::Flushing
        } else if !state.buffer.is_empty() {
            SchedulerPhase::Buffering
        } else {
            SchedulerPhase::Idle
        }
    }

    /// 把缓冲区中的块转为批次；`drain_all` 为假时只在超过阈值时继续
    fn flush(&self, drain_all: bool) {
        let mut state = self.state.borrow_mut();

        loop {
            if state.buffer.is_empty() {
                break;
            }
            let take = state.buffer.len().min(self.batch.batch_size.max(1));
            let blocks: Vec<(BlockId, String)> = state.buffer.drain(..take).collect();
            let chars: usize = blocks.iter().map(|(_, text)| text.chars().count()).sum();
            state.buffer_chars = state.buffer_chars.saturating_sub(chars);

            let batch_id = state.next_batch_id;
            state.next_batch_id += 1;
            let batch = BatchRequest::build(batch_id, blocks);
            tracing::debug!(
                "生成批次 {}: {} 个块, {} 个句子",
                batch_id,
                batch.blocks.len(),
                batch.units.len()
            );
            state.queue.enqueue(batch);

            if !drain_all && !self.over_threshold(&state) {
                break;
            }
        }

        if state.buffer.is_empty() {
            state.deadline = None;
        }
    }

    fn take_next_batch(&self) -> Option<BatchRequest> {
        let mut state = self.state.borrow_mut();
        if state.is_processing {
            return None;
        }
        let batch = state.queue.dequeue()?;
        state.is_processing = true;
        state.in_flight = batch.block_ids();
        Some(batch)
    }

    fn finish_batch(&self) {
        let mut state = self.state.borrow_mut();
        state.is_processing = false;
        state.in_flight.clear();
        state.last_finished = Some(Instant::now());
    }

    async fn wait_for_rate_limit(&self) {
        let last = self.state.borrow().last_finished;
        if let Some(last) = last {
            let ready = last + self.batch.inter_batch_delay();
            if ready > Instant::now() {
                sleep_until(ready).await;
            }
        }
    }

    async fn dispatch(&self, batch: BatchRequest) {
        let vocabulary = self.vocabulary.borrow().clone();
        {
            let mut stats = self.stats.borrow_mut();
            stats.batches_dispatched += 1;
            stats.sentences_sent += batch.units.len();
        }

        tracing::debug!(
            "发送批次 {}: {} 个块, {} 个句子, {} 字符",
            batch.id,
            batch.blocks.len(),
            batch.units.len(),
            batch.char_count()
        );

        let result = if batch.is_empty() {
            Ok(String::new())
        } else {
            self.gateway
                .translate(&self.engine, &batch.combined_text(), &self.engine.target_lang)
                .await
        };

        match result {
            Ok(response) => {
                for translation in batch.distribute(&response) {
                    self.apply_block(translation, &vocabulary).await;
                }
            }
            Err(error) => self.fail_batch(&batch, error),
        }
    }

    /// 按取出顺序处理单个块，失败只影响该块的替换
    async fn apply_block(&self, translation: BlockTranslation, vocabulary: &VocabularySnapshot) {
        let tree = self.tree.as_ref();
        let BlockTranslation {
            block_id,
            source_sentences,
            translated_sentences,
        } = translation;

        let node = {
            let mut registry = self.registry.borrow_mut();
            let Some(node) = registry.get(block_id).map(|record| record.node.clone()) else {
                tracing::error!("批次中的块 {} 不在注册表中", block_id);
                return;
            };
            registry.mark_translated(
                tree,
                block_id,
                source_sentences.clone(),
                translated_sentences.clone(),
            );
            node
        };
        self.stats.borrow_mut().blocks_translated += 1;

        if self.display.bilingual {
            let joined = self
                .registry
                .borrow()
                .get(block_id)
                .and_then(|record| record.translated_text.clone())
                .unwrap_or_default();
            if !joined.is_empty() {
                if let Err(e) = tree.insert_companion(&node, block_id, &joined) {
                    self.record_error(&e);
                }
            }
        }

        let outcome = self
            .replacer
            .apply(
                tree,
                &node,
                &source_sentences,
                &translated_sentences,
                vocabulary.entries(),
                self.lookup.as_deref(),
            )
            .await;

        match outcome {
            Ok(outcome) => self.stats.borrow_mut().spans_applied += outcome.spans_applied,
            Err(e) => self.record_error(&e.with_context(format!("块 {}", block_id))),
        }
    }

    fn fail_batch(&self, batch: &BatchRequest, error: ImmersionError) {
        tracing::warn!("批次 {} 翻译失败，{} 个块恢复待重试: {}", batch.id, batch.blocks.len(), error);
        self.errors.borrow_mut().record_error(&error);

        let mut registry = self.registry.borrow_mut();
        let mut stats = self.stats.borrow_mut();
        stats.batches_failed += 1;

        for block_id in batch.block_ids() {
            match registry.mark_failed(self.tree.as_ref(), block_id, self.batch.max_retries) {
                ScanState::Error => stats.blocks_errored += 1,
                _ => stats.blocks_reverted += 1,
            }
        }
    }

    fn record_error(&self, error: &ImmersionError) {
        log_error(error);
        self.errors.borrow_mut().record_error(error);
    }

    /// 在截止时间到达后清空缓冲区
    fn flush_if_due(&self) {
        let due = self
            .state
            .borrow()
            .deadline
            .is_some_and(|deadline| deadline <= Instant::now());
        if due {
            self.flush(true);
        }
    }
}

impl<T: DocumentTree> Drop for SchedulerInner<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let mut pending: Vec<BlockId> = state.buffer.iter().map(|(id, _)| *id).collect();
        pending.extend(state.in_flight.iter().copied());
        while let Some(batch) = state.queue.dequeue() {
            pending.extend(batch.block_ids());
        }

        if pending.is_empty() {
            return;
        }

        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            for id in &pending {
                if registry.state(*id) == Some(ScanState::Pending) {
                    registry.set_state(self.tree.as_ref(), *id, ScanState::Unscanned);
                }
            }
            tracing::debug!("调度器关闭，{} 个未完成的块已恢复", pending.len());
        }
    }
}

/// 工作任务：依次处理批次，空闲时等待截止时间或新的通知
async fn run_worker<T: DocumentTree>(inner: Rc<SchedulerInner<T>>) {
    loop {
        if let Some(batch) = inner.take_next_batch() {
            inner.wait_for_rate_limit().await;
            inner.dispatch(batch).await;
            inner.finish_batch();
            continue;
        }

        let deadline = {
            let state = inner.state.borrow();
            if state.buffer.is_empty() {
                None
            } else {
                state.deadline
            }
        };

        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = sleep_until(deadline) => inner.flush_if_due(),
                    _ = inner.wake.notified() => {}
                }
            }
            None => {
                inner.idle.notify_waiters();
                inner.wake.notified().await;
            }
        }
    }
}
