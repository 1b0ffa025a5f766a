//! 翻译调度集成测试
//!
//! 时间相关的测试都在暂停的时钟上运行，计时器会在运行时空闲时自动推进。

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tokio::task::LocalSet;
use tokio::time::sleep;

use lexiweave::immersion::config::ImmersionConfig;
use lexiweave::immersion::document::{BlockRegistry, DocumentTree, RcDomTree, ScanState};
use lexiweave::immersion::pipeline::scheduler::{
    SchedulerContext, SchedulerPhase, TranslationScheduler,
};
use lexiweave::immersion::vocabulary::VocabularySnapshot;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{HtmlTestHelper, MockGateway, TestDataGenerator, TestEnvironment};

struct Fixture {
    tree: Rc<RcDomTree>,
    registry: Rc<RefCell<BlockRegistry<Handle>>>,
    gateway: Rc<MockGateway>,
    scheduler: TranslationScheduler<RcDomTree>,
    blocks: Vec<Handle>,
}

/// 必须在 LocalSet 中调用
fn fixture(texts: &[&str], gateway: MockGateway, config: ImmersionConfig) -> Fixture {
    let tree = HtmlTestHelper::tree(&HtmlTestHelper::paragraphs(texts));
    let registry = Rc::new(RefCell::new(BlockRegistry::new()));
    let gateway = Rc::new(gateway);
    let scheduler = TranslationScheduler::spawn(
        SchedulerContext {
            tree: tree.clone(),
            registry: registry.clone(),
            gateway: gateway.clone(),
            lookup: None,
            vocabulary: Arc::new(VocabularySnapshot::default()),
        },
        &config,
    );
    let blocks = tree.elements_by_tag("p");

    Fixture {
        tree,
        registry,
        gateway,
        scheduler,
        blocks,
    }
}

fn state(fixture: &Fixture, block: &Handle) -> Option<String> {
    fixture.tree.attr(block, "data-lw-state")
}

#[tokio::test(start_paused = true)]
async fn test_small_buffer_waits_for_debounce() {
    LocalSet::new()
        .run_until(async {
            let f = fixture(
                &["第一段。", "第二段。", "第三段。", "第四段。"],
                MockGateway::new(),
                ImmersionConfig::default(),
            );
            for block in &f.blocks {
                assert!(f.scheduler.add(block));
            }

            sleep(Duration::from_millis(399)).await;
            assert_eq!(f.gateway.calls(), 0);
            assert_eq!(f.scheduler.phase(), SchedulerPhase::Buffering);

            sleep(Duration::from_millis(2)).await;
            assert_eq!(f.gateway.calls(), 1);

            f.scheduler.idle().await;
            assert_eq!(f.scheduler.stats().blocks_translated, 4);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_fifth_block_flushes_immediately() {
    LocalSet::new()
        .run_until(async {
            let f = fixture(
                &["一。", "二。", "三。", "四。", "五。"],
                MockGateway::new(),
                ImmersionConfig::default(),
            );
            for block in &f.blocks {
                f.scheduler.add(block);
            }

            sleep(Duration::from_millis(1)).await;
            assert_eq!(f.gateway.calls(), 1);
            let request = &f.gateway.requests()[0];
            assert_eq!(request.split("@@@").count(), 5);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_char_threshold_flushes_immediately() {
    LocalSet::new()
        .run_until(async {
            let mut config = ImmersionConfig::default();
            config.batch.max_chars = 20;
            let long = "这是一个相当长的段落，它的字数已经超过了二十个字符的限制。";
            let f = fixture(&[long], MockGateway::new(), config);

            f.scheduler.add(&f.blocks[0]);
            sleep(Duration::from_millis(1)).await;
            assert_eq!(f.gateway.calls(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_batches_are_sequential_and_spaced() {
    LocalSet::new()
        .run_until(async {
            let mut config = ImmersionConfig::default();
            config.batch.max_items = 1;
            let f = fixture(
                &["甲段落。", "乙段落。", "丙段落。"],
                MockGateway::new().with_latency(Duration::from_millis(50)),
                config,
            );
            for block in &f.blocks {
                f.scheduler.add(block);
            }
            assert_eq!(f.scheduler.phase(), SchedulerPhase::Flushing);

            f.scheduler.idle().await;

            assert_eq!(f.gateway.max_in_flight(), 1);
            let requests = f.gateway.requests();
            assert_eq!(requests, vec!["甲段落。", "乙段落。", "丙段落。"]);

            let times = f.gateway.request_times();
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] >= Duration::from_millis(150));
            }
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_blocks_added_during_flight_are_processed_later() {
    LocalSet::new()
        .run_until(async {
            let mut config = ImmersionConfig::default();
            config.batch.max_items = 1;
            let f = fixture(
                &["先到的段落。", "后到的段落。"],
                MockGateway::new().with_latency(Duration::from_millis(200)),
                config,
            );

            f.scheduler.add(&f.blocks[0]);
            sleep(Duration::from_millis(50)).await;
            assert_eq!(f.gateway.calls(), 1);

            assert!(f.scheduler.add(&f.blocks[1]));
            f.scheduler.idle().await;

            assert_eq!(f.gateway.calls(), 2);
            assert_eq!(state(&f, &f.blocks[1]).as_deref(), Some("translated"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_leaves_nothing_pending() {
    LocalSet::new()
        .run_until(async {
            let gateway = MockGateway::new();
            gateway.fail_next(1);
            let f = fixture(&["失败一。", "失败二。"], gateway, ImmersionConfig::default());
            for block in &f.blocks {
                f.scheduler.add(block);
            }

            f.scheduler.idle().await;

            assert_eq!(f.registry.borrow().count_in(ScanState::Pending), 0);
            assert_eq!(state(&f, &f.blocks[0]), None);
            assert_eq!(state(&f, &f.blocks[1]), None);
            assert_eq!(f.scheduler.stats().blocks_reverted, 2);
            assert_eq!(f.scheduler.error_stats().total_errors, 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_response_is_not_a_failure() {
    LocalSet::new()
        .run_until(async {
            let gateway = MockGateway::new();
            gateway.push_reply(common::MockReply::Text("only one part".to_string()));
            let f = fixture(&["第一句。第二句。"], gateway, ImmersionConfig::default());

            f.scheduler.add(&f.blocks[0]);
            f.scheduler.idle().await;

            assert_eq!(state(&f, &f.blocks[0]).as_deref(), Some("translated"));
            let registry = f.registry.borrow();
            let record = registry.iter().next().expect("record");
            assert_eq!(record.translated_sentences, vec!["only one part".to_string(), String::new()]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_pending_blocks_revert_when_runtime_stops() {
    let local = LocalSet::new();
    let tree = HtmlTestHelper::tree(&HtmlTestHelper::paragraphs(&["等待中的段落。"]));
    let block = tree.elements_by_tag("p").remove(0);

    local
        .run_until(async {
            let scheduler = TranslationScheduler::spawn(
                SchedulerContext {
                    tree: tree.clone(),
                    registry: Rc::new(RefCell::new(BlockRegistry::new())),
                    gateway: Rc::new(MockGateway::new()),
                    lookup: None,
                    vocabulary: Arc::new(VocabularySnapshot::default()),
                },
                &ImmersionConfig::default(),
            );
            scheduler.add(&block);
            assert_eq!(tree.attr(&block, "data-lw-state").as_deref(), Some("pending"));
        })
        .await;

    drop(local);
    assert_eq!(tree.attr(&block, "data-lw-state"), None);
}

#[tokio::test(start_paused = true)]
async fn test_retry_escalates_to_error_then_manual_retry_recovers() {
    LocalSet::new()
        .run_until(async {
            let gateway = MockGateway::new().with_word("苹果", "apple");
            gateway.fail_next(3);
            let env = TestEnvironment::new(
                &HtmlTestHelper::paragraphs(&["我喜欢苹果。"]),
                gateway,
                TestDataGenerator::fruit_vocabulary(),
            );
            let block = env.tree.elements_by_tag("p").remove(0);

            env.session.run_to_completion().await;
            assert_eq!(env.tree.attr(&block, "data-lw-state"), None);

            // 页面变化触发重新扫描，第一次重试仍然失败
            env.session.notify_mutation();
            env.session.settle().await;
            assert_eq!(env.tree.attr(&block, "data-lw-state"), None);

            // 两次重试都失败后达到上限
            env.session.notify_mutation();
            env.session.settle().await;
            assert_eq!(env.tree.attr(&block, "data-lw-state").as_deref(), Some("error"));

            // 错误状态的块不会被自动重新扫描
            env.session.notify_mutation();
            env.session.settle().await;
            assert_eq!(env.gateway.calls(), 3);

            assert_eq!(env.session.retry_failed(), 1);
            env.session.settle().await;
            assert_eq!(env.tree.attr(&block, "data-lw-state").as_deref(), Some("translated"));
            assert!(env.html().contains(">apple</span>"));
        })
        .await;
}
