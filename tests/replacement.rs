//! 端到端的词汇替换测试

use std::rc::Rc;

use tokio::task::LocalSet;

use lexiweave::immersion::core::{CachedLookup, RichDefinition, StaticDefinitionLookup};
use lexiweave::immersion::document::DocumentTree;
use lexiweave::immersion::vocabulary::{LearningCategory, VocabularyEntry};
use lexiweave::immersion::PageSession;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{HtmlTestHelper, MockGateway, TestDataGenerator, TestEnvironment};

#[tokio::test(start_paused = true)]
async fn test_vocabulary_words_replace_matching_phrases() {
    LocalSet::new()
        .run_until(async {
            let gateway = MockGateway::new()
                .with_word("苹果", "apples")
                .with_word("喜欢", "like");
            let env = TestEnvironment::new(
                &HtmlTestHelper::paragraphs(&["我喜欢苹果。他也喜欢。"]),
                gateway,
                TestDataGenerator::fruit_vocabulary(),
            );

            let stats = env.session.run_to_completion().await;
            assert_eq!(stats.spans_applied, 3);

            let block = env.tree.elements_by_tag("p").remove(0);
            assert_eq!(env.tree.text_content(&block), "我likeapple。他也like。");
            assert_eq!(env.tree.elements_by_tag("span").len(), 3);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_definition_without_translation_evidence_is_left_alone() {
    LocalSet::new()
        .run_until(async {
            // 译文中没有出现 apple，因此不能替换"苹果"
            let gateway = MockGateway::new().with_word("苹果", "fruit");
            let env = TestEnvironment::new(
                &HtmlTestHelper::paragraphs(&["我喜欢苹果。"]),
                gateway,
                TestDataGenerator::fruit_vocabulary(),
            );

            let stats = env.session.run_to_completion().await;
            assert_eq!(stats.blocks_translated, 1);
            assert_eq!(stats.spans_applied, 0);
            assert!(env.tree.elements_by_tag("span").is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_markers_carry_entry_metadata() {
    LocalSet::new()
        .run_until(async {
            let vocabulary = vec![VocabularyEntry::new("w-42", "banana", "香蕉")
                .with_category(LearningCategory::Learning)];
            let env = TestEnvironment::new(
                &HtmlTestHelper::paragraphs(&["桌上有香蕉。"]),
                MockGateway::new().with_word("香蕉", "banana"),
                vocabulary,
            );

            env.session.run_to_completion().await;

            let marker = env.tree.elements_by_tag("span").remove(0);
            assert_eq!(env.tree.attr(&marker, "class").as_deref(), Some("lw-word"));
            assert_eq!(env.tree.attr(&marker, "data-lw-entry").as_deref(), Some("w-42"));
            assert_eq!(env.tree.attr(&marker, "data-lw-category").as_deref(), Some("learning"));
            assert_eq!(env.tree.attr(&marker, "data-lw-original").as_deref(), Some("香蕉"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_inline_markup_is_preserved() {
    LocalSet::new()
        .run_until(async {
            let html = "<html><body><p>我<em>非常</em>喜欢苹果。</p></body></html>";
            let env = TestEnvironment::new(
                html,
                MockGateway::new().with_word("苹果", "apples"),
                TestDataGenerator::fruit_vocabulary(),
            );

            env.session.run_to_completion().await;

            let html = env.html();
            assert!(html.contains("<em>非常</em>"));
            assert!(html.contains(">apple</span>"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_bilingual_companion_follows_block() {
    LocalSet::new()
        .run_until(async {
            let mut config = TestDataGenerator::fast_config();
            config.display.bilingual = true;
            let env = TestEnvironment::with_config(
                &HtmlTestHelper::paragraphs(&["我喜欢苹果。"]),
                MockGateway::new().with_word("我喜欢苹果", "I like apples"),
                TestDataGenerator::fruit_vocabulary(),
                config,
            );

            env.session.run_to_completion().await;

            let companion = env.tree.elements_by_tag("div").remove(0);
            assert_eq!(env.tree.attr(&companion, "class").as_deref(), Some("lw-bilingual"));
            assert_eq!(env.tree.text_content(&companion), "I like apples。");

            // 译文块不会被再次扫描
            assert_eq!(env.session.scan_now(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_vocabulary_updates_apply_to_later_batches() {
    LocalSet::new()
        .run_until(async {
            let env = TestEnvironment::new(
                &HtmlTestHelper::paragraphs(&["我买了香蕉。"]),
                MockGateway::new().with_word("香蕉", "bananas"),
                vec![VocabularyEntry::new("apple", "apple", "苹果")],
            );

            env.store
                .upsert(VocabularyEntry::new("banana", "banana", "香蕉"))
                .expect("upsert");
            env.session.run_to_completion().await;

            assert!(env.html().contains(">banana</span>"));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_aggressive_matching_uses_dictionary_definitions() {
    LocalSet::new()
        .run_until(async {
            let mut config = TestDataGenerator::fast_config();
            config.matching.aggressive = true;

            let tree = HtmlTestHelper::tree(&HtmlTestHelper::paragraphs(&["项目的截止日期是明天。"]));
            let gateway = Rc::new(MockGateway::new().with_word("项目的截止日期", "The project deadline"));
            let store = TestDataGenerator::store(vec![VocabularyEntry::new(
                "deadline",
                "deadline",
                "最后期限",
            )]);
            let dictionary = StaticDefinitionLookup::new().with(
                "deadline",
                RichDefinition {
                    meanings: vec!["n. 截止日期".to_string()],
                    ..Default::default()
                },
            );
            let lookup = Rc::new(CachedLookup::new(dictionary, 16));

            let session = PageSession::new(tree.clone(), config, gateway, &store, Some(lookup.clone()))
                .expect("session");
            let stats = session.run_to_completion().await;

            assert_eq!(stats.spans_applied, 1);
            let block = tree.elements_by_tag("p").remove(0);
            assert_eq!(tree.text_content(&block), "项目的deadline是明天。");
            assert_eq!(lookup.inner().calls(), 1);
        })
        .await;
}
