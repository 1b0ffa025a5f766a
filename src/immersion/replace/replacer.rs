//! 替换器
//!
//! 先完成全部异步匹配（唯一的挂起点是词典查询），再同步读取块的当前文本、
//! 计算区间并修改文档。读取和修改之间没有挂起点，偏移不会过期。

use std::collections::BTreeMap;

use super::spans::{build_fragments, flatten_leaves, resolve_overlaps, ReplacementSpan};
use crate::immersion::config::DisplayConfig;
use crate::immersion::core::lookup::RichDefinitionLookup;
use crate::immersion::document::{
    block_text_leaves, DocumentTree, MarkerPresentation, ReplacementMarker,
};
use crate::immersion::error::{helpers::log_error, ImmersionError, ImmersionResult};
use crate::immersion::matching::{find_occurrences, MatchEngine, PhraseMatch};
use crate::immersion::vocabulary::VocabularyEntry;

/// 一次替换的结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub matches_found: usize,
    pub spans_applied: usize,
    /// 无法在当前文本中定位的句子
    pub sentences_skipped: usize,
    /// 因重叠、跨节点或修改失败而放弃的区间
    pub spans_dropped: usize,
}

/// 替换器
#[derive(Clone, Default)]
pub struct Replacer {
    engine: MatchEngine,
    presentation: MarkerPresentation,
}

impl Replacer {
    pub fn new(engine: MatchEngine, display: &DisplayConfig) -> Self {
        Self {
            engine,
            presentation: MarkerPresentation {
                mode: display.mode,
                show_original: display.show_original,
            },
        }
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.engine
    }

    /// 对一个块执行匹配和替换
    pub async fn apply<T: DocumentTree>(
        &self,
        tree: &T,
        block: &T::Node,
        source_sentences: &[String],
        translated_sentences: &[String],
        vocabulary: &[VocabularyEntry],
        lookup: Option<&dyn RichDefinitionLookup>,
    ) -> ImmersionResult<ReplaceOutcome> {
        let mut outcome = ReplaceOutcome::default();

        // 1. 异步匹配
        let mut per_sentence: Vec<Vec<PhraseMatch>> = Vec::with_capacity(source_sentences.len());
        for (index, sentence) in source_sentences.iter().enumerate() {
            let translation = translated_sentences
                .get(index)
                .map(String::as_str)
                .unwrap_or("");
            let matches = if translation.trim().is_empty() {
                Vec::new()
            } else {
                self.engine
                    .match_sentence(sentence, translation, vocabulary, lookup)
                    .await
            };
            outcome.matches_found += matches.len();
            per_sentence.push(matches);
        }

        if outcome.matches_found == 0 {
            return Ok(outcome);
        }

        // 2. 读取当前文本（此后不再挂起）
        let (flat, leaves) = flatten_leaves(tree, block_text_leaves(tree, block));

        // 3-4. 定位句子并生成区间
        let mut spans = Vec::new();
        let mut cursor = 0;
        let mut order = 0;
        for (sentence, matches) in source_sentences.iter().zip(&per_sentence) {
            let needle = sentence.trim();
            if needle.is_empty() {
                continue;
            }

            let Some(found) = flat[cursor..].find(needle) else {
                outcome.sentences_skipped += 1;
                log_error(&ImmersionError::OffsetDrift(format!(
                    "句子无法定位: {}",
                    needle.chars().take(20).collect::<String>()
                )));
                continue;
            };
            let start = cursor + found;
            let end = start + needle.len();
            cursor = end;

            for phrase in matches {
                for offset in find_occurrences(&flat[start..end], &phrase.text) {
                    spans.push(ReplacementSpan {
                        start: start + offset,
                        end: start + offset + phrase.text.len(),
                        text: phrase.text.clone(),
                        entry: phrase.entry.clone(),
                        order,
                    });
                    order += 1;
                }
            }
        }

        // 5. 冲突消解
        let (kept, dropped) = resolve_overlaps(spans);
        outcome.spans_dropped += dropped;

        // 6. 按文本节点分组
        let mut per_leaf: BTreeMap<usize, Vec<(std::ops::Range<usize>, ReplacementMarker)>> =
            BTreeMap::new();
        for span in kept {
            let owner = leaves
                .iter()
                .position(|leaf| leaf.range.start <= span.start && span.end <= leaf.range.end);
            let Some(leaf_index) = owner else {
                // 跨越节点边界
                outcome.spans_dropped += 1;
                continue;
            };

            let leaf_start = leaves[leaf_index].range.start;
            per_leaf.entry(leaf_index).or_default().push((
                span.start - leaf_start..span.end - leaf_start,
                self.marker_for(&span),
            ));
        }

        for (leaf_index, local_spans) in per_leaf {
            let leaf = &leaves[leaf_index];
            let text = &flat[leaf.range.clone()];
            let count = local_spans.len();

            match tree.replace_text(&leaf.node, build_fragments(text, &local_spans)) {
                Ok(()) => outcome.spans_applied += count,
                Err(e) => {
                    log_error(&e);
                    outcome.spans_dropped += count;
                }
            }
        }

        tracing::debug!(
            "替换完成: 匹配 {} 个, 应用 {} 个, 放弃 {} 个, 跳过句子 {} 个",
            outcome.matches_found,
            outcome.spans_applied,
            outcome.spans_dropped,
            outcome.sentences_skipped
        );

        Ok(outcome)
    }

    fn marker_for(&self, span: &ReplacementSpan) -> ReplacementMarker {
        ReplacementMarker {
            original: span.text.clone(),
            word: span.entry.text.clone(),
            entry_id: span.entry.id.clone(),
            category: span.entry.category.as_str().to_string(),
            presentation: self.presentation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immersion::config::DisplayMode;
    use crate::immersion::document::RcDomTree;
    use crate::immersion::pipeline::splitter;

    fn vocabulary() -> Vec<VocabularyEntry> {
        vec![
            VocabularyEntry::new("apple", "apple", "苹果"),
            VocabularyEntry::new("pie", "pie", "苹果派"),
            VocabularyEntry::new("like", "like", "喜欢"),
        ]
    }

    async fn run(html: &str, translations: &[&str], vocab: &[VocabularyEntry]) -> (RcDomTree, ReplaceOutcome) {
        let tree = RcDomTree::parse(html).expect("parse");
        let block = tree.elements_by_tag("p").remove(0);
        let source = splitter::split(&crate::immersion::document::block_text(&tree, &block));
        let translated: Vec<String> = translations.iter().map(|s| s.to_string()).collect();

        let outcome = Replacer::default()
            .apply(&tree, &block, &source, &translated, vocab, None)
            .await
            .expect("apply");
        (tree, outcome)
    }

    #[tokio::test]
    async fn test_replaces_match_and_preserves_surrounding_text() {
        let (tree, outcome) = run("<p>我喜欢苹果。</p>", &["I like apples."], &vocabulary()[..1]).await;
        assert_eq!(outcome.spans_applied, 1);

        let p = tree.elements_by_tag("p").remove(0);
        assert_eq!(tree.text_content(&p), "我喜欢apple。");
        let html = tree.to_html().expect("serialize");
        assert!(html.contains(r#"data-lw-original="苹果""#));
    }

    #[tokio::test]
    async fn test_overlapping_matches_apply_once() {
        // "苹果" 与 "苹果派" 重叠，"喜欢" 不重叠
        let (tree, outcome) = run("<p>我喜欢苹果派</p>", &["I like apple pie"], &vocabulary()).await;
        assert_eq!(outcome.spans_applied, 2);
        assert_eq!(outcome.spans_dropped, 1);

        let markers = tree.elements_by_tag("span");
        assert_eq!(markers.len(), 2);
        let p = tree.elements_by_tag("p").remove(0);
        assert_eq!(tree.text_content(&p), "我likepie");
    }

    #[tokio::test]
    async fn test_all_occurrences_within_sentence() {
        let (tree, outcome) = run("<p>苹果和苹果。</p>", &["apple and apple."], &vocabulary()[..1]).await;
        assert_eq!(outcome.spans_applied, 2);
        assert_eq!(tree.elements_by_tag("span").len(), 2);
    }

    #[tokio::test]
    async fn test_span_crossing_leaf_boundary_is_dropped() {
        let (tree, outcome) = run("<p>我喜欢苹<b>果</b>。</p>", &["I like apples."], &vocabulary()[..1]).await;
        assert_eq!(outcome.spans_applied, 0);
        assert_eq!(outcome.spans_dropped, 1);
        assert!(tree.elements_by_tag("span").is_empty());
    }

    #[tokio::test]
    async fn test_unlocatable_sentence_is_skipped() {
        let tree = RcDomTree::parse("<p>我喜欢苹果。我也喜欢苹果派。</p>").expect("parse");
        let block = tree.elements_by_tag("p").remove(0);
        // 第一句已被页面改写
        let source = vec!["已经不存在的句子。".to_string(), "我也喜欢苹果派。".to_string()];
        let translated = vec!["Gone apple.".to_string(), "I also like apple pie.".to_string()];

        let outcome = Replacer::default()
            .apply(&tree, &block, &source, &translated, &vocabulary()[..1], None)
            .await
            .expect("apply");
        assert_eq!(outcome.sentences_skipped, 1);
        assert_eq!(outcome.spans_applied, 1);
        assert_eq!(tree.text_content(&block), "我喜欢苹果。我也喜欢apple派。");
    }

    #[tokio::test]
    async fn test_annotate_mode_keeps_original_text() {
        let tree = RcDomTree::parse("<p>我喜欢苹果。</p>").expect("parse");
        let block = tree.elements_by_tag("p").remove(0);
        let display = DisplayConfig {
            mode: DisplayMode::Annotate,
            ..Default::default()
        };
        let replacer = Replacer::new(MatchEngine::default(), &display);

        replacer
            .apply(
                &tree,
                &block,
                &["我喜欢苹果。".to_string()],
                &["I like apples.".to_string()],
                &vocabulary()[..1],
                None,
            )
            .await
            .expect("apply");

        assert_eq!(tree.text_content(&block), "我喜欢苹果。");
        let marker = tree.elements_by_tag("span").remove(0);
        assert_eq!(tree.attr(&marker, "data-lw-word").as_deref(), Some("apple"));
        assert_eq!(tree.attr(&marker, "data-lw-display").as_deref(), Some("annotate"));
    }
}
