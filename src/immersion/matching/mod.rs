//! 两阶段词汇匹配
//!
//! - `exact`: 第一阶段，译文佐证 + 释义字面匹配
//! - `aggressive`: 第二阶段，分词组合 + 相似度（需要词典查询，默认关闭）
//! - `similarity`: 相似度函数
//! - `segmenter`: 分词器

pub mod aggressive;
pub mod exact;
pub mod segmenter;
pub mod similarity;

use std::rc::Rc;

pub use aggressive::{find_aggressive_matches, AggressiveOptions};
pub use exact::{find_fuzzy_matches, find_occurrences};
pub use segmenter::{DefaultSegmenter, JiebaSegmenter, WordSegmenter};
pub use similarity::calculate_similarity;

use crate::immersion::config::MatchingConfig;
use crate::immersion::core::lookup::RichDefinitionLookup;
use crate::immersion::error::helpers::log_error;
use crate::immersion::vocabulary::VocabularyEntry;

/// 匹配来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    /// 激进匹配及其得分
    Aggressive(f32),
}

/// 一个匹配结果：原句中的子串及对应的词汇
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseMatch {
    pub text: String,
    pub entry: VocabularyEntry,
    pub kind: MatchKind,
}

/// 匹配引擎
#[derive(Clone)]
pub struct MatchEngine {
    aggressive: bool,
    options: AggressiveOptions,
    segmenter: Rc<dyn WordSegmenter>,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl MatchEngine {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            aggressive: config.aggressive,
            options: AggressiveOptions {
                threshold: config.similarity_threshold,
                max_window: config.max_window,
            },
            segmenter: Rc::new(DefaultSegmenter),
        }
    }

    pub fn with_segmenter(mut self, segmenter: Rc<dyn WordSegmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn with_aggressive(mut self, aggressive: bool) -> Self {
        self.aggressive = aggressive;
        self
    }

    pub fn is_aggressive(&self) -> bool {
        self.aggressive
    }

    /// 对一个句子执行两阶段匹配
    ///
    /// 词典查询失败只跳过对应词汇。
    pub async fn match_sentence(
        &self,
        sentence: &str,
        translation: &str,
        vocabulary: &[VocabularyEntry],
        lookup: Option<&dyn RichDefinitionLookup>,
    ) -> Vec<PhraseMatch> {
        let mut matches = find_fuzzy_matches(sentence, vocabulary, translation);

        if !self.aggressive || translation.trim().is_empty() {
            return matches;
        }

        let translated_lower = translation.to_lowercase();
        let unmatched: Vec<&VocabularyEntry> = vocabulary
            .iter()
            .filter(|entry| entry.appears_in(&translated_lower))
            .filter(|entry| !matches.iter().any(|m| m.entry.id == entry.id))
            .collect();

        for entry in unmatched {
            let rich = match lookup {
                Some(lookup) => match lookup.lookup(&entry.text).await {
                    Ok(rich) => Some(rich),
                    Err(e) => {
                        log_error(&e.with_context(&entry.text));
                        continue;
                    }
                },
                None => None,
            };

            let found = find_aggressive_matches(
                sentence,
                entry,
                rich.as_ref(),
                self.segmenter.as_ref(),
                &self.options,
            );
            if let Some(found) = found {
                if !matches.iter().any(|m| m.text == found.text) {
                    matches.push(found);
                }
            }
        }

        matches
    }
}
