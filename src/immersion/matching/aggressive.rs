//! 第二阶段：激进匹配
//!
//! 第一阶段没能在原句中找到释义、但原词确实出现在译文里的词汇，
//! 用详细释义和原句的分词组合做相似度比较，最多返回一个最佳结果。

use std::sync::OnceLock;

use regex::Regex;

use super::segmenter::{is_word_unit, WordSegmenter};
use super::similarity::{calculate_similarity, STOP_WORDS};
use super::{MatchKind, PhraseMatch};
use crate::immersion::config::constants;
use crate::immersion::core::lookup::RichDefinition;
use crate::immersion::pipeline::filters::contains_cjk;
use crate::immersion::vocabulary::{split_definitions, VocabularyEntry};

/// 激进匹配参数
#[derive(Debug, Clone, PartialEq)]
pub struct AggressiveOptions {
    pub threshold: f32,
    /// 最多把几个相邻词语组合成候选
    pub max_window: usize,
}

impl Default for AggressiveOptions {
    fn default() -> Self {
        Self {
            threshold: constants::AGGRESSIVE_THRESHOLD,
            max_window: constants::AGGRESSIVE_MAX_WINDOW,
        }
    }
}

/// 词性前缀，例如 "n." "vt." "adj."
fn pos_prefix_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[A-Za-z]{1,5}\.\s*)+").ok())
        .as_ref()
}

/// 括号中的注释
fn bracket_note_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[（(\[【<《〈][^）)\]】>》〉]*[）)\]】>》〉]").ok())
        .as_ref()
}

/// 清理单个释义字符串
pub fn clean_definition(raw: &str) -> String {
    let mut text = raw.to_string();
    if let Some(re) = bracket_note_regex() {
        text = re.replace_all(&text, "").into_owned();
    }
    if let Some(re) = pos_prefix_regex() {
        text = re.replace(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// 收集词汇的全部中文释义候选
pub fn collect_definitions(entry: &VocabularyEntry, rich: Option<&RichDefinition>) -> Vec<String> {
    let own = std::iter::once(entry.definitions.as_str())
        .chain(entry.synonyms.iter().map(String::as_str))
        .chain(entry.phrases.iter().map(|p| p.translation.as_str()));
    let fetched = rich.into_iter().flat_map(|r| r.definition_strings());

    let mut definitions: Vec<String> = Vec::new();
    for raw in own.chain(fetched) {
        // 先去掉整段的词性前缀和括号注释，再按分隔符拆分
        let cleaned = clean_definition(raw);
        for piece in split_definitions(&cleaned) {
            let piece = clean_definition(piece);
            if contains_cjk(&piece) && !definitions.contains(&piece) {
                definitions.push(piece);
            }
        }
    }

    definitions
}

/// 由分词结果生成候选子串：单个词语以及相邻 2 到 `max_window` 个词语的组合
///
/// 标点单元会断开组合；候选必须是原句的子串。
pub fn candidate_substrings(
    sentence: &str,
    segmenter: &dyn WordSegmenter,
    max_window: usize,
) -> Vec<String> {
    let units = segmenter.segment(sentence);
    let mut candidates: Vec<String> = Vec::new();

    for run in units.split(|unit| !is_word_unit(unit)) {
        for window in 1..=max_window.max(1) {
            for group in run.windows(window) {
                if starts_or_ends_with_stop_word(group) {
                    continue;
                }
                let candidate = group.concat();
                if contains_cjk(&candidate)
                    && sentence.contains(&candidate)
                    && !candidates.contains(&candidate)
                {
                    candidates.push(candidate);
                }
            }
        }
    }

    candidates
}

/// 停用词只能出现在组合内部，否则同分时更长的组合会把它们一起替换掉
fn starts_or_ends_with_stop_word(group: &[String]) -> bool {
    let is_stop = |unit: Option<&String>| unit.is_some_and(|u| STOP_WORDS.contains(&u.as_str()));
    is_stop(group.first()) || is_stop(group.last())
}

/// 激进匹配：返回得分最高（同分取更长子串）的一个结果
pub fn find_aggressive_matches(
    sentence: &str,
    entry: &VocabularyEntry,
    rich: Option<&RichDefinition>,
    segmenter: &dyn WordSegmenter,
    options: &AggressiveOptions,
) -> Option<PhraseMatch> {
    let definitions = collect_definitions(entry, rich);
    if definitions.is_empty() {
        return None;
    }

    let candidates = candidate_substrings(sentence, segmenter, options.max_window);

    let mut best: Option<(String, f32)> = None;
    for candidate in candidates {
        let score = definitions
            .iter()
            .map(|definition| calculate_similarity(&candidate, definition))
            .fold(0.0_f32, f32::max);

        if score < options.threshold {
            continue;
        }

        let better = match &best {
            None => true,
            Some((current, current_score)) => {
                score > *current_score
                    || (score == *current_score
                        && candidate.chars().count() > current.chars().count())
            }
        };
        if better {
            best = Some((candidate, score));
        }
    }

    best.map(|(text, score)| {
        tracing::debug!("激进匹配 {} -> {} (得分 {:.2})", entry.text, text, score);
        PhraseMatch {
            text,
            entry: entry.clone(),
            kind: MatchKind::Aggressive(score),
        }
    })
}
