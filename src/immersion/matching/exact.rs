//! 第一阶段：释义精确匹配
//!
//! 只有原词（或其词形）出现在译文中的词汇才参与匹配，然后在原句中查找
//! 该词汇的每一个释义词。

use std::collections::HashSet;

use super::{MatchKind, PhraseMatch};
use crate::immersion::vocabulary::VocabularyEntry;

/// 在原句中查找词汇释义
///
/// 同一个匹配文本只保留最先遇到的词汇条目。
pub fn find_fuzzy_matches(
    sentence: &str,
    vocabulary: &[VocabularyEntry],
    translated_sentence: &str,
) -> Vec<PhraseMatch> {
    let translated_lower = translated_sentence.to_lowercase();
    let mut seen: HashSet<String> = HashSet::new();
    let mut matches = Vec::new();

    if sentence.trim().is_empty() || translated_lower.trim().is_empty() {
        return matches;
    }

    for entry in vocabulary
        .iter()
        .filter(|entry| entry.appears_in(&translated_lower))
    {
        for term in entry.definition_terms() {
            if !sentence.contains(term) || seen.contains(term) {
                continue;
            }
            seen.insert(term.to_string());
            matches.push(PhraseMatch {
                text: term.to_string(),
                entry: entry.clone(),
                kind: MatchKind::Exact,
            });
        }
    }

    matches
}

/// 子串在文本中的全部出现位置（字节偏移，不重叠）
pub fn find_occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    haystack.match_indices(needle).map(|(i, _)| i).collect()
}
