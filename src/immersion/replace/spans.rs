//! 替换区间与冲突消解

use std::ops::Range;

use crate::immersion::document::{DocumentTree, Fragment, ReplacementMarker};
use crate::immersion::vocabulary::VocabularyEntry;

/// 块展平文本上的替换区间 `[start, end)`（字节偏移）
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementSpan {
    pub start: usize,
    pub end: usize,
    /// 被匹配的原文
    pub text: String,
    pub entry: VocabularyEntry,
    /// 生成顺序，用于同位置时的取舍
    pub order: usize,
}

impl ReplacementSpan {
    pub fn overlaps(&self, other: &ReplacementSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// 去掉重叠区间，返回按起点升序排列的保留区间和被丢弃的数量
///
/// 从最右侧的区间开始向左贪心保留：只有结束位置不超过上一个保留区间起点的
/// 区间才会被保留；起点相同时生成较晚的区间优先。
pub fn resolve_overlaps(mut spans: Vec<ReplacementSpan>) -> (Vec<ReplacementSpan>, usize) {
    spans.sort_by(|a, b| b.start.cmp(&a.start).then(b.order.cmp(&a.order)));

    let total = spans.len();
    let mut kept: Vec<ReplacementSpan> = Vec::with_capacity(total);
    for span in spans {
        let fits = kept.last().map_or(true, |last| span.end <= last.start);
        if fits && span.start < span.end {
            kept.push(span);
        }
    }

    let dropped = total - kept.len();
    kept.reverse();
    (kept, dropped)
}

/// 展平后的文本节点
#[derive(Debug, Clone)]
pub struct TextLeaf<N> {
    pub node: N,
    pub range: Range<usize>,
}

/// 展平块的文本节点，返回拼接文本和各节点的区间
pub fn flatten_leaves<T: DocumentTree>(tree: &T, leaves: Vec<T::Node>) -> (String, Vec<TextLeaf<T::Node>>) {
    let mut flat = String::new();
    let mut out = Vec::with_capacity(leaves.len());

    for node in leaves {
        let text = tree.text(&node).unwrap_or_default();
        let start = flat.len();
        flat.push_str(&text);
        out.push(TextLeaf {
            node,
            range: start..flat.len(),
        });
    }

    (flat, out)
}

/// 把一个文本节点拆分为 `[文本, 标记, 文本, ...]`
///
/// `spans` 为节点内的局部区间，按起点升序且互不重叠。
pub fn build_fragments(text: &str, spans: &[(Range<usize>, ReplacementMarker)]) -> Vec<Fragment> {
    let mut fragments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;

    for (range, marker) in spans {
        if range.start > cursor {
            fragments.push(Fragment::Text(text[cursor..range.start].to_string()));
        }
        fragments.push(Fragment::Marker(marker.clone()));
        cursor = range.end;
    }

    if cursor < text.len() {
        fragments.push(Fragment::Text(text[cursor..].to_string()));
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immersion::document::MarkerPresentation;

    fn span(start: usize, end: usize, order: usize) -> ReplacementSpan {
        ReplacementSpan {
            start,
            end,
            text: format!("{}..{}", start, end),
            entry: VocabularyEntry::new(order.to_string(), "w", "词"),
            order,
        }
    }

    #[test]
    fn test_overlapping_pair_keeps_exactly_one() {
        let (kept, dropped) = resolve_overlaps(vec![span(0, 6, 0), span(3, 9, 1)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 1);
        // 起点更靠右的区间优先
        assert_eq!(kept[0].start, 3);
    }

    #[test]
    fn test_same_start_prefers_later_order() {
        let (kept, _) = resolve_overlaps(vec![span(0, 6, 0), span(0, 9, 1)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].order, 1);
    }

    #[test]
    fn test_adjacent_spans_both_survive() {
        let (kept, dropped) = resolve_overlaps(vec![span(6, 9, 1), span(0, 6, 0), span(12, 15, 2)]);
        assert_eq!(dropped, 0);
        let starts: Vec<usize> = kept.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 6, 12]);
    }

    #[test]
    fn test_kept_spans_never_overlap() {
        let spans: Vec<ReplacementSpan> = (0..20).map(|i| span(i * 2, i * 2 + 5, i)).collect();
        let (kept, _) = resolve_overlaps(spans);
        for pair in kept.windows(2) {
            assert!(!pair[0].overlaps(&pair[1]));
        }
    }

    #[test]
    fn test_build_fragments_preserves_outside_text() {
        let marker = ReplacementMarker {
            original: "苹果".to_string(),
            word: "apple".to_string(),
            entry_id: "a".to_string(),
            category: "new".to_string(),
            presentation: MarkerPresentation::default(),
        };
        let text = "我喜欢苹果派";
        let fragments = build_fragments(text, &[(9..15, marker)]);
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], Fragment::Text("我喜欢".to_string()));
        assert_eq!(fragments[2], Fragment::Text("派".to_string()));
    }
}
