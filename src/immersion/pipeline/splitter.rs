//! 句子切分器
//!
//! 把块文本切分为翻译单元。切分是无损的：所有句子按顺序拼接后与输入完全一致，
//! 因此句子的字节区间可以直接用于后续的偏移计算。

use std::ops::Range;

/// 句末标点（换行也视为句子边界）
const TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?', '\n'];

/// 紧跟在句末标点后、仍属于本句的闭合符号
const CLOSERS: &[char] = &[
    '"', '\'', '”', '’', '」', '』', '）', ')', ']', '】', '》',
];

/// 句子切分器
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceSplitter;

impl SentenceSplitter {
    pub fn new() -> Self {
        Self
    }

    /// 切分为句子字符串
    pub fn split(&self, text: &str) -> Vec<String> {
        split(text)
    }

    /// 切分为字节区间
    pub fn split_ranges(&self, text: &str) -> Vec<Range<usize>> {
        split_ranges(text)
    }
}

/// 切分为句子字符串
pub fn split(text: &str) -> Vec<String> {
    split_ranges(text)
        .into_iter()
        .map(|range| text[range].to_string())
        .collect()
}

/// 切分为字节区间，区间首尾相接并覆盖整个输入
pub fn split_ranges(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map_or(text.len(), |(b, _)| *b);

    let mut ranges = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !is_terminator(&chars, i) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && is_terminator(&chars, j) {
            j += 1;
        }
        while j < chars.len() && CLOSERS.contains(&chars[j].1) {
            j += 1;
        }
        while j < chars.len() && chars[j].1.is_whitespace() {
            j += 1;
        }

        let end = byte_at(j);
        // 纯空白片段（例如开头的换行）并入下一句
        if !text[start..end].trim().is_empty() {
            ranges.push(start..end);
            start = end;
        }
        i = j;
    }

    if start < text.len() {
        ranges.push(start..text.len());
    }

    ranges
}

fn is_terminator(chars: &[(usize, char)], i: usize) -> bool {
    let c = chars[i].1;
    if !TERMINATORS.contains(&c) {
        return false;
    }

    // 小数点不是句子边界
    if c == '.' {
        let prev_digit = i > 0 && chars[i - 1].1.is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit());
        if prev_digit && next_digit {
            return false;
        }
    }

    true
}
