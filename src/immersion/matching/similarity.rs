//! 字符级相似度
//!
//! 去掉停用词后，按字符集合计算 Dice 系数。

use std::collections::HashSet;

/// 比较前从两侧去掉的停用词（长词在前）
pub const STOP_WORDS: &[&str] = &[
    "一个", "的", "了", "是", "在", "和", "与", "或", "及", "之", "地", "得", "着", "过", "把",
    "被", "等",
];

/// 去掉停用词
pub fn strip_stop_words(text: &str) -> String {
    let mut out = text.to_string();
    for word in STOP_WORDS {
        if out.contains(word) {
            out = out.replace(word, "");
        }
    }
    out.trim().to_string()
}

/// 计算两个字符串的相似度，取值 0.0 到 1.0
pub fn calculate_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a = strip_stop_words(a);
    let b = strip_stop_words(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a.chars().count() == 1 || b.chars().count() == 1 {
        return if a == b { 1.0 } else { 0.0 };
    }

    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let intersection = set_a.intersection(&set_b).count();

    2.0 * intersection as f32 / (set_a.len() + set_b.len()) as f32
}
