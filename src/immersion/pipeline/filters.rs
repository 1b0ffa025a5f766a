//! 块文本过滤器模块
//!
//! 判断一段块文本是否值得送去翻译：是否包含中日韩文字、是否足够长、
//! 是否像导航面包屑之类的碎片

use crate::immersion::config::constants;

/// 判断字符是否为中日韩表意文字
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF       // 基本区
        | 0x3400..=0x4DBF     // 扩展A
        | 0x20000..=0x2A6DF   // 扩展B
        | 0x2A700..=0x2EBEF   // 扩展C-F
        | 0xF900..=0xFAFF     // 兼容表意文字
        | 0x2F800..=0x2FA1F)
}

/// 文本是否包含至少一个中日韩字符
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// 非空白字符数
pub fn visible_char_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// 块文本过滤器
#[derive(Debug, Clone)]
pub struct BlockTextFilter {
    min_chars: usize,
    garbage_max_chars: usize,
    garbage_ratio: f32,
}

impl Default for BlockTextFilter {
    fn default() -> Self {
        Self::new(constants::MIN_BLOCK_CHARS)
    }
}

impl BlockTextFilter {
    pub fn new(min_chars: usize) -> Self {
        Self {
            min_chars,
            garbage_max_chars: constants::GARBAGE_MAX_CHARS,
            garbage_ratio: constants::GARBAGE_DELIMITER_RATIO,
        }
    }

    /// 是否满足最低资格：含中文且达到最小长度
    pub fn is_eligible(&self, text: &str) -> bool {
        contains_cjk(text) && visible_char_count(text) >= self.min_chars
    }

    /// 是否应当作为翻译块
    pub fn should_translate(&self, text: &str) -> bool {
        self.is_eligible(text) && !self.is_garbage(text)
    }

    /// 短文本中分隔符密度过高（面包屑、菜单）
    pub fn is_garbage(&self, text: &str) -> bool {
        let visible = visible_char_count(text);
        if visible == 0 {
            return true;
        }
        if visible >= self.garbage_max_chars {
            return false;
        }

        let delimiters = text
            .chars()
            .filter(|c| constants::GARBAGE_DELIMITERS.contains(c))
            .count();

        delimiters as f32 / visible as f32 > self.garbage_ratio
    }
}
