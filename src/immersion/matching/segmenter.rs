//! 分词器
//!
//! 激进匹配需要把句子切成词语单元。默认实现使用 jieba，词典只加载一次。

use std::sync::OnceLock;

use jieba_rs::Jieba;

/// 分词接口
pub trait WordSegmenter {
    /// 按原文顺序返回词语单元（空白已去掉，标点保留为独立单元）
    fn segment(&self, text: &str) -> Vec<String>;
}

/// 基于 jieba 的中文分词器
pub struct JiebaSegmenter {
    jieba: Jieba,
}

impl JiebaSegmenter {
    pub fn new() -> Self {
        Self {
            jieba: Jieba::new(),
        }
    }

    /// 进程内共享的实例
    pub fn shared() -> &'static JiebaSegmenter {
        static INSTANCE: OnceLock<JiebaSegmenter> = OnceLock::new();
        INSTANCE.get_or_init(|| {
            tracing::debug!("加载 jieba 词典");
            JiebaSegmenter::new()
        })
    }
}

impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl WordSegmenter for JiebaSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut(text, true)
            .into_iter()
            .filter(|token| !token.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// 委托给共享 jieba 实例的默认分词器
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSegmenter;

impl WordSegmenter for DefaultSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        JiebaSegmenter::shared().segment(text)
    }
}

/// 词语单元是否含有文字（标点单元用来断开组合窗口）
pub fn is_word_unit(unit: &str) -> bool {
    unit.chars().any(char::is_alphanumeric)
}
