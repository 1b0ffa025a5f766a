//! # Lexiweave Library
//!
//! 在中文网页中按句子对齐译文，把与用户词汇表对应的中文片段就地替换为
//! 外语单词，用于沉浸式的词汇学习。
//!
//! ## 模块组织
//!
//! - `immersion` - 扫描、批量翻译、词汇匹配和替换
//! - `parsers` - HTML 解析与序列化
//! - `env` - 环境变量覆盖

pub mod env;
pub mod immersion;
pub mod parsers;

// Re-export commonly used items for convenience
pub use immersion::{
    ConfigManager, ImmersionConfig, ImmersionError, ImmersionResult, PageSession, RcDomTree,
};
pub use parsers::*;
