//! 文本替换
//!
//! 把匹配结果转换为互不重叠的替换区间，并在原文本节点处插入替换标记。

pub mod replacer;
pub mod spans;

pub use replacer::{ReplaceOutcome, Replacer};
pub use spans::{resolve_overlaps, ReplacementSpan};
