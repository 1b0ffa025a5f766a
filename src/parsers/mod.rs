//! # 解析器模块
//!
//! HTML 文档解析、DOM 操作与序列化，供 [`crate::immersion::document`] 的
//! RcDom 实现和命令行工具使用。

pub mod html;

pub use html::{get_charset, html_to_dom, serialize_document};
