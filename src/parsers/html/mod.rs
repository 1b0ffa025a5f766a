//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作
//! - `serializer`: 序列化功能

pub mod dom;
pub mod serializer;

pub use dom::{
    append_child, find_nodes, get_charset, get_node_attr, get_node_name, get_parent_node,
    html_to_dom, new_element, new_text, set_node_attr, text_content,
};
pub use serializer::serialize_document;
