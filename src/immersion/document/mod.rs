//! 文档树抽象
//!
//! 扫描器、调度器和替换器只通过 [`DocumentTree`] 访问文档：遍历、读取文本、
//! 读写属性、把文本节点拆分替换为文本与标记。节点句柄是不透明的，
//! 块状态保存在 [`BlockRegistry`] 中并同步为元素上的持久属性。

pub mod rcdom;
pub mod registry;

pub use rcdom::RcDomTree;
pub use registry::{BlockId, BlockRecord, BlockRegistry, ScanState};

use crate::immersion::config::{constants, DisplayMode};
use crate::immersion::error::ImmersionResult;

/// 插入到文档中的标记和属性名
pub mod markup {
    pub const MARKER_TAG: &str = "span";
    pub const MARKER_CLASS: &str = "lw-word";
    pub const COMPANION_TAG: &str = "div";
    pub const COMPANION_CLASS: &str = "lw-bilingual";

    pub const ATTR_ENTRY: &str = "data-lw-entry";
    pub const ATTR_CATEGORY: &str = "data-lw-category";
    pub const ATTR_ORIGINAL: &str = "data-lw-original";
    pub const ATTR_WORD: &str = "data-lw-word";
    pub const ATTR_DISPLAY: &str = "data-lw-display";
    pub const ATTR_SHOW_ORIGINAL: &str = "data-lw-show-original";
    pub const ATTR_COMPANION: &str = "data-lw-companion";

    pub const ATTR_BLOCK_ID: &str = "data-lw-id";
    pub const ATTR_STATE: &str = "data-lw-state";
    pub const ATTR_SOURCE: &str = "data-lw-source";
    pub const ATTR_TRANSLATION: &str = "data-lw-translation";
}

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Other,
}

/// 标记的展示方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPresentation {
    pub mode: DisplayMode,
    pub show_original: bool,
}

impl Default for MarkerPresentation {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Replace,
            show_original: true,
        }
    }
}

/// 替换标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementMarker {
    /// 原文中被匹配的中文片段
    pub original: String,
    /// 词汇原词
    pub word: String,
    pub entry_id: String,
    pub category: String,
    pub presentation: MarkerPresentation,
}

impl ReplacementMarker {
    /// 标记内显示的文本
    pub fn display_text(&self) -> &str {
        match self.presentation.mode {
            DisplayMode::Replace => &self.word,
            DisplayMode::Annotate => &self.original,
        }
    }

    /// 标记元素的属性
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("class", markup::MARKER_CLASS.to_string()),
            (markup::ATTR_ENTRY, self.entry_id.clone()),
            (markup::ATTR_CATEGORY, self.category.clone()),
            (markup::ATTR_ORIGINAL, self.original.clone()),
            (markup::ATTR_WORD, self.word.clone()),
            (markup::ATTR_DISPLAY, self.presentation.mode.as_str().to_string()),
            (
                markup::ATTR_SHOW_ORIGINAL,
                self.presentation.show_original.to_string(),
            ),
        ]
    }
}

/// 文本节点替换片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Marker(ReplacementMarker),
}

/// 文档树的遍历与修改接口
///
/// 所有方法只取 `&self`，实现通过内部可变性修改文档。
pub trait DocumentTree {
    type Node: Clone;

    fn root(&self) -> Self::Node;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// 小写元素名，非元素返回 None
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// 文本节点的内容
    fn text(&self, node: &Self::Node) -> Option<String>;

    fn attr(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// `None` 删除属性
    fn set_attr(&self, node: &Self::Node, name: &str, value: Option<&str>);

    fn same_node(&self, a: &Self::Node, b: &Self::Node) -> bool;

    /// 用片段序列原位替换一个文本节点
    fn replace_text(&self, leaf: &Self::Node, fragments: Vec<Fragment>) -> ImmersionResult<()>;

    /// 在块元素之后插入双语对照块
    fn insert_companion(&self, block: &Self::Node, block_id: BlockId, text: &str)
        -> ImmersionResult<()>;

    /// 子树的全部文本
    fn text_content(&self, node: &Self::Node) -> String {
        let mut out = String::new();
        let mut stack = vec![node.clone()];
        while let Some(current) = stack.pop() {
            if let Some(text) = self.text(&current) {
                out.push_str(&text);
                continue;
            }
            let mut children = self.children(&current);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// 是否为插入的替换标记
    fn is_marker(&self, node: &Self::Node) -> bool {
        self.kind(node) == NodeKind::Element && self.attr(node, markup::ATTR_ENTRY).is_some()
    }

    /// 是否为双语对照块
    fn is_companion(&self, node: &Self::Node) -> bool {
        self.kind(node) == NodeKind::Element && self.attr(node, markup::ATTR_COMPANION).is_some()
    }
}

/// 元素名是否属于块级元素（非行内元素都按块处理，包括 `body`、`main` 等容器）
pub fn is_block_tag(tag: &str) -> bool {
    !constants::INLINE_ELEMENTS.contains(&tag)
}

/// 元素名是否属于技术性元素
pub fn is_technical_tag(tag: &str) -> bool {
    constants::TECHNICAL_ELEMENTS.contains(&tag)
}

/// 块自身的文本节点（文档顺序）
///
/// 不进入嵌套的块级元素、技术性元素、替换标记和双语对照块。
pub fn block_text_leaves<T: DocumentTree>(tree: &T, block: &T::Node) -> Vec<T::Node> {
    let mut leaves = Vec::new();
    collect_leaves(tree, block, &mut leaves);
    leaves
}

fn collect_leaves<T: DocumentTree>(tree: &T, node: &T::Node, leaves: &mut Vec<T::Node>) {
    for child in tree.children(node) {
        match tree.kind(&child) {
            NodeKind::Text => leaves.push(child),
            NodeKind::Element => {
                let tag = tree.tag_name(&child).unwrap_or_default();
                if is_block_tag(&tag)
                    || is_technical_tag(&tag)
                    || tree.is_marker(&child)
                    || tree.is_companion(&child)
                {
                    continue;
                }
                collect_leaves(tree, &child, leaves);
            }
            _ => {}
        }
    }
}

/// 块自身的文本（不含嵌套块）
pub fn block_text<T: DocumentTree>(tree: &T, block: &T::Node) -> String {
    block_text_leaves(tree, block)
        .iter()
        .filter_map(|leaf| tree.text(leaf))
        .collect()
}
