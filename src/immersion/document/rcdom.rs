//! 基于 html5ever `RcDom` 的文档树实现

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::{markup, BlockId, DocumentTree, Fragment, NodeKind};
use crate::immersion::error::{ImmersionError, ImmersionResult};
use crate::parsers::html::{
    append_child, find_nodes, get_node_attr, get_node_name, get_parent_node, html_to_dom,
    new_element, new_text, serialize_document, set_node_attr, text_content,
};

/// RcDom 文档
pub struct RcDomTree {
    dom: RcDom,
}

impl RcDomTree {
    pub fn new(dom: RcDom) -> Self {
        Self { dom }
    }

    /// 解析 UTF-8 HTML 字符串
    pub fn parse(html: &str) -> ImmersionResult<Self> {
        let dom = html_to_dom(html.as_bytes(), "utf-8")?;
        Ok(Self::new(dom))
    }

    pub fn document(&self) -> Handle {
        self.dom.document.clone()
    }

    pub fn dom(&self) -> &RcDom {
        &self.dom
    }

    pub fn into_dom(self) -> RcDom {
        self.dom
    }

    /// 按标签名查找元素（文档顺序）
    pub fn elements_by_tag(&self, tag: &str) -> Vec<Handle> {
        find_nodes(&self.dom.document, &[tag])
    }

    /// 序列化为 UTF-8 HTML
    pub fn to_html(&self) -> ImmersionResult<String> {
        let bytes = serialize_document(&self.dom, "")?;
        String::from_utf8(bytes)
            .map_err(|e| ImmersionError::Serialization(format!("输出不是有效的UTF-8: {}", e)))
    }

    fn index_in_parent(parent: &Handle, child: &Handle) -> Option<usize> {
        parent
            .children
            .borrow()
            .iter()
            .position(|c| Rc::ptr_eq(c, child))
    }

    fn build_fragment(fragment: Fragment) -> Option<Handle> {
        match fragment {
            Fragment::Text(text) if text.is_empty() => None,
            Fragment::Text(text) => Some(new_text(&text)),
            Fragment::Marker(marker) => {
                let element = new_element(markup::MARKER_TAG, &marker.attributes());
                append_child(&element, new_text(marker.display_text()));
                Some(element)
            }
        }
    }
}

impl DocumentTree for RcDomTree {
    type Node = Handle;

    fn root(&self) -> Handle {
        self.dom.document.clone()
    }

    fn kind(&self, node: &Handle) -> NodeKind {
        match node.data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text { .. } => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &Handle) -> Option<String> {
        get_node_name(node).map(|name| name.to_ascii_lowercase())
    }

    fn children(&self, node: &Handle) -> Vec<Handle> {
        node.children.borrow().clone()
    }

    fn text_content(&self, node: &Handle) -> String {
        text_content(node)
    }

    fn parent(&self, node: &Handle) -> Option<Handle> {
        get_parent_node(node)
    }

    fn text(&self, node: &Handle) -> Option<String> {
        match &node.data {
            NodeData::Text { contents } => Some(contents.borrow().to_string()),
            _ => None,
        }
    }

    fn attr(&self, node: &Handle, name: &str) -> Option<String> {
        get_node_attr(node, name)
    }

    fn set_attr(&self, node: &Handle, name: &str, value: Option<&str>) {
        set_node_attr(node, name, value.map(str::to_string));
    }

    fn same_node(&self, a: &Handle, b: &Handle) -> bool {
        Rc::ptr_eq(a, b)
    }

    fn replace_text(&self, leaf: &Handle, fragments: Vec<Fragment>) -> ImmersionResult<()> {
        if self.kind(leaf) != NodeKind::Text {
            return Err(ImmersionError::Internal("只能替换文本节点".to_string()));
        }

        let parent = get_parent_node(leaf)
            .ok_or_else(|| ImmersionError::OffsetDrift("文本节点已脱离文档".to_string()))?;
        let index = Self::index_in_parent(&parent, leaf)
            .ok_or_else(|| ImmersionError::OffsetDrift("文本节点不在父节点中".to_string()))?;

        let replacements: Vec<Handle> = fragments
            .into_iter()
            .filter_map(Self::build_fragment)
            .collect();
        for node in &replacements {
            node.parent.set(Some(Rc::downgrade(&parent)));
        }

        parent
            .children
            .borrow_mut()
            .splice(index..index + 1, replacements);
        leaf.parent.set(None);

        Ok(())
    }

    fn insert_companion(&self, block: &Handle, block_id: BlockId, text: &str) -> ImmersionResult<()> {
        let parent = get_parent_node(block)
            .ok_or_else(|| ImmersionError::OffsetDrift("块元素已脱离文档".to_string()))?;
        let index = Self::index_in_parent(&parent, block)
            .ok_or_else(|| ImmersionError::OffsetDrift("块元素不在父节点中".to_string()))?;

        let companion = new_element(
            markup::COMPANION_TAG,
            &[
                ("class", markup::COMPANION_CLASS.to_string()),
                (markup::ATTR_COMPANION, block_id.to_string()),
            ],
        );
        append_child(&companion, new_text(text));
        companion.parent.set(Some(Rc::downgrade(&parent)));
        parent.children.borrow_mut().insert(index + 1, companion);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immersion::document::{MarkerPresentation, ReplacementMarker};

    fn marker(original: &str, word: &str) -> ReplacementMarker {
        ReplacementMarker {
            original: original.to_string(),
            word: word.to_string(),
            entry_id: "e1".to_string(),
            category: "new".to_string(),
            presentation: MarkerPresentation::default(),
        }
    }

    #[test]
    fn test_replace_text_splices_fragments_in_place() {
        let tree = RcDomTree::parse("<p>前<b>粗</b>我喜欢苹果派</p>").expect("parse");
        let p = tree.elements_by_tag("p").remove(0);
        let leaf = tree.children(&p).remove(2);

        tree.replace_text(
            &leaf,
            vec![
                Fragment::Text("我喜欢".to_string()),
                Fragment::Marker(marker("苹果", "apple")),
                Fragment::Text("派".to_string()),
            ],
        )
        .expect("replace");

        let children = tree.children(&p);
        assert_eq!(children.len(), 5);
        assert!(tree.is_marker(&children[3]));
        assert_eq!(tree.text_content(&p), "前粗我喜欢apple派");
        assert!(tree.parent(&children[3]).is_some_and(|parent| tree.same_node(&parent, &p)));
        assert!(tree.parent(&leaf).is_none());
    }

    #[test]
    fn test_marker_serialization() {
        let tree = RcDomTree::parse("<p>苹果</p>").expect("parse");
        let p = tree.elements_by_tag("p").remove(0);
        let leaf = tree.children(&p).remove(0);
        tree.replace_text(&leaf, vec![Fragment::Marker(marker("苹果", "apple"))])
            .expect("replace");

        let html = tree.to_html().expect("serialize");
        assert!(html.contains(r#"class="lw-word""#));
        assert!(html.contains(r#"data-lw-original="苹果""#));
        assert!(html.contains(">apple</span>"));
    }

    #[test]
    fn test_detached_leaf_is_drift() {
        let tree = RcDomTree::parse("<p>文本</p>").expect("parse");
        let p = tree.elements_by_tag("p").remove(0);
        let leaf = tree.children(&p).remove(0);
        tree.replace_text(&leaf, vec![Fragment::Text("新".to_string())])
            .expect("first replace");

        let err = tree
            .replace_text(&leaf, vec![Fragment::Text("再".to_string())])
            .expect_err("detached leaf");
        assert!(matches!(err, ImmersionError::OffsetDrift(_)));
    }

    #[test]
    fn test_insert_companion_after_block() {
        let tree = RcDomTree::parse("<div><p>你好</p><p>再见</p></div>").expect("parse");
        let first = tree.elements_by_tag("p").remove(0);
        tree.insert_companion(&first, 7, "Hello").expect("insert");

        let div = tree.elements_by_tag("div").remove(0);
        let children = tree.children(&div);
        assert_eq!(children.len(), 3);
        assert!(tree.is_companion(&children[1]));
        assert_eq!(tree.attr(&children[1], markup::ATTR_COMPANION).as_deref(), Some("7"));
        assert_eq!(tree.text_content(&children[1]), "Hello");
    }
}
