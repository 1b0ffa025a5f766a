//! 块扫描器
//!
//! 前序遍历文档树，挑选出最内层的、含中文的块级元素。扫描本身不修改文档，
//! 已经打过状态标签的块会被跳过，因此重复扫描不会产生新的候选。

use crate::immersion::config::{constants, ScanConfig, ScanMode};
use crate::immersion::document::{
    block_text, is_block_tag, is_technical_tag, BlockRegistry, DocumentTree, NodeKind,
};
use crate::immersion::pipeline::filters::{contains_cjk, BlockTextFilter};

/// 扫描统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub nodes_visited: usize,
    pub nodes_skipped: usize,
    pub tagged_skipped: usize,
    pub candidates: usize,
    pub rejected_short: usize,
    pub rejected_garbage: usize,
}

impl ScanStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 块扫描器
#[derive(Debug, Clone)]
pub struct BlockScanner {
    mode: ScanMode,
    max_depth: usize,
    filter: BlockTextFilter,
    stats: ScanStats,
}

impl Default for BlockScanner {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

impl BlockScanner {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            mode: config.mode,
            max_depth: config.max_depth,
            filter: BlockTextFilter::new(config.min_block_chars),
            stats: ScanStats::default(),
        }
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// 按文档顺序返回候选块
    pub fn scan<T>(&mut self, tree: &T, registry: &BlockRegistry<T::Node>) -> Vec<T::Node>
    where
        T: DocumentTree,
    {
        self.stats.reset();

        let mut blocks = Vec::new();
        self.visit(tree, registry, &tree.root(), 0, &mut blocks);
        self.stats.candidates = blocks.len();

        tracing::debug!(
            "扫描完成: 访问 {} 个节点, 跳过 {} 个, 候选块 {} 个",
            self.stats.nodes_visited,
            self.stats.nodes_skipped,
            self.stats.candidates
        );

        blocks
    }

    /// 返回值表示该子树是否已被某个块覆盖（新候选或已处理的块）
    fn visit<T>(
        &mut self,
        tree: &T,
        registry: &BlockRegistry<T::Node>,
        node: &T::Node,
        depth: usize,
        blocks: &mut Vec<T::Node>,
    ) -> bool
    where
        T: DocumentTree,
    {
        if depth > self.max_depth {
            tracing::warn!("扫描深度超过限制 {}，停止下降", self.max_depth);
            return false;
        }

        self.stats.nodes_visited += 1;

        match tree.kind(node) {
            NodeKind::Element => {}
            NodeKind::Document => {
                return self.visit_children(tree, registry, node, depth, blocks);
            }
            _ => return false,
        }

        let tag = tree.tag_name(node).unwrap_or_default();

        if self.should_skip_element(tree, node, &tag) {
            self.stats.nodes_skipped += 1;
            return false;
        }

        if registry.state_of(tree, node).is_tagged() {
            self.stats.tagged_skipped += 1;
            return true;
        }

        if self.visit_children(tree, registry, node, depth, blocks) {
            return true;
        }

        if !is_block_tag(&tag) {
            return false;
        }

        let text = block_text(tree, node);
        if !contains_cjk(&text) {
            return false;
        }

        if !self.filter.is_eligible(&text) {
            self.stats.rejected_short += 1;
            return false;
        }

        if self.filter.is_garbage(&text) {
            self.stats.rejected_garbage += 1;
            return false;
        }

        blocks.push(node.clone());
        true
    }

    fn visit_children<T>(
        &mut self,
        tree: &T,
        registry: &BlockRegistry<T::Node>,
        node: &T::Node,
        depth: usize,
        blocks: &mut Vec<T::Node>,
    ) -> bool
    where
        T: DocumentTree,
    {
        let mut covered = false;
        for child in tree.children(node) {
            // 不能短路，所有子树都要扫描
            covered |= self.visit(tree, registry, &child, depth + 1, blocks);
        }
        covered
    }

    fn should_skip_element<T>(&self, tree: &T, node: &T::Node, tag: &str) -> bool
    where
        T: DocumentTree,
    {
        if is_technical_tag(tag) || tree.is_marker(node) || tree.is_companion(node) {
            return true;
        }

        if self.mode == ScanMode::MainContent {
            if constants::CHROME_ELEMENTS.contains(&tag) {
                return true;
            }
            if let Some(role) = tree.attr(node, "role") {
                if constants::CHROME_ROLES.contains(&role.trim().to_lowercase().as_str()) {
                    return true;
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immersion::document::{RcDomTree, ScanState};

    fn scan_texts(html: &str, mode: ScanMode) -> Vec<String> {
        let tree = RcDomTree::parse(html).expect("parse");
        let registry = BlockRegistry::new();
        let mut scanner = BlockScanner::default().with_mode(mode);
        scanner
            .scan(&tree, &registry)
            .iter()
            .map(|node| block_text(&tree, node))
            .collect()
    }

    #[test]
    fn test_selects_innermost_blocks() {
        let html = "<div><div><p>第一段内容</p><p>第二段内容</p></div></div>";
        assert_eq!(
            scan_texts(html, ScanMode::MainContent),
            vec!["第一段内容", "第二段内容"]
        );
    }

    #[test]
    fn test_skips_blocks_without_cjk_but_descends() {
        let html = "<div>English intro<p>中文段落</p></div><p>Only English</p>";
        assert_eq!(scan_texts(html, ScanMode::MainContent), vec!["中文段落"]);
    }

    #[test]
    fn test_inline_children_belong_to_block() {
        let html = "<p>我喜欢<b>苹果</b>派</p>";
        assert_eq!(scan_texts(html, ScanMode::MainContent), vec!["我喜欢苹果派"]);
    }

    #[test]
    fn test_text_directly_in_containers_is_selected() {
        assert_eq!(
            scan_texts(
                "<body>这是正文第一行<br>这是正文第二行</body>",
                ScanMode::MainContent
            ),
            vec!["这是正文第一行这是正文第二行"]
        );
        assert_eq!(
            scan_texts("<main>这是主要内容文字</main>", ScanMode::MainContent),
            vec!["这是主要内容文字"]
        );
        assert_eq!(
            scan_texts("<center>居中的说明文字</center>", ScanMode::MainContent),
            vec!["居中的说明文字"]
        );
    }

    #[test]
    fn test_inline_only_content_belongs_to_nearest_container() {
        let html = "<body><font color=\"red\">字体标签里的中文</font><span>还有一段</span></body>";
        let tree = RcDomTree::parse(html).expect("parse");
        let blocks = BlockScanner::default().scan(&tree, &BlockRegistry::new());

        assert_eq!(blocks.len(), 1);
        assert_eq!(tree.tag_name(&blocks[0]).as_deref(), Some("body"));
        assert_eq!(block_text(&tree, &blocks[0]), "字体标签里的中文还有一段");
    }

    #[test]
    fn test_technical_elements_are_skipped() {
        let html = "<script>var a = '中文';</script><pre>代码块中文</pre><p>正文内容</p>";
        assert_eq!(scan_texts(html, ScanMode::MainContent), vec!["正文内容"]);
    }

    #[test]
    fn test_scan_mode_controls_chrome() {
        let html = "<nav><li>导航链接一</li></nav><main><p>主要内容</p></main>\
                    <div role=\"contentinfo\"><p>版权所有信息</p></div>";
        assert_eq!(scan_texts(html, ScanMode::MainContent), vec!["主要内容"]);
        assert_eq!(
            scan_texts(html, ScanMode::WholePage),
            vec!["导航链接一", "主要内容", "版权所有信息"]
        );
    }

    #[test]
    fn test_garbage_and_short_text_rejected() {
        let html = "<p>首页 > 新闻 > 国内</p><p>中</p><p>正常的句子。</p>";
        let tree = RcDomTree::parse(html).expect("parse");
        let registry = BlockRegistry::new();
        let mut scanner = BlockScanner::default();
        let blocks = scanner.scan(&tree, &registry);
        assert_eq!(blocks.len(), 1);
        assert_eq!(scanner.stats().rejected_garbage, 1);
        assert_eq!(scanner.stats().rejected_short, 1);
    }

    #[test]
    fn test_rescan_skips_tagged_blocks() {
        let tree = RcDomTree::parse("<div><p>第一段</p>外层文字<p>第二段</p></div>").expect("parse");
        let mut registry = BlockRegistry::new();
        let mut scanner = BlockScanner::default();

        let first = scanner.scan(&tree, &registry);
        assert_eq!(first.len(), 2);
        for node in &first {
            let text = block_text(&tree, node);
            let id = registry.register(&tree, node, &text);
            registry.set_state(&tree, id, ScanState::Pending);
        }

        // 已处理的子块仍然覆盖父元素
        assert!(scanner.scan(&tree, &registry).is_empty());
        assert_eq!(scanner.stats().tagged_skipped, 2);
    }

    #[test]
    fn test_reverted_block_is_eligible_again() {
        let tree = RcDomTree::parse("<p>会失败的段落</p>").expect("parse");
        let mut registry = BlockRegistry::new();
        let mut scanner = BlockScanner::default();

        let node = scanner.scan(&tree, &registry).remove(0);
        let id = registry.register(&tree, &node, "会失败的段落");
        registry.set_state(&tree, id, ScanState::Pending);
        registry.mark_failed(&tree, id, 3);

        let again = scanner.scan(&tree, &registry);
        assert_eq!(again.len(), 1);
        assert_eq!(registry.id_of(&tree, &again[0]), Some(id));
    }
}
