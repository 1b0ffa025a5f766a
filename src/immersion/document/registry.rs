//! 块注册表
//!
//! 以 `BlockId` 为键的块状态表。注册表是状态的唯一来源，每次状态变化都会
//! 同步到元素的持久属性上，供后续扫描和外部观察者读取。

use super::{markup, DocumentTree};

pub type BlockId = u64;

/// 块的扫描状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    Unscanned,
    Pending,
    Translated,
    Error,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Unscanned => "unscanned",
            ScanState::Pending => "pending",
            ScanState::Translated => "translated",
            ScanState::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unscanned" => Some(ScanState::Unscanned),
            "pending" => Some(ScanState::Pending),
            "translated" => Some(ScanState::Translated),
            "error" => Some(ScanState::Error),
            _ => None,
        }
    }

    /// 是否已被处理（扫描时跳过）
    pub fn is_tagged(&self) -> bool {
        !matches!(self, ScanState::Unscanned)
    }
}

/// 单个块的记录
#[derive(Debug, Clone)]
pub struct BlockRecord<N> {
    pub id: BlockId,
    pub node: N,
    /// 扫描时捕获的原文
    pub source_text: String,
    pub state: ScanState,
    pub source_sentences: Vec<String>,
    pub translated_sentences: Vec<String>,
    pub translated_text: Option<String>,
    pub failure_count: u32,
}

/// 块注册表
#[derive(Debug)]
pub struct BlockRegistry<N> {
    records: Vec<BlockRecord<N>>,
}

impl<N: Clone> Default for BlockRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Clone> BlockRegistry<N> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// 查找元素对应的块
    pub fn id_of<T>(&self, tree: &T, node: &N) -> Option<BlockId>
    where
        T: DocumentTree<Node = N>,
    {
        // 先按持久属性直接定位，再回退到线性查找
        let by_attr = tree
            .attr(node, markup::ATTR_BLOCK_ID)
            .and_then(|v| v.parse::<BlockId>().ok())
            .filter(|id| {
                self.get(*id)
                    .is_some_and(|record| tree.same_node(&record.node, node))
            });

        by_attr.or_else(|| {
            self.records
                .iter()
                .find(|record| tree.same_node(&record.node, node))
                .map(|record| record.id)
        })
    }

    /// 注册元素，已注册时返回原有 id
    pub fn register<T>(&mut self, tree: &T, node: &N, source_text: &str) -> BlockId
    where
        T: DocumentTree<Node = N>,
    {
        if let Some(id) = self.id_of(tree, node) {
            if let Some(record) = self.get_mut(id) {
                if record.state == ScanState::Unscanned {
                    record.source_text = source_text.to_string();
                }
            }
            return id;
        }

        let id = self.records.len() as BlockId;
        self.records.push(BlockRecord {
            id,
            node: node.clone(),
            source_text: source_text.to_string(),
            state: ScanState::Unscanned,
            source_sentences: Vec::new(),
            translated_sentences: Vec::new(),
            translated_text: None,
            failure_count: 0,
        });
        tree.set_attr(node, markup::ATTR_BLOCK_ID, Some(&id.to_string()));
        id
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockRecord<N>> {
        self.records.get(id as usize)
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut BlockRecord<N>> {
        self.records.get_mut(id as usize)
    }

    pub fn state(&self, id: BlockId) -> Option<ScanState> {
        self.get(id).map(|record| record.state)
    }

    /// 元素的状态：注册表优先，其次读取持久属性
    pub fn state_of<T>(&self, tree: &T, node: &N) -> ScanState
    where
        T: DocumentTree<Node = N>,
    {
        self.id_of(tree, node)
            .and_then(|id| self.state(id))
            .or_else(|| {
                tree.attr(node, markup::ATTR_STATE)
                    .and_then(|v| ScanState::parse(&v))
            })
            .unwrap_or(ScanState::Unscanned)
    }

    /// 设置状态并同步属性
    pub fn set_state<T>(&mut self, tree: &T, id: BlockId, state: ScanState)
    where
        T: DocumentTree<Node = N>,
    {
        if let Some(record) = self.get_mut(id) {
            record.state = state;
            let value = match state {
                ScanState::Unscanned => None,
                other => Some(other.as_str()),
            };
            tree.set_attr(&record.node, markup::ATTR_STATE, value);
        }
    }

    /// 标记为已翻译并持久化原文和译文
    pub fn mark_translated<T>(
        &mut self,
        tree: &T,
        id: BlockId,
        source_sentences: Vec<String>,
        translated_sentences: Vec<String>,
    ) where
        T: DocumentTree<Node = N>,
    {
        let Some(record) = self.get_mut(id) else {
            return;
        };

        let translated_text = join_translations(&translated_sentences);
        tree.set_attr(&record.node, markup::ATTR_SOURCE, Some(&record.source_text));
        tree.set_attr(&record.node, markup::ATTR_TRANSLATION, Some(&translated_text));

        record.source_sentences = source_sentences;
        record.translated_sentences = translated_sentences;
        record.translated_text = Some(translated_text);
        self.set_state(tree, id, ScanState::Translated);
    }

    /// 记录一次失败，返回新的状态
    ///
    /// 首次失败之后还允许 `max_retries` 次重试，再失败才标记为错误。
    pub fn mark_failed<T>(&mut self, tree: &T, id: BlockId, max_retries: u32) -> ScanState
    where
        T: DocumentTree<Node = N>,
    {
        let Some(record) = self.get_mut(id) else {
            return ScanState::Unscanned;
        };

        record.failure_count += 1;
        let state = if record.failure_count > max_retries {
            ScanState::Error
        } else {
            ScanState::Unscanned
        };
        self.set_state(tree, id, state);
        state
    }

    /// 把所有错误块恢复为未扫描，返回受影响的块
    pub fn reset_errors<T>(&mut self, tree: &T) -> Vec<BlockId>
    where
        T: DocumentTree<Node = N>,
    {
        let ids: Vec<BlockId> = self
            .records
            .iter()
            .filter(|record| record.state == ScanState::Error)
            .map(|record| record.id)
            .collect();

        for id in &ids {
            if let Some(record) = self.get_mut(*id) {
                record.failure_count = 0;
            }
            self.set_state(tree, *id, ScanState::Unscanned);
        }

        ids
    }

    pub fn count_in(&self, state: ScanState) -> usize {
        self.records.iter().filter(|r| r.state == state).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockRecord<N>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 把译文句子拼接为整段译文
pub fn join_translations(sentences: &[String]) -> String {
    sentences
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
