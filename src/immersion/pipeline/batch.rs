//! 翻译批次模块
//!
//! 把若干块的句子合并为一次翻译请求，并在响应返回后按记录的映射拆回各块。
//!
//! ## 请求格式
//!
//! 每个句子去掉首尾空白后，用固定分隔符 [`constants::BATCH_DELIMITER`]
//! 连接成一个字符串发送。翻译服务通常会保留分隔符，但可能改写它两侧的空白，
//! 因此拆分响应时只认分隔标记本身，再逐段去掉空白。
//!
//! ## 容错
//!
//! - 响应片段少于请求句子数：缺失的句子得到空译文
//! - 响应片段多于请求句子数：多余片段被忽略
//! - 纯空白句子不会被发送，译文为空
//! - 原文本身含有分隔标记的句子也不会被发送，否则响应拆分会整体错位
//!
//! ```rust
//! use lexiweave::immersion::pipeline::batch::BatchRequest;
//!
//! let request = BatchRequest::build(1, vec![(7, "我喜欢苹果。你呢？".to_string())]);
//! assert_eq!(request.combined_text(), "我喜欢苹果。\n@@@\n你呢？");
//!
//! let results = request.distribute("I like apples.\n@@@\nAnd you?");
//! assert_eq!(results[0].translated_sentences, vec!["I like apples.", "And you?"]);
//! ```

use std::collections::VecDeque;

use crate::immersion::config::constants;
use crate::immersion::document::BlockId;
use crate::immersion::pipeline::splitter;

/// 一个待翻译的句子及其来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub block_id: BlockId,
    /// 句子在块内的序号
    pub sentence_index: usize,
    /// 发送给翻译服务的文本（已去掉首尾空白）
    pub text: String,
}

/// 批次中的一个块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchBlock {
    pub block_id: BlockId,
    /// 原始句子（未去空白，拼接后等于块文本）
    pub sentences: Vec<String>,
}

/// 单个块的翻译结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTranslation {
    pub block_id: BlockId,
    pub source_sentences: Vec<String>,
    /// 与 `source_sentences` 一一对应，缺失时为空字符串
    pub translated_sentences: Vec<String>,
}

/// 合并后的翻译请求
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub id: usize,
    /// 按取出顺序排列的块
    pub blocks: Vec<BatchBlock>,
    /// 与发送文本中的片段一一对应
    pub units: Vec<TranslationUnit>,
}

impl BatchRequest {
    /// 由 (块 id, 块文本) 列表构建请求
    pub fn build(id: usize, blocks: Vec<(BlockId, String)>) -> Self {
        let mut batch_blocks = Vec::with_capacity(blocks.len());
        let mut units = Vec::new();

        for (block_id, text) in blocks {
            let sentences = splitter::split(&text);

            for (sentence_index, sentence) in sentences.iter().enumerate() {
                let trimmed = sentence.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed.contains(constants::BATCH_DELIMITER_TOKEN) {
                    tracing::debug!("块 {} 的第 {} 句含有分隔标记，跳过翻译", block_id, sentence_index);
                    continue;
                }
                units.push(TranslationUnit {
                    block_id,
                    sentence_index,
                    text: trimmed.to_string(),
                });
            }

            batch_blocks.push(BatchBlock {
                block_id,
                sentences,
            });
        }

        Self {
            id,
            blocks: batch_blocks,
            units,
        }
    }

    /// 发送给翻译服务的合并文本
    pub fn combined_text(&self) -> String {
        self.units
            .iter()
            .map(|unit| unit.text.as_str())
            .collect::<Vec<_>>()
            .join(constants::BATCH_DELIMITER)
    }

    /// 发送的字符数
    pub fn char_count(&self) -> usize {
        self.units.iter().map(|unit| unit.text.chars().count()).sum()
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|block| block.block_id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 把响应文本拆回各块，顺序与 `blocks` 相同
    pub fn distribute(&self, response: &str) -> Vec<BlockTranslation> {
        let pieces = split_response(response);

        if pieces.len() != self.units.len() {
            tracing::debug!(
                "批次 {} 响应片段数 {} 与句子数 {} 不一致",
                self.id,
                pieces.len(),
                self.units.len()
            );
        }

        let mut results: Vec<BlockTranslation> = self
            .blocks
            .iter()
            .map(|block| BlockTranslation {
                block_id: block.block_id,
                source_sentences: block.sentences.clone(),
                translated_sentences: vec![String::new(); block.sentences.len()],
            })
            .collect();

        for (unit, piece) in self.units.iter().zip(pieces) {
            let target = results
                .iter_mut()
                .find(|result| result.block_id == unit.block_id)
                .and_then(|result| result.translated_sentences.get_mut(unit.sentence_index));
            if let Some(slot) = target {
                *slot = piece;
            }
        }

        results
    }
}

/// 按分隔标记拆分响应，逐段去掉空白
pub fn split_response(response: &str) -> Vec<String> {
    if response.trim().is_empty() {
        return Vec::new();
    }

    response
        .split(constants::BATCH_DELIMITER_TOKEN)
        .map(|piece| piece.trim().to_string())
        .collect()
}

/// 先进先出的批次队列
#[derive(Debug, Default)]
pub struct BatchQueue {
    queue: VecDeque<BatchRequest>,
}

impl BatchQueue {
    pub fn enqueue(&mut self, batch: BatchRequest) {
        self.queue.push_back(batch);
    }

    pub fn dequeue(&mut self) -> Option<BatchRequest> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
