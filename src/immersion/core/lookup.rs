//! 词典查询接口
//!
//! 激进匹配按需查询词汇的详细释义。查询结果经过 LRU 缓存，失败不缓存。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::immersion::error::{helpers::lookup_error, ImmersionResult};
use crate::immersion::vocabulary::PhraseTranslation;

/// 详细释义
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RichDefinition {
    /// 主要释义
    pub meanings: Vec<String>,
    /// 其他来源的释义
    pub alternate_meanings: Vec<String>,
    pub synonyms: Vec<String>,
    pub phrases: Vec<PhraseTranslation>,
}

impl RichDefinition {
    /// 全部可能含中文的释义字符串
    pub fn definition_strings(&self) -> impl Iterator<Item = &str> {
        self.meanings
            .iter()
            .chain(&self.alternate_meanings)
            .chain(&self.synonyms)
            .map(String::as_str)
            .chain(self.phrases.iter().map(|p| p.translation.as_str()))
    }
}

/// 词典查询接口
#[async_trait(?Send)]
pub trait RichDefinitionLookup {
    async fn lookup(&self, word: &str) -> ImmersionResult<RichDefinition>;
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

/// 内存词典
#[derive(Debug, Default)]
pub struct StaticDefinitionLookup {
    entries: HashMap<String, RichDefinition>,
    calls: Cell<usize>,
}

impl StaticDefinitionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, word: &str, definition: RichDefinition) -> Self {
        self.insert(word, definition);
        self
    }

    pub fn insert(&mut self, word: &str, definition: RichDefinition) {
        self.entries.insert(normalize(word), definition);
    }

    /// 已发生的查询次数
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// 从 `{"word": {"meanings": [...]}}` 形式的 JSON 文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ImmersionResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let raw: HashMap<String, RichDefinition> = serde_json::from_str(&content)?;

        let mut lookup = Self::new();
        for (word, definition) in raw {
            lookup.insert(&word, definition);
        }
        tracing::debug!("已加载 {} 条词典释义", lookup.entries.len());
        Ok(lookup)
    }
}

#[async_trait(?Send)]
impl RichDefinitionLookup for StaticDefinitionLookup {
    async fn lookup(&self, word: &str) -> ImmersionResult<RichDefinition> {
        self.calls.set(self.calls.get() + 1);
        self.entries
            .get(&normalize(word))
            .cloned()
            .ok_or_else(|| lookup_error(format!("词典中没有 {}", word)))
    }
}

/// 带 LRU 缓存的查询
pub struct CachedLookup<L> {
    inner: L,
    cache: RefCell<LruCache<String, RichDefinition>>,
}

impl<L: RichDefinitionLookup> CachedLookup<L> {
    pub fn new(inner: L, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[async_trait(?Send)]
impl<L: RichDefinitionLookup> RichDefinitionLookup for CachedLookup<L> {
    async fn lookup(&self, word: &str) -> ImmersionResult<RichDefinition> {
        let key = normalize(word);

        if let Some(hit) = self.cache.borrow_mut().get(&key).cloned() {
            tracing::debug!("词典缓存命中: {}", key);
            return Ok(hit);
        }

        let definition = self.inner.lookup(word).await?;
        self.cache.borrow_mut().put(key, definition.clone());
        Ok(definition)
    }
}
