//! 词汇表模块
//!
//! 学习者词汇条目、不可变快照和词汇存储接口。匹配引擎只读取快照；
//! 存储在词汇变化时推送新的快照。

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::immersion::error::{ImmersionError, ImmersionResult};

/// 释义字符串的分隔符（空白另行处理）
pub const DEFINITION_DELIMITERS: &[char] = &[',', '，', ';', '；', '、', '/', '|'];

/// 按分隔符拆分释义字符串，去掉空片段
pub fn split_definitions(definitions: &str) -> impl Iterator<Item = &str> {
    definitions
        .split(|c: char| DEFINITION_DELIMITERS.contains(&c) || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 学习状态
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LearningCategory {
    #[default]
    New,
    Learning,
    Mastered,
    Custom(String),
}

impl LearningCategory {
    pub fn as_str(&self) -> &str {
        match self {
            LearningCategory::New => "new",
            LearningCategory::Learning => "learning",
            LearningCategory::Mastered => "mastered",
            LearningCategory::Custom(name) => name,
        }
    }
}

impl From<String> for LearningCategory {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "new" => LearningCategory::New,
            "learning" => LearningCategory::Learning,
            "mastered" => LearningCategory::Mastered,
            _ => LearningCategory::Custom(value),
        }
    }
}

impl From<LearningCategory> for String {
    fn from(value: LearningCategory) -> Self {
        value.as_str().to_string()
    }
}

/// 短语及其译文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseTranslation {
    pub phrase: String,
    pub translation: String,
}

/// 词汇条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub id: String,
    /// 源语言单词（例如英文）
    pub text: String,
    /// 中文释义，分隔符连接
    pub definitions: String,
    #[serde(default)]
    pub inflections: Vec<String>,
    #[serde(default)]
    pub category: LearningCategory,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<PhraseTranslation>,
}

impl VocabularyEntry {
    pub fn new(id: impl Into<String>, text: impl Into<String>, definitions: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            definitions: definitions.into(),
            inflections: Vec::new(),
            category: LearningCategory::default(),
            examples: Vec::new(),
            synonyms: Vec::new(),
            phrases: Vec::new(),
        }
    }

    pub fn with_inflections<I, S>(mut self, inflections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inflections = inflections.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: LearningCategory) -> Self {
        self.category = category;
        self
    }

    /// 拆分后的释义词
    pub fn definition_terms(&self) -> Vec<&str> {
        split_definitions(&self.definitions).collect()
    }

    /// 原词及其全部词形
    pub fn surface_forms(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.text.as_str())
            .chain(self.inflections.iter().map(String::as_str))
            .filter(|s| !s.trim().is_empty())
    }

    /// 译文（已转小写）中是否出现原词或任一词形
    pub fn appears_in(&self, translated_lower: &str) -> bool {
        self.surface_forms()
            .any(|form| translated_lower.contains(&form.to_lowercase()))
    }
}

/// 不可变的词汇快照
#[derive(Debug, Clone, Default)]
pub struct VocabularySnapshot {
    entries: Vec<VocabularyEntry>,
}

impl VocabularySnapshot {
    /// 构建快照，校验 id 唯一且释义非空
    pub fn build(entries: Vec<VocabularyEntry>) -> ImmersionResult<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(ImmersionError::InvalidInput(format!(
                    "词汇 id 重复: {}",
                    entry.id
                )));
            }
            if split_definitions(&entry.definitions).next().is_none() {
                return Err(ImmersionError::InvalidInput(format!(
                    "词汇 {} 的释义为空",
                    entry.id
                )));
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&VocabularyEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 词汇变化回调
pub type VocabularyListener = Box<dyn Fn(Arc<VocabularySnapshot>)>;

/// 词汇存储接口
pub trait VocabularyStore {
    /// 当前快照
    fn get_all(&self) -> Arc<VocabularySnapshot>;

    /// 注册变化通知
    fn on_change(&self, callback: VocabularyListener);
}

/// 内存词汇存储
#[derive(Default)]
pub struct MemoryVocabularyStore {
    snapshot: RefCell<Arc<VocabularySnapshot>>,
    listeners: RefCell<Vec<VocabularyListener>>,
}

impl MemoryVocabularyStore {
    pub fn new(entries: Vec<VocabularyEntry>) -> ImmersionResult<Self> {
        Ok(Self {
            snapshot: RefCell::new(Arc::new(VocabularySnapshot::build(entries)?)),
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// 从 JSON 字符串加载（条目数组）
    pub fn from_json_str(json: &str) -> ImmersionResult<Self> {
        let entries: Vec<VocabularyEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// 从 JSON 文件加载
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ImmersionResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ImmersionError::Io(format!("读取词汇文件失败 {}: {}", path.display(), e)))?;
        let store = Self::from_json_str(&content)?;
        tracing::info!("已加载 {} 个词汇条目: {}", store.get_all().len(), path.display());
        Ok(store)
    }

    /// 整体替换词汇表
    pub fn replace(&self, entries: Vec<VocabularyEntry>) -> ImmersionResult<()> {
        let snapshot = Arc::new(VocabularySnapshot::build(entries)?);
        self.publish(snapshot);
        Ok(())
    }

    /// 新增或更新单个条目
    pub fn upsert(&self, entry: VocabularyEntry) -> ImmersionResult<()> {
        let mut entries = self.snapshot.borrow().entries().to_vec();
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.replace(entries)
    }

    fn publish(&self, snapshot: Arc<VocabularySnapshot>) {
        *self.snapshot.borrow_mut() = snapshot.clone();
        for listener in self.listeners.borrow().iter() {
            listener(snapshot.clone());
        }
    }
}

impl VocabularyStore for MemoryVocabularyStore {
    fn get_all(&self) -> Arc<VocabularySnapshot> {
        self.snapshot.borrow().clone()
    }

    fn on_change(&self, callback: VocabularyListener) {
        self.listeners.borrow_mut().push(callback);
    }
}
