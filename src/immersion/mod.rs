//! 沉浸式词汇替换
//!
//! 扫描文档中的中文块，批量翻译后按句子对齐，把与用户词汇表对应的中文片段
//! 替换为外语单词：
//!
//! ```text
//! 扫描 → 调度/批次 → 翻译服务 → 匹配 → 替换
//! ```
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use lexiweave::immersion::{HttpGateway, ImmersionConfig, MemoryVocabularyStore, PageSession, RcDomTree};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ImmersionConfig::default();
//! let tree = Rc::new(RcDomTree::parse("<p>我喜欢苹果。</p>")?);
//! let store = MemoryVocabularyStore::from_json_file("vocab.json")?;
//! let gateway = Rc::new(HttpGateway::new(&config.engine)?);
//!
//! // 需要在 LocalSet 中运行
//! let session = PageSession::new(tree.clone(), config, gateway, &store, None)?;
//! session.run_to_completion().await;
//! println!("{}", tree.to_html()?);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块 - 批次、扫描、匹配、显示和站点名单
pub mod config;

/// 核心服务模块 - 翻译服务、词典查询和页面会话
pub mod core;

/// 文档抽象模块 - 文档树接口、html5ever 实现和块注册表
pub mod document;

/// 错误处理模块
pub mod error;

/// 匹配模块 - 两阶段词汇匹配
pub mod matching;

/// 处理管道模块 - 扫描、切分、批次和调度
pub mod pipeline;

/// 替换模块 - 区间冲突消解和文本节点替换
pub mod replace;

/// 词汇表与词汇存储
pub mod vocabulary;

// ============================================================================
// 公共API重新导出
// ============================================================================

pub use config::{ConfigManager, DisplayMode, ImmersionConfig, ScanMode, SiteFilter};
pub use core::{
    CachedLookup, HttpGateway, PageSession, RichDefinition, RichDefinitionLookup,
    StaticDefinitionLookup, TranslationGateway,
};
pub use document::{BlockId, BlockRegistry, DocumentTree, RcDomTree, ScanState};
pub use error::{ImmersionError, ImmersionResult};
pub use matching::{MatchEngine, MatchKind, PhraseMatch};
pub use pipeline::{BlockScanner, TranslationScheduler};
pub use replace::{ReplaceOutcome, Replacer};
pub use vocabulary::{
    LearningCategory, MemoryVocabularyStore, VocabularyEntry, VocabularySnapshot, VocabularyStore,
};
