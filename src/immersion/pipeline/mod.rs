//! 处理管道模块
//!
//! 扫描 → 切分 → 批次 → 调度

pub mod batch;
pub mod filters;
pub mod scanner;
pub mod scheduler;
pub mod splitter;

pub use batch::{BatchQueue, BatchRequest, BlockTranslation, TranslationUnit};
pub use filters::{contains_cjk, BlockTextFilter};
pub use scanner::{BlockScanner, ScanStats};
pub use scheduler::{SchedulerPhase, SchedulerStats, TranslationScheduler};
pub use splitter::SentenceSplitter;
