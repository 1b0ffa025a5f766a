//! 词汇替换模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 词汇替换管道错误类型
#[derive(Error, Debug, Clone)]
pub enum ImmersionError {
    /// 翻译服务错误（网络、认证、响应格式）
    #[error("翻译服务错误: {0}")]
    Provider(String),

    /// 词典查询错误（仅影响激进匹配）
    #[error("词典查询失败: {0}")]
    Lookup(String),

    /// 句子或替换区间无法在当前文本中定位
    #[error("文本偏移漂移: {0}")]
    OffsetDrift(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ImmersionError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            ImmersionError::Provider(_) => true,
            ImmersionError::Lookup(_) => true,
            ImmersionError::OffsetDrift(_) => true,
            ImmersionError::Io(_) => true,
            ImmersionError::Config(_) => false,
            ImmersionError::InvalidInput(_) => false,
            ImmersionError::Serialization(_) => false,
            ImmersionError::Internal(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ImmersionError::Provider(_) => ErrorSeverity::Warning,
            ImmersionError::Lookup(_) => ErrorSeverity::Warning,
            ImmersionError::OffsetDrift(_) => ErrorSeverity::Info,
            ImmersionError::Config(_) => ErrorSeverity::Critical,
            ImmersionError::InvalidInput(_) => ErrorSeverity::Info,
            ImmersionError::Io(_) => ErrorSeverity::Error,
            ImmersionError::Serialization(_) => ErrorSeverity::Error,
            ImmersionError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImmersionError::Provider(_) => ErrorCategory::Provider,
            ImmersionError::Lookup(_) => ErrorCategory::Lookup,
            ImmersionError::OffsetDrift(_) => ErrorCategory::Drift,
            ImmersionError::Config(_) => ErrorCategory::Configuration,
            ImmersionError::InvalidInput(_) => ErrorCategory::Input,
            ImmersionError::Io(_) => ErrorCategory::Io,
            ImmersionError::Serialization(_) => ErrorCategory::Serialization,
            ImmersionError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let wrap = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            ImmersionError::Provider(msg) => ImmersionError::Provider(wrap(msg)),
            ImmersionError::Lookup(msg) => ImmersionError::Lookup(wrap(msg)),
            ImmersionError::OffsetDrift(msg) => ImmersionError::OffsetDrift(wrap(msg)),
            ImmersionError::Config(msg) => ImmersionError::Config(wrap(msg)),
            ImmersionError::InvalidInput(msg) => ImmersionError::InvalidInput(wrap(msg)),
            ImmersionError::Io(msg) => ImmersionError::Io(wrap(msg)),
            ImmersionError::Serialization(msg) => ImmersionError::Serialization(wrap(msg)),
            ImmersionError::Internal(msg) => ImmersionError::Internal(wrap(msg)),
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Provider,
    Lookup,
    Drift,
    Configuration,
    Input,
    Io,
    Serialization,
    Internal,
}

impl From<std::io::Error> for ImmersionError {
    fn from(error: std::io::Error) -> Self {
        ImmersionError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for ImmersionError {
    fn from(error: serde_json::Error) -> Self {
        ImmersionError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for ImmersionError {
    fn from(error: toml::de::Error) -> Self {
        ImmersionError::Config(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for ImmersionError {
    fn from(error: toml::ser::Error) -> Self {
        ImmersionError::Serialization(format!("TOML序列化错误: {}", error))
    }
}

impl From<reqwest::Error> for ImmersionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ImmersionError::Provider(format!("请求超时: {}", error))
        } else {
            ImmersionError::Provider(error.to_string())
        }
    }
}

impl From<url::ParseError> for ImmersionError {
    fn from(error: url::ParseError) -> Self {
        ImmersionError::InvalidInput(format!("URL解析错误: {}", error))
    }
}

impl From<regex::Error> for ImmersionError {
    fn from(error: regex::Error) -> Self {
        ImmersionError::Config(format!("正则表达式无效: {}", error))
    }
}

/// 错误结果类型别名
pub type ImmersionResult<T> = Result<T, ImmersionError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &ImmersionError) {
        self.total_errors += 1;
        *self.by_category.entry(error.category()).or_insert(0) += 1;
        *self.by_severity.entry(error.severity()).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }
    }

    /// 某一类别的错误数
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &ImmersionError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::debug!("词汇替换信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("词汇替换警告: {}", error),
            ErrorSeverity::Error => tracing::error!("词汇替换错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("词汇替换严重错误: {}", error),
        }
    }

    /// 创建翻译服务错误
    pub fn provider_error<T: fmt::Display>(msg: T) -> ImmersionError {
        ImmersionError::Provider(msg.to_string())
    }

    /// 创建词典查询错误
    pub fn lookup_error<T: fmt::Display>(msg: T) -> ImmersionError {
        ImmersionError::Lookup(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> ImmersionError {
        ImmersionError::Config(msg.to_string())
    }
}
