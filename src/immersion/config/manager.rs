//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::immersion::error::{helpers::config_error, ImmersionError, ImmersionResult};

/// 扫描模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// 只处理主内容，跳过导航、页眉、页脚、侧栏
    #[default]
    MainContent,
    /// 处理整个页面
    WholePage,
}

/// 替换标记的显示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// 用词汇原词替换中文片段
    #[default]
    Replace,
    /// 保留中文片段，在标记上附加词汇原词
    Annotate,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Replace => "replace",
            DisplayMode::Annotate => "annotate",
        }
    }
}

/// 扫描配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: ScanMode,
    pub min_block_chars: usize,
    pub max_depth: usize,
    pub initial_delay_ms: u64,
    pub mutation_debounce_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::default(),
            min_block_chars: constants::MIN_BLOCK_CHARS,
            max_depth: constants::MAX_SCAN_DEPTH,
            initial_delay_ms: constants::INITIAL_SCAN_DELAY_MS,
            mutation_debounce_ms: constants::MUTATION_DEBOUNCE_MS,
        }
    }
}

/// 批次配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// 缓冲块数达到此值立即发送
    pub max_items: usize,
    /// 缓冲字符数达到此值立即发送
    pub max_chars: usize,
    /// 单个批次最多取出的块数
    pub batch_size: usize,
    pub debounce_ms: u64,
    pub inter_batch_delay_ms: u64,
    /// 首次失败后最多自动重试的次数，用尽后块被标记为错误
    pub max_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: constants::DEFAULT_MAX_ITEMS,
            max_chars: constants::DEFAULT_MAX_CHARS,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            debounce_ms: constants::DEFAULT_DEBOUNCE_MS,
            inter_batch_delay_ms: constants::BATCH_DELAY_MS,
            max_retries: constants::DEFAULT_MAX_RETRIES,
        }
    }
}

impl BatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

/// 匹配配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// 激进匹配（需要额外的词典查询）
    pub aggressive: bool,
    pub similarity_threshold: f32,
    pub max_window: usize,
    pub lookup_cache_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            aggressive: false,
            similarity_threshold: constants::AGGRESSIVE_THRESHOLD,
            max_window: constants::AGGRESSIVE_MAX_WINDOW,
            lookup_cache_size: constants::DEFAULT_LOOKUP_CACHE_SIZE,
        }
    }
}

/// 显示配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 在块后插入译文对照块
    pub bilingual: bool,
    pub mode: DisplayMode,
    pub show_original: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            bilingual: false,
            mode: DisplayMode::default(),
            show_original: true,
        }
    }
}

/// 站点白名单/黑名单
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// 翻译引擎配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    pub api_url: String,
    pub api_key: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: constants::DEFAULT_ENGINE.to_string(),
            api_url: constants::DEFAULT_API_URL.to_string(),
            api_key: None,
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImmersionConfig {
    pub enabled: bool,
    pub scan: ScanConfig,
    pub batch: BatchConfig,
    pub matching: MatchingConfig,
    pub display: DisplayConfig,
    pub sites: SiteConfig,
    pub engine: EngineConfig,
}

impl Default for ImmersionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan: ScanConfig::default(),
            batch: BatchConfig::default(),
            matching: MatchingConfig::default(),
            display: DisplayConfig::default(),
            sites: SiteConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ImmersionConfig {
    /// 验证配置
    pub fn validate(&self) -> ImmersionResult<()> {
        if self.batch.max_items == 0 {
            return Err(config_error("max_items 不能为0".to_string()));
        }

        if self.batch.max_chars == 0 {
            return Err(config_error("max_chars 不能为0".to_string()));
        }

        if self.batch.batch_size == 0 {
            return Err(config_error("batch_size 不能为0".to_string()));
        }

        if !(0.0..=1.0).contains(&self.matching.similarity_threshold) {
            return Err(config_error(
                "similarity_threshold 必须在 0 到 1 之间".to_string(),
            ));
        }

        if self.matching.max_window < 1 {
            return Err(config_error("max_window 不能小于1".to_string()));
        }

        if self.matching.aggressive && self.matching.lookup_cache_size == 0 {
            return Err(config_error(
                "启用激进匹配时查询缓存大小不能为0".to_string(),
            ));
        }

        if !(self.engine.api_url.starts_with("http://") || self.engine.api_url.starts_with("https://"))
        {
            return Err(config_error(format!(
                "API URL 必须以 http:// 或 https:// 开头: {}",
                self.engine.api_url
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{batch, engine, scan, EnvVar};

        if let Ok(api_url) = engine::ApiUrl::get() {
            tracing::info!("环境变量覆盖 API URL: {}", api_url);
            self.engine.api_url = api_url;
        }

        if let Ok(api_key) = engine::ApiKey::get() {
            self.engine.api_key = Some(api_key);
        }

        if let Ok(target_lang) = engine::TargetLang::get() {
            self.engine.target_lang = target_lang;
        }

        if let Ok(source_lang) = engine::SourceLang::get() {
            self.engine.source_lang = source_lang;
        }

        if let Ok(timeout) = engine::Timeout::get() {
            self.engine.timeout_secs = timeout.as_secs();
        }

        if let Ok(mode) = scan::Mode::get() {
            self.scan.mode = if mode == "whole-page" {
                ScanMode::WholePage
            } else {
                ScanMode::MainContent
            };
        }

        if let Ok(aggressive) = scan::Aggressive::get() {
            self.matching.aggressive = aggressive;
        }

        if let Ok(bilingual) = scan::Bilingual::get() {
            self.display.bilingual = bilingual;
        }

        if let Ok(max_items) = batch::MaxItems::get() {
            self.batch.max_items = max_items;
        }

        if let Ok(max_chars) = batch::MaxChars::get() {
            self.batch.max_chars = max_chars;
        }

        if let Ok(debounce) = batch::DebounceMs::get() {
            self.batch.debounce_ms = debounce.as_millis() as u64;
        }

        if let Ok(delay) = batch::InterBatchDelayMs::get() {
            self.batch.inter_batch_delay_ms = delay.as_millis() as u64;
        }
    }

    pub fn initial_scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan.initial_delay_ms)
    }

    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.scan.mutation_debounce_ms)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: ImmersionConfig,
    source: Option<String>,
}

impl ConfigManager {
    /// 创建新的配置管理器：文件 → 环境变量 → 验证
    pub fn new() -> ImmersionResult<Self> {
        let (mut config, source) = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config, source })
    }

    /// 从指定文件创建配置管理器
    pub fn from_path(path: &str) -> ImmersionResult<Self> {
        Self::load_dotenv();

        let expanded = shellexpand::tilde(path);
        let mut config = Self::load_from_file(expanded.as_ref())?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config,
            source: Some(expanded.into_owned()),
        })
    }

    /// 获取配置
    pub fn get_config(&self) -> &ImmersionConfig {
        &self.config
    }

    pub fn into_config(self) -> ImmersionConfig {
        self.config
    }

    /// 配置来源文件（未找到文件时为 None）
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn load_config() -> ImmersionResult<(ImmersionConfig, Option<String>)> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                let config = Self::load_from_file(&expanded_path)?;
                return Ok((config, Some(expanded_path.into_owned())));
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok((ImmersionConfig::default(), None))
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> ImmersionResult<ImmersionConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ImmersionError::Config(format!("读取配置文件失败 {}: {}", path, e)))?;

        Self::parse(path, &content)
    }

    /// 按扩展名解析配置内容
    pub fn parse(path: &str, content: &str) -> ImmersionResult<ImmersionConfig> {
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .map_err(|e| ImmersionError::Config(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(content)
                .map_err(|e| ImmersionError::Config(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> ImmersionResult<()> {
        let config = ImmersionConfig::default();
        let content = toml::to_string_pretty(&config)?;

        std::fs::write(path, content)
            .map_err(|e| ImmersionError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
