//! 配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;
pub mod sites;

// 重新导出主要类型
pub use manager::{
    BatchConfig, ConfigManager, DisplayConfig, DisplayMode, EngineConfig, ImmersionConfig,
    MatchingConfig, ScanConfig, ScanMode, SiteConfig,
};
pub use sites::SiteFilter;

/// 配置常量
pub mod constants {
    // 批次处理相关
    pub const DEFAULT_MAX_ITEMS: usize = 5;
    pub const DEFAULT_MAX_CHARS: usize = 2000;
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_DEBOUNCE_MS: u64 = 400;
    pub const BATCH_DELAY_MS: u64 = 100;
    pub const DEFAULT_MAX_RETRIES: u32 = 2;

    /// 合并请求中句子之间的分隔符
    pub const BATCH_DELIMITER: &str = "\n@@@\n";
    /// 拆分响应时使用的分隔标记（容忍两侧空白被服务改写）
    pub const BATCH_DELIMITER_TOKEN: &str = "@@@";

    // 扫描相关
    pub const MIN_BLOCK_CHARS: usize = 2;
    pub const MAX_SCAN_DEPTH: usize = 256;
    pub const INITIAL_SCAN_DELAY_MS: u64 = 500;
    pub const MUTATION_DEBOUNCE_MS: u64 = 800;
    pub const GARBAGE_MAX_CHARS: usize = 40;
    pub const GARBAGE_DELIMITER_RATIO: f32 = 0.2;

    // 匹配相关
    pub const AGGRESSIVE_THRESHOLD: f32 = 0.6;
    pub const AGGRESSIVE_MAX_WINDOW: usize = 3;
    pub const DEFAULT_LOOKUP_CACHE_SIZE: usize = 512;

    // 默认API设置
    pub const DEFAULT_ENGINE: &str = "deeplx";
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";
    pub const DEFAULT_SOURCE_LANG: &str = "zh";
    pub const DEFAULT_TARGET_LANG: &str = "en";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// 技术性/非文本元素，连同子树一起跳过
    pub const TECHNICAL_ELEMENTS: &[&str] = &[
        "script", "style", "noscript", "template", "code", "pre", "textarea", "input", "select",
        "option", "button", "svg", "math", "canvas", "video", "audio", "iframe", "object",
        "embed", "img", "head", "meta", "link", "title",
    ];

    /// 页面框架元素，仅在主内容模式下跳过
    pub const CHROME_ELEMENTS: &[&str] = &["nav", "header", "footer", "aside"];

    /// 页面框架的 ARIA 角色
    pub const CHROME_ROLES: &[&str] = &["navigation", "banner", "contentinfo"];

    /// 行内元素，属于所在块的文本；其余元素都可以独立成块
    pub const INLINE_ELEMENTS: &[&str] = &[
        "a", "abbr", "b", "bdi", "bdo", "big", "br", "cite", "data", "del", "dfn", "em", "font",
        "i", "ins", "kbd", "label", "mark", "q", "rp", "rt", "ruby", "s", "samp", "small",
        "span", "strike", "strong", "sub", "sup", "time", "tt", "u", "var", "wbr",
    ];

    /// 导航碎片中常见的分隔字符
    pub const GARBAGE_DELIMITERS: &[char] = &['|', '/', '>', '»', '·', '•', '-', '_', '›'];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "lexiweave.toml",
        ".lexiweave.toml",
        "lexiweave.json",
        "~/.config/lexiweave/config.toml",
        "/etc/lexiweave/config.toml",
    ];
}
