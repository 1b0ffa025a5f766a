//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，用于覆盖配置文件中的值

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量；未设置时返回错误，调用方通常忽略该错误保留配置文件的值
    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: "not set".to_string(),
            }),
        }
    }

    /// 变量是否已设置
    fn is_set() -> bool {
        env::var(Self::NAME).is_ok()
    }
}

/// 翻译引擎相关环境变量
pub mod engine {
    use super::*;

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "LW_ENGINE_API_URL";
        const DESCRIPTION: &'static str = "Translation API endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API URL must start with http:// or https://".to_string(),
                })
            }
        }
    }

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "LW_ENGINE_API_KEY";
        const DESCRIPTION: &'static str = "Translation API key (sent as a bearer token)";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key must not be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "LW_TARGET_LANG";
        const DESCRIPTION: &'static str = "Target language of the translation engine";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME, false)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "LW_SOURCE_LANG";
        const DESCRIPTION: &'static str = "Source language ('auto' for detection)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME, true)
        }
    }

    /// 请求超时
    pub struct Timeout;
    impl EnvVar<Duration> for Timeout {
        const NAME: &'static str = "LW_ENGINE_TIMEOUT";
        const DESCRIPTION: &'static str = "HTTP timeout for translation requests in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_u64(value, Self::NAME, 1, 300)?;
            Ok(Duration::from_secs(seconds))
        }
    }
}

/// 扫描与匹配相关环境变量
pub mod scan {
    use super::*;

    /// 扫描模式
    pub struct Mode;
    impl EnvVar<String> for Mode {
        const NAME: &'static str = "LW_SCAN_MODE";
        const DESCRIPTION: &'static str = "Scan mode: main-content or whole-page";

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                "main" | "main-content" | "main_content" => Ok("main-content".to_string()),
                "whole" | "whole-page" | "whole_page" | "all" => Ok("whole-page".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid scan mode '{}'. Use: main-content, whole-page", value),
                }),
            }
        }
    }

    /// 激进匹配模式
    pub struct Aggressive;
    impl EnvVar<bool> for Aggressive {
        const NAME: &'static str = "LW_AGGRESSIVE";
        const DESCRIPTION: &'static str = "Enable dictionary-backed aggressive matching";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 双语对照块
    pub struct Bilingual;
    impl EnvVar<bool> for Bilingual {
        const NAME: &'static str = "LW_BILINGUAL";
        const DESCRIPTION: &'static str = "Insert a translated companion block after each block";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 批次相关环境变量
pub mod batch {
    use super::*;

    /// 触发立即发送的块数量
    pub struct MaxItems;
    impl EnvVar<usize> for MaxItems {
        const NAME: &'static str = "LW_BATCH_MAX_ITEMS";
        const DESCRIPTION: &'static str = "Buffered blocks that trigger an immediate flush";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_u64(value, Self::NAME, 1, 1000).map(|n| n as usize)
        }
    }

    /// 触发立即发送的字符数
    pub struct MaxChars;
    impl EnvVar<usize> for MaxChars {
        const NAME: &'static str = "LW_BATCH_MAX_CHARS";
        const DESCRIPTION: &'static str = "Buffered characters that trigger an immediate flush";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_u64(value, Self::NAME, 10, 100_000).map(|n| n as usize)
        }
    }

    /// 防抖延迟
    pub struct DebounceMs;
    impl EnvVar<Duration> for DebounceMs {
        const NAME: &'static str = "LW_BATCH_DEBOUNCE_MS";
        const DESCRIPTION: &'static str = "Debounce delay in milliseconds before a partial flush";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_positive_u64(value, Self::NAME, 1, 60_000).map(Duration::from_millis)
        }
    }

    /// 批次间隔
    pub struct InterBatchDelayMs;
    impl EnvVar<Duration> for InterBatchDelayMs {
        const NAME: &'static str = "LW_BATCH_DELAY_MS";
        const DESCRIPTION: &'static str = "Delay in milliseconds between two batch dispatches";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_positive_u64(value, Self::NAME, 0, 60_000).map(Duration::from_millis)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_u64(value: &str, var_name: &str, min: u64, max: u64) -> EnvResult<u64> {
    let num: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_lang(value: &str, var_name: &str, allow_auto: bool) -> EnvResult<String> {
    let lang = value.trim().to_lowercase();
    if allow_auto && lang == "auto" {
        return Ok(lang);
    }
    // zh, en, zh-tw 之类
    let valid = !lang.is_empty()
        && lang.len() <= 8
        && lang.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
    if valid {
        Ok(lang)
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid language code '{}'", value),
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    let mut line = |name: &str, description: &str| {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    };

    line(engine::ApiUrl::NAME, engine::ApiUrl::DESCRIPTION);
    line(engine::ApiKey::NAME, engine::ApiKey::DESCRIPTION);
    line(engine::TargetLang::NAME, engine::TargetLang::DESCRIPTION);
    line(engine::SourceLang::NAME, engine::SourceLang::DESCRIPTION);
    line(engine::Timeout::NAME, engine::Timeout::DESCRIPTION);
    line(scan::Mode::NAME, scan::Mode::DESCRIPTION);
    line(scan::Aggressive::NAME, scan::Aggressive::DESCRIPTION);
    line(scan::Bilingual::NAME, scan::Bilingual::DESCRIPTION);
    line(batch::MaxItems::NAME, batch::MaxItems::DESCRIPTION);
    line(batch::MaxChars::NAME, batch::MaxChars::DESCRIPTION);
    line(batch::DebounceMs::NAME, batch::DebounceMs::DESCRIPTION);
    line(batch::InterBatchDelayMs::NAME, batch::InterBatchDelayMs::DESCRIPTION);

    docs
}
