//! 站点过滤
//!
//! 名单中的条目若包含 `*` 则按通配符匹配整个主机名，否则按子串匹配。

use regex::Regex;
use url::Url;

use super::SiteConfig;
use crate::immersion::error::ImmersionResult;

#[derive(Debug, Clone)]
enum SitePattern {
    Substring(String),
    Glob(Regex),
}

impl SitePattern {
    fn compile(entry: &str) -> ImmersionResult<Option<Self>> {
        let entry = entry.trim().to_lowercase();
        if entry.is_empty() {
            return Ok(None);
        }

        if !entry.contains('*') {
            return Ok(Some(SitePattern::Substring(entry)));
        }

        let body = entry
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", body))?;
        Ok(Some(SitePattern::Glob(regex)))
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            SitePattern::Substring(needle) => host.contains(needle.as_str()),
            SitePattern::Glob(regex) => regex.is_match(host),
        }
    }
}

/// 编译后的站点名单
#[derive(Debug, Clone, Default)]
pub struct SiteFilter {
    allow: Vec<SitePattern>,
    deny: Vec<SitePattern>,
}

impl SiteFilter {
    pub fn from_config(config: &SiteConfig) -> ImmersionResult<Self> {
        let compile = |entries: &[String]| -> ImmersionResult<Vec<SitePattern>> {
            let mut patterns = Vec::with_capacity(entries.len());
            for entry in entries {
                if let Some(pattern) = SitePattern::compile(entry)? {
                    patterns.push(pattern);
                }
            }
            Ok(patterns)
        };

        Ok(Self {
            allow: compile(&config.allow)?,
            deny: compile(&config.deny)?,
        })
    }

    /// 黑名单优先；白名单为空时允许所有站点
    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        if self.deny.iter().any(|p| p.matches(&host)) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|p| p.matches(&host))
    }

    /// 按 URL 的主机名判断；无法解析的地址只在两个名单都为空时允许
    pub fn is_allowed_url(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => self.is_allowed_host(parsed.host_str().unwrap_or("")),
            Err(e) => {
                tracing::debug!("无法解析页面地址 {}: {}", url, e);
                self.allow.is_empty() && self.deny.is_empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(allow: &[&str], deny: &[&str]) -> SiteFilter {
        SiteFilter::from_config(&SiteConfig {
            allow: allow.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
        })
        .expect("compile")
    }

    #[test]
    fn test_empty_lists_allow_everything() {
        let filter = filter(&[], &[]);
        assert!(filter.is_allowed_url("https://news.example.com/a"));
        assert!(filter.is_allowed_url("not a url"));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        let filter = filter(&["example.com"], &["ads.example.com"]);
        assert!(filter.is_allowed_url("https://www.example.com/"));
        assert!(!filter.is_allowed_url("https://ads.example.com/banner"));
        assert!(!filter.is_allowed_url("https://other.org/"));
    }

    #[test]
    fn test_glob_matches_whole_host() {
        let filter = filter(&["*.zhihu.com"], &[]);
        assert!(filter.is_allowed_host("www.zhihu.com"));
        assert!(filter.is_allowed_host("WWW.ZHIHU.COM"));
        assert!(!filter.is_allowed_host("zhihu.com.evil.org"));
    }

    #[test]
    fn test_glob_escapes_dots() {
        let filter = filter(&[], &["a.b*"]);
        assert!(!filter.is_allowed_host("a.bc"));
        assert!(filter.is_allowed_host("axbc"));
    }
}
