//! 翻译服务接口
//!
//! 调度器只依赖 [`TranslationGateway`]。自带的 [`HttpGateway`] 兼容 DeepLX 的
//! JSON 接口：请求 `{text, source_lang, target_lang}`，响应 `{data}`。

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::immersion::config::EngineConfig;
use crate::immersion::error::{helpers::provider_error, ImmersionResult};

/// 翻译服务接口
#[async_trait(?Send)]
pub trait TranslationGateway {
    /// 翻译合并后的文本，任何失败都视为整批失败
    async fn translate(
        &self,
        engine: &EngineConfig,
        text: &str,
        target_lang: &str,
    ) -> ImmersionResult<String>;
}

/// 翻译请求体
#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a> {
    pub text: &'a str,
    pub source_lang: &'a str,
    pub target_lang: &'a str,
}

/// 翻译响应体
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub code: Option<i64>,
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// HTTP 翻译服务
#[derive(Clone)]
pub struct HttpGateway {
    http: Client,
}

impl HttpGateway {
    /// 按引擎配置的超时创建客户端
    pub fn new(engine: &EngineConfig) -> ImmersionResult<Self> {
        let http = Client::builder()
            .timeout(engine.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait(?Send)]
impl TranslationGateway for HttpGateway {
    async fn translate(
        &self,
        engine: &EngineConfig,
        text: &str,
        target_lang: &str,
    ) -> ImmersionResult<String> {
        let body = TranslateRequest {
            text,
            source_lang: &engine.source_lang,
            target_lang,
        };

        let mut request = self.http.post(&engine.api_url).json(&body);
        if let Some(key) = &engine.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!(
            "发送翻译请求: {} 字符 -> {} ({})",
            text.chars().count(),
            engine.api_url,
            engine.name
        );

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(provider_error(format!(
                "HTTP {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| provider_error(format!("响应格式错误: {}", e)))?;

        match parsed.code {
            Some(code) if code != 200 => Err(provider_error(format!(
                "服务返回错误码 {}: {}",
                code,
                parsed.message.unwrap_or_default()
            ))),
            _ => parsed
                .data
                .ok_or_else(|| provider_error("响应中缺少 data 字段".to_string())),
        }
    }
}
