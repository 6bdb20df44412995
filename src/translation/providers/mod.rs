//! LLM 服务商适配层
//!
//! 每个服务商只需实现"系统提示 + 用户文本 → 译文"这一个约定。
//! 派发器只依赖 [`Provider`] 接口，不关心具体的请求格式。

pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::translation::error::{QuotaCause, TranslationError, TranslationResult};

/// 支持的服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    OpenAi,
    Claude,
    Gemini,
    OpenRouter,
    Ollama,
}

impl ApiProvider {
    pub const ALL: [ApiProvider; 5] = [
        ApiProvider::OpenAi,
        ApiProvider::Claude,
        ApiProvider::Gemini,
        ApiProvider::OpenRouter,
        ApiProvider::Ollama,
    ];

    /// 设置与 API Key 表中使用的标识
    pub fn id(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "openai",
            ApiProvider::Claude => "claude",
            ApiProvider::Gemini => "gemini",
            ApiProvider::OpenRouter => "openrouter",
            ApiProvider::Ollama => "ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "gpt-4o-mini",
            ApiProvider::Claude => "claude-3-haiku-20240307",
            ApiProvider::Gemini => "gemini-1.5-flash",
            ApiProvider::OpenRouter => "deepseek/deepseek-r1-distill-llama-70b:free",
            ApiProvider::Ollama => "llama3.1:8b",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "https://api.openai.com/v1/chat/completions",
            ApiProvider::Claude => "https://api.anthropic.com/v1/messages",
            ApiProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            ApiProvider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
            ApiProvider::Ollama => "http://localhost:11434/api/chat",
        }
    }

    /// 本地 Ollama 不需要 API Key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ApiProvider::Ollama)
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ApiProvider::ALL
            .into_iter()
            .find(|provider| provider.id() == wanted)
            .ok_or_else(|| format!("未知的服务商: {}", s))
    }
}

/// 发往翻译后端的 API 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub selected_api: ApiProvider,
    pub api_keys: BTreeMap<String, String>,
    pub selected_model: Option<String>,
}

impl ApiConfig {
    pub fn api_key(&self) -> Option<&str> {
        self.api_keys
            .get(self.selected_api.id())
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
    }

    pub fn model(&self) -> &str {
        self.selected_model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.selected_api.default_model())
    }
}

/// 单次服务商调用的全部参数
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub text: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// 服务商接口
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ApiProvider;

    async fn send(&self, client: &reqwest::Client, call: &ProviderCall) -> TranslationResult<String>;
}

/// 按服务商取得对应实现
pub fn provider_for(kind: ApiProvider) -> Box<dyn Provider> {
    match kind {
        ApiProvider::OpenAi => Box::new(openai::ChatCompletions::openai()),
        ApiProvider::OpenRouter => Box::new(openai::ChatCompletions::openrouter()),
        ApiProvider::Claude => Box::new(claude::ClaudeProvider),
        ApiProvider::Gemini => Box::new(gemini::GeminiProvider),
        ApiProvider::Ollama => Box::new(ollama::OllamaProvider),
    }
}

/// 发送请求并解析 JSON，非 2xx 响应按状态码归类
pub(crate) async fn send_json(
    kind: ApiProvider,
    request: reqwest::RequestBuilder,
) -> TranslationResult<Value> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(classify_http_failure(kind, status.as_u16(), &body));
    }

    serde_json::from_str(&body)
        .map_err(|e| TranslationError::unknown(format!("{} 返回无效的 JSON: {}", kind, e)))
}

/// 从错误响应体中取出可读消息
pub(crate) fn error_message_from_body(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    value
        .pointer("/error/message")
        .or_else(|| value.get("error"))
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// 按 HTTP 状态码与消息内容把失败归类
pub fn classify_http_failure(kind: ApiProvider, status: u16, body: &str) -> TranslationError {
    let message = error_message_from_body(body);
    let lower = message.to_lowercase();

    if kind == ApiProvider::OpenRouter
        && lower.contains("no endpoints found matching your data policy")
    {
        return TranslationError::DataPolicy(message);
    }

    match status {
        429 => TranslationError::QuotaExceeded(QuotaCause::RateLimited, message),
        401 => TranslationError::AuthError(message),
        400 if lower.contains("api key not valid") || lower.contains("api_key_invalid") => {
            TranslationError::AuthError(message)
        }
        402 | 403 => TranslationError::QuotaExceeded(QuotaCause::Billing, message),
        _ if lower.contains("quota") => {
            TranslationError::QuotaExceeded(QuotaCause::Exhausted, message)
        }
        _ => TranslationError::Unknown {
            status: Some(status),
            message,
        },
    }
}

/// 取出非空文本字段
pub(crate) fn non_empty_text(value: Option<&Value>, kind: ApiProvider) -> TranslationResult<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| TranslationError::unknown(format!("{} 返回无效的响应结构", kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_ids_round_trip() {
        for provider in ApiProvider::ALL {
            assert_eq!(provider.id().parse::<ApiProvider>().unwrap(), provider);
        }
        assert!("bing".parse::<ApiProvider>().is_err());
        assert_eq!(
            serde_json::to_string(&ApiProvider::OpenRouter).unwrap(),
            "\"openrouter\""
        );
    }

    #[test]
    fn test_status_classification() {
        let body = r#"{"error":{"message":"Rate limit reached"}}"#;
        assert!(matches!(
            classify_http_failure(ApiProvider::OpenAi, 429, body),
            TranslationError::QuotaExceeded(QuotaCause::RateLimited, ref m) if m == "Rate limit reached"
        ));
        assert!(matches!(
            classify_http_failure(ApiProvider::Claude, 401, "{}"),
            TranslationError::AuthError(_)
        ));
        assert!(matches!(
            classify_http_failure(ApiProvider::OpenAi, 402, "no money"),
            TranslationError::QuotaExceeded(QuotaCause::Billing, _)
        ));
        assert!(matches!(
            classify_http_failure(ApiProvider::Gemini, 400, r#"{"error":{"message":"API key not valid. Please pass a valid API key."}}"#),
            TranslationError::AuthError(_)
        ));
        assert_eq!(
            classify_http_failure(ApiProvider::Ollama, 503, "busy").category(),
            crate::translation::error::ErrorCategory::ServiceUnavailable
        );
    }

    #[test]
    fn test_data_policy_is_openrouter_specific() {
        let body = r#"{"error":{"message":"No endpoints found matching your data policy"}}"#;
        assert!(matches!(
            classify_http_failure(ApiProvider::OpenRouter, 404, body),
            TranslationError::DataPolicy(_)
        ));
        assert!(matches!(
            classify_http_failure(ApiProvider::OpenAi, 404, body),
            TranslationError::Unknown { status: Some(404), .. }
        ));
    }

    #[test]
    fn test_api_config_wire_shape() {
        let mut keys = BTreeMap::new();
        keys.insert("claude".to_string(), "k".to_string());
        let config = ApiConfig {
            selected_api: ApiProvider::Claude,
            api_keys: keys,
            selected_model: None,
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["selectedApi"], "claude");
        assert_eq!(json["apiKeys"]["claude"], "k");
        assert_eq!(config.model(), "claude-3-haiku-20240307");
        assert_eq!(config.api_key(), Some("k"));
    }
}
