//! Anthropic Messages 接口

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{non_empty_text, send_json, ApiProvider, Provider, ProviderCall};
use crate::translation::error::{TranslationError, TranslationResult};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeProvider;

impl ClaudeProvider {
    pub fn build_body(&self, call: &ProviderCall) -> Value {
        json!({
            "model": call.model,
            "max_tokens": call.max_tokens,
            "temperature": call.temperature,
            "system": call.system_prompt,
            "messages": [
                { "role": "user", "content": call.text },
            ],
        })
    }
}

#[async_trait]
impl Provider for ClaudeProvider {
    fn kind(&self) -> ApiProvider {
        ApiProvider::Claude
    }

    async fn send(&self, client: &reqwest::Client, call: &ProviderCall) -> TranslationResult<String> {
        let mut request = client
            .post(&call.endpoint)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_body(call));
        if let Some(key) = &call.api_key {
            request = request.header("x-api-key", key);
        }

        let value = send_json(ApiProvider::Claude, request).await?;
        extract_message(&value)
    }
}

/// 解析 `content[0].text`
pub fn extract_message(value: &Value) -> TranslationResult<String> {
    match value.get("stop_reason").and_then(Value::as_str) {
        Some("max_tokens") => {
            return Err(TranslationError::OutputTruncated(
                "claude 达到 max_tokens".to_string(),
            ))
        }
        Some("refusal") => {
            return Err(TranslationError::SafetyBlocked(
                "claude 拒绝了该请求".to_string(),
            ))
        }
        _ => {}
    }

    non_empty_text(value.pointer("/content/0/text"), ApiProvider::Claude)
}
