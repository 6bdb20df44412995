//! Google Gemini generateContent 接口

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{non_empty_text, send_json, ApiProvider, Provider, ProviderCall};
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiProvider;

impl GeminiProvider {
    /// `{base}/{model}:generateContent`
    pub fn endpoint_for(base: &str, model: &str) -> String {
        format!("{}/{}:generateContent", base.trim_end_matches('/'), model)
    }

    /// Gemini 没有独立的系统角色，系统提示与正文合并为一条用户消息
    pub fn build_body(&self, call: &ProviderCall) -> Value {
        json!({
            "contents": [{
                "parts": [{ "text": format!("{}\n\n{}", call.system_prompt, call.text) }],
            }],
            "generationConfig": {
                "temperature": call.temperature,
                "maxOutputTokens": call.max_tokens,
            },
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ApiProvider {
        ApiProvider::Gemini
    }

    async fn send(&self, client: &reqwest::Client, call: &ProviderCall) -> TranslationResult<String> {
        let url = Self::endpoint_for(&call.endpoint, &call.model);
        let mut request = client.post(url).json(&self.build_body(call));
        if let Some(key) = &call.api_key {
            request = request.query(&[("key", key)]);
        }

        let value = send_json(ApiProvider::Gemini, request).await?;
        extract_candidate(&value)
    }
}

/// 解析 `candidates[0].content.parts[0].text`
pub fn extract_candidate(value: &Value) -> TranslationResult<String> {
    if let Some(reason) = value
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        return Err(TranslationError::SafetyBlocked(format!(
            "gemini 拦截了输入: {}",
            reason
        )));
    }

    let candidate = value.pointer("/candidates/0");
    match candidate
        .and_then(|c| c.get("finishReason"))
        .and_then(Value::as_str)
    {
        Some("MAX_TOKENS") => {
            return Err(TranslationError::OutputTruncated(
                "gemini 达到 maxOutputTokens".to_string(),
            ))
        }
        Some("SAFETY") | Some("PROHIBITED_CONTENT") => {
            return Err(TranslationError::SafetyBlocked(
                "gemini 安全策略拦截了输出".to_string(),
            ))
        }
        _ => {}
    }

    non_empty_text(
        candidate.and_then(|c| c.pointer("/content/parts/0/text")),
        ApiProvider::Gemini,
    )
}
