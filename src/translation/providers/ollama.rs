//! 本地 Ollama `/api/chat` 接口

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{non_empty_text, send_json, ApiProvider, Provider, ProviderCall};
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaProvider;

impl OllamaProvider {
    pub fn build_body(&self, call: &ProviderCall) -> Value {
        json!({
            "model": call.model,
            "messages": [
                { "role": "system", "content": call.system_prompt },
                { "role": "user", "content": call.text },
            ],
            "stream": false,
            "options": {
                "temperature": call.temperature,
                "num_predict": call.max_tokens,
            },
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn kind(&self) -> ApiProvider {
        ApiProvider::Ollama
    }

    async fn send(&self, client: &reqwest::Client, call: &ProviderCall) -> TranslationResult<String> {
        let request = client.post(&call.endpoint).json(&self.build_body(call));
        let value = send_json(ApiProvider::Ollama, request).await?;
        extract_chat(&value)
    }
}

/// 解析 `message.content`
pub fn extract_chat(value: &Value) -> TranslationResult<String> {
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(TranslationError::classify_message(error));
    }

    if value.get("done_reason").and_then(Value::as_str) == Some("length") {
        return Err(TranslationError::OutputTruncated(
            "ollama 达到 num_predict 上限".to_string(),
        ));
    }

    non_empty_text(value.pointer("/message/content"), ApiProvider::Ollama)
}
