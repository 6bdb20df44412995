//! OpenAI 兼容的 chat completions 接口（OpenAI 与 OpenRouter 共用）

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{non_empty_text, send_json, ApiProvider, Provider, ProviderCall};
use crate::translation::error::{TranslationError, TranslationResult};

const OPENROUTER_REFERER: &str = "https://github.com/transcraft/transcraft";
const OPENROUTER_TITLE: &str = "TransCraft";

/// chat completions 协议实现
#[derive(Debug, Clone, Copy)]
pub struct ChatCompletions {
    kind: ApiProvider,
}

impl ChatCompletions {
    pub fn openai() -> Self {
        Self {
            kind: ApiProvider::OpenAi,
        }
    }

    pub fn openrouter() -> Self {
        Self {
            kind: ApiProvider::OpenRouter,
        }
    }

    pub fn build_body(&self, call: &ProviderCall) -> Value {
        json!({
            "model": call.model,
            "messages": [
                { "role": "system", "content": call.system_prompt },
                { "role": "user", "content": call.text },
            ],
            "temperature": call.temperature,
            "max_tokens": call.max_tokens,
        })
    }
}

#[async_trait]
impl Provider for ChatCompletions {
    fn kind(&self) -> ApiProvider {
        self.kind
    }

    async fn send(&self, client: &reqwest::Client, call: &ProviderCall) -> TranslationResult<String> {
        let mut request = client.post(&call.endpoint).json(&self.build_body(call));
        if let Some(key) = &call.api_key {
            request = request.bearer_auth(key);
        }
        if self.kind == ApiProvider::OpenRouter {
            request = request
                .header("HTTP-Referer", OPENROUTER_REFERER)
                .header("X-Title", OPENROUTER_TITLE);
        }

        let value = send_json(self.kind, request).await?;
        extract_chat_completion(self.kind, &value)
    }
}

/// 解析 `choices[0].message.content`
///
/// OpenRouter 偶尔以 200 状态返回 `{ "error": ... }`，同样按消息归类。
pub fn extract_chat_completion(kind: ApiProvider, value: &Value) -> TranslationResult<String> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .unwrap_or("unknown error");
        return Err(TranslationError::classify_message(message));
    }

    let choice = value.pointer("/choices/0");
    match choice
        .and_then(|c| c.get("finish_reason"))
        .and_then(Value::as_str)
    {
        Some("length") => {
            return Err(TranslationError::OutputTruncated(format!(
                "{} 达到最大输出长度",
                kind
            )))
        }
        Some("content_filter") => {
            return Err(TranslationError::SafetyBlocked(format!(
                "{} 内容过滤",
                kind
            )))
        }
        _ => {}
    }

    non_empty_text(choice.and_then(|c| c.pointer("/message/content")), kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn call(endpoint: String) -> ProviderCall {
        ProviderCall {
            endpoint,
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            system_prompt: "translate".to_string(),
            text: "Hello".to_string(),
            max_tokens: 3686,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_build_body() {
        let body = ChatCompletions::openai().build_body(&call("http://x".into()));
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello");
        assert_eq!(body["max_tokens"], 3686);
    }

    #[test]
    fn test_extract_variants() {
        let ok = json!({"choices":[{"message":{"content":"你好"},"finish_reason":"stop"}]});
        assert_eq!(extract_chat_completion(ApiProvider::OpenAi, &ok).unwrap(), "你好");

        let truncated = json!({"choices":[{"message":{"content":"你"},"finish_reason":"length"}]});
        assert!(matches!(
            extract_chat_completion(ApiProvider::OpenAi, &truncated),
            Err(TranslationError::OutputTruncated(_))
        ));

        let filtered = json!({"choices":[{"message":{"content":""},"finish_reason":"content_filter"}]});
        assert!(matches!(
            extract_chat_completion(ApiProvider::OpenAi, &filtered),
            Err(TranslationError::SafetyBlocked(_))
        ));

        let empty = json!({"choices":[]});
        assert!(matches!(
            extract_chat_completion(ApiProvider::OpenAi, &empty),
            Err(TranslationError::Unknown { .. })
        ));

        let policy = json!({"error":{"message":"No endpoints found matching your data policy"}});
        assert!(matches!(
            extract_chat_completion(ApiProvider::OpenRouter, &policy),
            Err(TranslationError::DataPolicy(_))
        ));
    }

    #[tokio::test]
    async fn test_openrouter_request_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("x-title", OPENROUTER_TITLE))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"choices":[{"message":{"content":"你好"},"finish_reason":"stop"}]}),
            ))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let endpoint = format!("{}/api/v1/chat/completions", server.uri());
        let text = ChatCompletions::openrouter()
            .send(&client, &call(endpoint))
            .await
            .unwrap();
        assert_eq!(text, "你好");
    }

    #[tokio::test]
    async fn test_rate_limit_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error":{"message":"Rate limit reached"}})),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = ChatCompletions::openai()
            .send(&client, &call(server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.category(), crate::translation::error::ErrorCategory::RateLimit);
    }
}
