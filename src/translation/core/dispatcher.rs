//! 批次派发器
//!
//! 每个批次一次请求：检查运行时是否存活，把合并文本交给翻译后端，
//! 与超时竞争，最后对结果做校验与分级日志。派发器不关心由哪个服务商完成翻译。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::translation::error::{QuotaCause, TranslationError, TranslationResult};
use crate::translation::providers::ApiConfig;

/// 运行时存活标记
///
/// 宿主（例如扩展被重新加载）失效后调用 [`RuntimeHandle::invalidate`]，
/// 之后的每次派发都会立即以 `ExtensionInvalidated` 失败。
#[derive(Debug, Clone)]
pub struct RuntimeHandle(Arc<AtomicBool>);

impl Default for RuntimeHandle {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl RuntimeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 发往翻译后端的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub text: String,
    pub target_language: String,
    pub api_config: ApiConfig,
    pub expert_mode: String,
}

/// 后端回复的线上格式：`{ translation }` 或 `{ error, detail? }`
///
/// `error` 是给人看的消息；`detail` 携带错误的原始分类，接收方据此还原出同一个错误。
/// 只有 `error` 的旧格式回复按关键字归类。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendReply {
    Translation {
        translation: String,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<ErrorDetail>,
    },
}

impl BackendReply {
    pub fn into_result(self) -> TranslationResult<String> {
        match self {
            BackendReply::Translation { translation } => Ok(translation),
            BackendReply::Error {
                detail: Some(detail),
                ..
            } => Err(detail.into()),
            BackendReply::Error { error, detail: None } => {
                Err(TranslationError::classify_message(&error))
            }
        }
    }
}

impl From<TranslationResult<String>> for BackendReply {
    fn from(result: TranslationResult<String>) -> Self {
        match result {
            Ok(translation) => BackendReply::Translation { translation },
            Err(error) => BackendReply::Error {
                error: error.to_string(),
                detail: Some(ErrorDetail::from(&error)),
            },
        }
    }
}

/// 错误分类的线上表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorDetail {
    RateLimited { message: String },
    Billing { message: String },
    QuotaExhausted { message: String },
    Network { message: String },
    Auth { message: String },
    ExtensionInvalidated,
    Timeout { millis: u64 },
    SafetyBlocked { message: String },
    OutputTruncated { message: String },
    DataPolicy { message: String },
    Unknown {
        #[serde(default)]
        status: Option<u16>,
        message: String,
    },
}

impl From<&TranslationError> for ErrorDetail {
    fn from(error: &TranslationError) -> Self {
        match error.clone() {
            TranslationError::QuotaExceeded(QuotaCause::RateLimited, message) => {
                ErrorDetail::RateLimited { message }
            }
            TranslationError::QuotaExceeded(QuotaCause::Billing, message) => {
                ErrorDetail::Billing { message }
            }
            TranslationError::QuotaExceeded(QuotaCause::Exhausted, message) => {
                ErrorDetail::QuotaExhausted { message }
            }
            TranslationError::NetworkError(message) => ErrorDetail::Network { message },
            TranslationError::AuthError(message) => ErrorDetail::Auth { message },
            TranslationError::ExtensionInvalidated => ErrorDetail::ExtensionInvalidated,
            TranslationError::Timeout(duration) => ErrorDetail::Timeout {
                millis: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            },
            TranslationError::SafetyBlocked(message) => ErrorDetail::SafetyBlocked { message },
            TranslationError::OutputTruncated(message) => ErrorDetail::OutputTruncated { message },
            TranslationError::DataPolicy(message) => ErrorDetail::DataPolicy { message },
            TranslationError::Unknown { status, message } => ErrorDetail::Unknown { status, message },
        }
    }
}

impl From<ErrorDetail> for TranslationError {
    fn from(detail: ErrorDetail) -> Self {
        match detail {
            ErrorDetail::RateLimited { message } => {
                TranslationError::QuotaExceeded(QuotaCause::RateLimited, message)
            }
            ErrorDetail::Billing { message } => {
                TranslationError::QuotaExceeded(QuotaCause::Billing, message)
            }
            ErrorDetail::QuotaExhausted { message } => {
                TranslationError::QuotaExceeded(QuotaCause::Exhausted, message)
            }
            ErrorDetail::Network { message } => TranslationError::NetworkError(message),
            ErrorDetail::Auth { message } => TranslationError::AuthError(message),
            ErrorDetail::ExtensionInvalidated => TranslationError::ExtensionInvalidated,
            ErrorDetail::Timeout { millis } => TranslationError::Timeout(Duration::from_millis(millis)),
            ErrorDetail::SafetyBlocked { message } => TranslationError::SafetyBlocked(message),
            ErrorDetail::OutputTruncated { message } => TranslationError::OutputTruncated(message),
            ErrorDetail::DataPolicy { message } => TranslationError::DataPolicy(message),
            ErrorDetail::Unknown { status, message } => TranslationError::Unknown { status, message },
        }
    }
}

/// 翻译后端
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, request: &TranslationRequest) -> TranslationResult<String>;
}

/// 一次运行内不变的请求参数
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub target_language: String,
    pub api_config: ApiConfig,
    pub expert_mode: String,
}

/// 批次派发器
pub struct Dispatcher {
    backend: Arc<dyn TranslationBackend>,
    runtime: RuntimeHandle,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn TranslationBackend>, runtime: RuntimeHandle, timeout: Duration) -> Self {
        Self {
            backend,
            runtime,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 派发一个批次，返回整段译文
    pub async fn dispatch(&self, text: &str, context: &DispatchContext) -> TranslationResult<String> {
        let result = self.send(text, context).await;
        if let Err(error) = &result {
            log_failure(error);
        }
        result
    }

    async fn send(&self, text: &str, context: &DispatchContext) -> TranslationResult<String> {
        if !self.runtime.is_alive() {
            return Err(TranslationError::ExtensionInvalidated);
        }

        let request = TranslationRequest {
            text: text.to_string(),
            target_language: context.target_language.clone(),
            api_config: context.api_config.clone(),
            expert_mode: context.expert_mode.clone(),
        };

        tracing::debug!(
            "派发批次: {} 字符 → {} ({})",
            text.chars().count(),
            request.api_config.selected_api,
            request.api_config.model()
        );

        // 超时后丢弃后端的 future，迟到的结果不会被处理
        let translation = tokio::time::timeout(self.timeout, self.backend.translate(&request))
            .await
            .map_err(|_| TranslationError::Timeout(self.timeout))??;

        if translation.trim().is_empty() {
            return Err(TranslationError::unknown("服务商返回了空译文"));
        }
        Ok(translation)
    }
}

fn log_failure(error: &TranslationError) {
    if error.is_fatal() || !error.is_expected() {
        tracing::error!("批次翻译失败 [{:?}]: {}", error.severity(), error);
    } else {
        tracing::warn!("批次翻译失败 [{:?}]: {}", error.severity(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::providers::ApiProvider;
    use std::collections::BTreeMap;

    struct Echo;

    #[async_trait]
    impl TranslationBackend for Echo {
        async fn translate(&self, request: &TranslationRequest) -> TranslationResult<String> {
            Ok(format!("[{}] {}", request.target_language, request.text))
        }
    }

    struct Slow;

    #[async_trait]
    impl TranslationBackend for Slow {
        async fn translate(&self, _request: &TranslationRequest) -> TranslationResult<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    struct Blank;

    #[async_trait]
    impl TranslationBackend for Blank {
        async fn translate(&self, _request: &TranslationRequest) -> TranslationResult<String> {
            Ok("  \n".to_string())
        }
    }

    fn context() -> DispatchContext {
        DispatchContext {
            target_language: "zh-TW".to_string(),
            api_config: ApiConfig {
                selected_api: ApiProvider::OpenAi,
                api_keys: BTreeMap::new(),
                selected_model: None,
            },
            expert_mode: "general".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_returns_translation() {
        let dispatcher = Dispatcher::new(Arc::new(Echo), RuntimeHandle::new(), Duration::from_secs(5));
        let result = dispatcher.dispatch("Hello", &context()).await.unwrap();
        assert_eq!(result, "[zh-TW] Hello");
    }

    #[tokio::test]
    async fn test_invalidated_runtime_fails_fast() {
        let runtime = RuntimeHandle::new();
        runtime.invalidate();
        let dispatcher = Dispatcher::new(Arc::new(Echo), runtime, Duration::from_secs(5));
        let error = dispatcher.dispatch("Hello", &context()).await.unwrap_err();
        assert_eq!(error, TranslationError::ExtensionInvalidated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_discards_late_result() {
        let dispatcher = Dispatcher::new(Arc::new(Slow), RuntimeHandle::new(), Duration::from_secs(15));
        let error = dispatcher.dispatch("Hello", &context()).await.unwrap_err();
        assert_eq!(error, TranslationError::Timeout(Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn test_blank_translation_is_rejected() {
        let dispatcher = Dispatcher::new(Arc::new(Blank), RuntimeHandle::new(), Duration::from_secs(5));
        let error = dispatcher.dispatch("Hello", &context()).await.unwrap_err();
        assert!(matches!(error, TranslationError::Unknown { .. }));
    }

    #[test]
    fn test_reply_wire_format() {
        let ok: BackendReply = serde_json::from_str(r#"{"translation":"你好"}"#).unwrap();
        assert_eq!(ok.into_result().unwrap(), "你好");

        let err: BackendReply =
            serde_json::from_str(r#"{"error":"OpenAI API error: 401 invalid api key"}"#).unwrap();
        assert!(matches!(err.into_result(), Err(TranslationError::AuthError(_))));

        let request = TranslationRequest {
            text: "Hi".to_string(),
            target_language: "ja".to_string(),
            api_config: context().api_config,
            expert_mode: "general".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["targetLanguage"], "ja");
        assert_eq!(json["apiConfig"]["selectedApi"], "openai");
    }

    #[test]
    fn test_error_reply_keeps_classification() {
        let errors = vec![
            TranslationError::QuotaExceeded(QuotaCause::RateLimited, "slow down".into()),
            TranslationError::QuotaExceeded(QuotaCause::Billing, "no credit".into()),
            TranslationError::QuotaExceeded(QuotaCause::Exhausted, "monthly cap".into()),
            TranslationError::NetworkError("connection reset".into()),
            TranslationError::AuthError("bad key".into()),
            TranslationError::ExtensionInvalidated,
            TranslationError::Timeout(Duration::from_millis(1500)),
            TranslationError::SafetyBlocked("flagged".into()),
            TranslationError::OutputTruncated("max tokens".into()),
            TranslationError::DataPolicy("no endpoint".into()),
            TranslationError::Unknown {
                status: Some(503),
                message: "down".into(),
            },
            TranslationError::Unknown {
                status: Some(500),
                message: "boom".into(),
            },
            TranslationError::unknown("odd"),
        ];

        for error in errors {
            let reply = BackendReply::from(Err(error.clone()));
            let json = serde_json::to_string(&reply).unwrap();
            let parsed: BackendReply = serde_json::from_str(&json).unwrap();
            let restored = parsed.into_result().unwrap_err();
            assert_eq!(restored, error, "wire form: {}", json);
            assert_eq!(restored.category(), error.category());
            assert_eq!(restored.is_fatal(), error.is_fatal());
        }
    }

    #[test]
    fn test_error_reply_carries_readable_message() {
        let reply = BackendReply::from(Err(TranslationError::AuthError("bad key".into())));
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["error"], "认证失败: bad key");
        assert_eq!(json["detail"]["kind"], "auth");
    }
}
