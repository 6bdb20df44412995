//! 翻译模块统一错误处理
//!
//! `TranslationError` 描述单个批次派发失败的原因，`ConfigError` 描述设置加载与校验问题。

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::translation::providers::ApiProvider;

/// 配额类错误的具体成因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaCause {
    /// 429，请求频率过高
    RateLimited,
    /// 402/403，余额不足或权限不足
    Billing,
    /// 服务端明确提示配额用尽
    Exhausted,
}

impl fmt::Display for QuotaCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuotaCause::RateLimited => "请求频率过高",
            QuotaCause::Billing => "余额或权限不足",
            QuotaCause::Exhausted => "配额已用尽",
        };
        f.write_str(label)
    }
}

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 配额、速率或账单限制
    #[error("{0}: {1}")]
    QuotaExceeded(QuotaCause, String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// API Key 无效或缺失
    #[error("认证失败: {0}")]
    AuthError(String),

    /// 运行时上下文已失效（扩展被重新加载）
    #[error("扩展上下文已失效，请重新加载页面")]
    ExtensionInvalidated,

    /// 超时错误
    #[error("请求超时（{}秒）", .0.as_secs())]
    Timeout(Duration),

    /// 服务端安全策略拒绝
    #[error("内容被安全策略拦截: {0}")]
    SafetyBlocked(String),

    /// 输出被截断
    #[error("输出被截断: {0}")]
    OutputTruncated(String),

    /// OpenRouter 找不到符合数据策略的端点
    #[error("没有符合数据策略的端点: {0}")]
    DataPolicy(String),

    /// 未归类错误，保留原始消息
    #[error("{}", unknown_message(.status, .message))]
    Unknown {
        status: Option<u16>,
        message: String,
    },
}

fn unknown_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("API 错误 ({}): {}", code, message),
        None => message.to_string(),
    }
}

/// 翻译结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

impl TranslationError {
    /// 创建未归类错误
    pub fn unknown<S: Into<String>>(message: S) -> Self {
        TranslationError::Unknown {
            status: None,
            message: message.into(),
        }
    }

    /// 致命错误会立即终止整次运行
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TranslationError::AuthError(_)
                | TranslationError::ExtensionInvalidated
                | TranslationError::DataPolicy(_)
        )
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::AuthError(_)
            | TranslationError::ExtensionInvalidated
            | TranslationError::DataPolicy(_) => ErrorSeverity::Critical,
            TranslationError::QuotaExceeded(..)
            | TranslationError::NetworkError(_)
            | TranslationError::Timeout(_) => ErrorSeverity::Warning,
            TranslationError::SafetyBlocked(_) | TranslationError::OutputTruncated(_) => {
                ErrorSeverity::Info
            }
            TranslationError::Unknown { .. } => ErrorSeverity::Error,
        }
    }

    /// 是否属于已知、可预期的错误（日志降级为 warn）
    pub fn is_expected(&self) -> bool {
        !matches!(self, TranslationError::Unknown { status: None, .. })
    }

    /// 获取错误类别，类别的排序即汇总时的优先级
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::QuotaExceeded(QuotaCause::RateLimited, _) => ErrorCategory::RateLimit,
            TranslationError::AuthError(_) => ErrorCategory::Auth,
            TranslationError::QuotaExceeded(QuotaCause::Billing, _) => ErrorCategory::Billing,
            TranslationError::QuotaExceeded(QuotaCause::Exhausted, _) => ErrorCategory::Quota,
            TranslationError::Unknown {
                status: Some(503), ..
            } => ErrorCategory::ServiceUnavailable,
            TranslationError::NetworkError(_) | TranslationError::Timeout(_) => {
                ErrorCategory::Network
            }
            TranslationError::SafetyBlocked(_)
            | TranslationError::OutputTruncated(_)
            | TranslationError::Unknown {
                status: Some(_), ..
            } => ErrorCategory::ApiError,
            TranslationError::Unknown { status: None, .. } => ErrorCategory::Unknown,
            TranslationError::ExtensionInvalidated => ErrorCategory::Runtime,
            TranslationError::DataPolicy(_) => ErrorCategory::DataPolicy,
        }
    }

    /// 把后端返回的原始错误字符串归类
    ///
    /// 后端以 `{ error: string }` 回复时只剩消息文本，这里按关键字还原类别。
    pub fn classify_message(raw: &str) -> Self {
        let message = raw.trim().to_string();
        let lower = message.to_lowercase();
        let codes = status_codes(&message);
        let has_code = |code: u16| codes.contains(&code);

        if lower.contains("no endpoints found matching your data policy") {
            return TranslationError::DataPolicy(message);
        }
        if lower.contains("extension context invalidated") {
            return TranslationError::ExtensionInvalidated;
        }
        if has_code(429) || lower.contains("rate limit") || lower.contains("rate-limited")
        {
            return TranslationError::QuotaExceeded(QuotaCause::RateLimited, message);
        }
        if has_code(401)
            || lower.contains("invalid api key")
            || lower.contains("incorrect api key")
            || lower.contains("api key not valid")
        {
            return TranslationError::AuthError(message);
        }
        if has_code(402)
            || lower.contains("insufficient")
            || lower.contains("billing")
            || has_code(403)
        {
            return TranslationError::QuotaExceeded(QuotaCause::Billing, message);
        }
        if lower.contains("quota") || lower.contains("exceeded") {
            return TranslationError::QuotaExceeded(QuotaCause::Exhausted, message);
        }
        if lower.contains("timed out") || lower.contains("timeout") {
            return TranslationError::NetworkError(message);
        }
        if lower.contains("failed to fetch")
            || lower.contains("network")
            || lower.contains("connection")
        {
            return TranslationError::NetworkError(message);
        }
        if has_code(503) || lower.contains("service unavailable") {
            return TranslationError::Unknown {
                status: Some(503),
                message,
            };
        }

        TranslationError::Unknown {
            status: None,
            message,
        }
    }
}

static STATUS_CODE: OnceLock<Option<Regex>> = OnceLock::new();

/// 消息中独立出现的 HTTP 状态码，`4290` 这样的数字不算
fn status_codes(message: &str) -> Vec<u16> {
    let regex = STATUS_CODE.get_or_init(|| match Regex::new(r"\b[1-5]\d{2}\b") {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("状态码正则编译失败: {}", e);
            None
        }
    });
    regex
        .as_ref()
        .map(|regex| {
            regex
                .find_iter(message)
                .filter_map(|m| m.as_str().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            TranslationError::unknown(format!("响应解析失败: {}", error))
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::unknown(format!("JSON解析错误: {}", error))
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
///
/// 声明顺序即汇总优先级：越靠前越先展示补救提示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    RateLimit,
    Auth,
    Billing,
    Quota,
    ServiceUnavailable,
    Network,
    ApiError,
    Unknown,
    Runtime,
    DataPolicy,
}

impl ErrorCategory {
    /// 面向用户的类别名称
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "请求频率限制",
            ErrorCategory::Auth => "API Key 问题",
            ErrorCategory::Billing => "账户余额或权限",
            ErrorCategory::Quota => "配额用尽",
            ErrorCategory::ServiceUnavailable => "服务暂时不可用",
            ErrorCategory::Network => "网络问题",
            ErrorCategory::ApiError => "API 错误",
            ErrorCategory::Unknown => "未知错误",
            ErrorCategory::Runtime => "扩展上下文失效",
            ErrorCategory::DataPolicy => "数据策略限制",
        }
    }

    /// 补救建议
    pub fn remediation(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "请稍后再试，或调小每批元素数量",
            ErrorCategory::Auth => "请在设置中检查 API Key 是否正确、是否已过期",
            ErrorCategory::Billing => "请检查服务商账户余额与模型访问权限",
            ErrorCategory::Quota => "配额已用尽，请等待重置或升级方案",
            ErrorCategory::ServiceUnavailable => "服务商暂时不可用，请稍后重试",
            ErrorCategory::Network => "请检查网络连接，或调大请求超时时间",
            ErrorCategory::ApiError => "请尝试更换模型或调小批次长度",
            ErrorCategory::Unknown => "请开启调试模式查看详细日志",
            ErrorCategory::Runtime => "请重新加载页面后再试",
            ErrorCategory::DataPolicy => "请在 OpenRouter 隐私设置中允许相应的数据策略",
        }
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析配置失败: {0}")]
    Parse(String),

    #[error("配置无效: {0}")]
    Invalid(String),

    #[error("缺少 {0} 的 API Key")]
    MissingApiKey(ApiProvider),
}

impl From<config::ConfigError> for ConfigError {
    fn from(error: config::ConfigError) -> Self {
        ConfigError::Parse(error.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::Parse(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(error: toml::ser::Error) -> Self {
        ConfigError::Parse(format!("TOML序列化错误: {}", error))
    }
}
