//! 模型令牌预算
//!
//! 根据所选服务商与模型的最大输出令牌数推导一批文本的安全字符上限。
//! 译文长度通常不小于原文，所以批次字符数受限于模型能"写出"多少，而非能"读入"多少。

use crate::translation::config::constants;
use crate::translation::error::ConfigError;
use crate::translation::providers::ApiProvider;

/// 模型能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapability {
    pub context_window: u32,
    pub max_output_tokens: u32,
}

const fn cap(context_window: u32, max_output_tokens: u32) -> ModelCapability {
    ModelCapability {
        context_window,
        max_output_tokens,
    }
}

/// 已知模型能力表
pub const MODEL_CAPABILITIES: &[(ApiProvider, &str, ModelCapability)] = &[
    (ApiProvider::OpenAi, "gpt-4.1", cap(1_000_000, 4096)),
    (ApiProvider::OpenAi, "gpt-4.1-mini", cap(1_000_000, 4096)),
    (ApiProvider::OpenAi, "gpt-4.1-nano", cap(1_000_000, 4096)),
    (ApiProvider::OpenAi, "gpt-4o", cap(128_000, 4096)),
    (ApiProvider::OpenAi, "gpt-4o-mini", cap(128_000, 4096)),
    (ApiProvider::OpenAi, "gpt-4-turbo", cap(128_000, 4096)),
    (ApiProvider::OpenAi, "gpt-4", cap(8192, 4096)),
    (ApiProvider::Claude, "claude-4-opus-4.1", cap(1_000_000, 8192)),
    (ApiProvider::Claude, "claude-4-sonnet", cap(1_000_000, 8192)),
    (ApiProvider::Claude, "claude-3-7-sonnet", cap(200_000, 128_000)),
    (ApiProvider::Claude, "claude-3-5-sonnet-20241022", cap(200_000, 8192)),
    (ApiProvider::Claude, "claude-3-5-haiku-20241022", cap(200_000, 8192)),
    (ApiProvider::Gemini, "gemini-2.5-pro", cap(1_000_000, 8192)),
    (ApiProvider::Gemini, "gemini-2.5-flash", cap(1_000_000, 8192)),
    (ApiProvider::Gemini, "gemini-2.0-pro", cap(2_000_000, 8192)),
    (ApiProvider::Gemini, "gemini-2.0-flash", cap(1_000_000, 8192)),
    (ApiProvider::Gemini, "gemini-2.0-flash-lite", cap(1_000_000, 8192)),
    (ApiProvider::Gemini, "gemini-1.5-pro-002", cap(2_000_000, 8192)),
    (ApiProvider::Gemini, "gemini-1.5-flash-002", cap(1_000_000, 8192)),
    (ApiProvider::OpenRouter, "meta-llama/llama-4-maverick:free", cap(256_000, 8192)),
    (ApiProvider::OpenRouter, "meta-llama/llama-4-scout:free", cap(512_000, 8192)),
    (ApiProvider::OpenRouter, "deepseek/deepseek-r1:free", cap(128_000, 8192)),
    (ApiProvider::OpenRouter, "deepseek/deepseek-r1-distill-llama-70b:free", cap(131_072, 8192)),
    (ApiProvider::OpenRouter, "deepseek/deepseek-chat-v3-0324:free", cap(128_000, 8192)),
    (ApiProvider::OpenRouter, "google/gemma-3-27b-it:free", cap(128_000, 8192)),
    (ApiProvider::OpenRouter, "meta-llama/llama-3.3-70b-instruct:free", cap(128_000, 8192)),
    (ApiProvider::OpenRouter, "google/gemini-2.5-pro-exp-03-25:free", cap(1_000_000, 8192)),
    (ApiProvider::OpenRouter, "qwen/qwq-32b:free", cap(131_072, 8192)),
    (ApiProvider::OpenRouter, "anthropic/claude-3-5-sonnet", cap(200_000, 8192)),
    (ApiProvider::OpenRouter, "openai/gpt-4.1-mini", cap(1_000_000, 4096)),
    (ApiProvider::OpenRouter, "google/gemini-2.5-flash", cap(1_000_000, 8192)),
    (ApiProvider::OpenRouter, "mistralai/mistral-small-3.1-2503", cap(128_000, 8192)),
    (ApiProvider::Ollama, "gpt-oss:20b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "gpt-oss:120b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "deepseek-r1", cap(128_000, 8192)),
    (ApiProvider::Ollama, "llama3.3:70b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "llama3.2:11b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "llama3.2:90b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "llama3.1:8b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "llama3.2:3b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "llama3.2:1b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "gemma3:27b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "gemma2:9b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "gemma2:2b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "mistral-small3.1", cap(128_000, 8192)),
    (ApiProvider::Ollama, "mistral:7b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "qwen2.5:7b", cap(128_000, 8192)),
    (ApiProvider::Ollama, "qwen2.5:72b", cap(128_000, 8192)),
];

/// 查询模型能力
pub fn lookup_model(provider: ApiProvider, model: &str) -> Option<ModelCapability> {
    MODEL_CAPABILITIES
        .iter()
        .find(|(p, name, _)| *p == provider && *name == model)
        .map(|(_, _, capability)| *capability)
}

/// 最大输出令牌数 → 安全批次字符数
///
/// `max(1000, floor(tokens * 0.9) * 4)`，对输入单调不减。
pub fn compute_safe_batch_chars(max_output_tokens: u32) -> usize {
    let safe_tokens = (f64::from(max_output_tokens) * constants::OUTPUT_SAFETY_MARGIN).floor() as usize;
    (safe_tokens * constants::CHARS_PER_TOKEN).max(constants::MIN_SAFE_BATCH_CHARS)
}

/// 某个服务商/模型组合的预算
///
/// 只作为派生数据使用，切换模型后重新计算，从不持久化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBudget {
    pub provider: ApiProvider,
    pub model: String,
    pub max_output_tokens: u32,
    pub context_window: Option<u32>,
    pub safe_char_budget: usize,
}

impl ModelBudget {
    pub fn for_model(provider: ApiProvider, model: &str) -> Self {
        let capability = lookup_model(provider, model);
        let max_output_tokens = capability
            .map(|c| c.max_output_tokens)
            .unwrap_or(constants::UNKNOWN_MODEL_OUTPUT_TOKENS);

        if capability.is_none() {
            tracing::debug!(
                "未知模型 {}/{}，按 {} 输出令牌估算预算",
                provider,
                model,
                max_output_tokens
            );
        }

        Self {
            provider,
            model: model.to_string(),
            max_output_tokens,
            context_window: capability.map(|c| c.context_window),
            safe_char_budget: compute_safe_batch_chars(max_output_tokens),
        }
    }

    /// 叠加可选的策略上限后的有效预算
    pub fn effective_limit(&self, ceiling: Option<usize>) -> usize {
        match ceiling {
            Some(ceiling) => self
                .safe_char_budget
                .min(ceiling.max(constants::MIN_SAFE_BATCH_CHARS)),
            None => self.safe_char_budget,
        }
    }
}

/// 请求中携带的 `max_tokens`
///
/// 取最大输出的 90%，但不低于 `min(2000, 50%)`；Gemini 另有 7372 的硬上限。
pub fn request_max_tokens(provider: ApiProvider, model: &str) -> u32 {
    let Some(capability) = lookup_model(provider, model) else {
        return constants::FALLBACK_REQUEST_MAX_TOKENS;
    };

    let max = f64::from(capability.max_output_tokens);
    let safe = (max * constants::OUTPUT_SAFETY_MARGIN).floor() as u32;
    let floor = 2000u32.min((max * 0.5).floor() as u32);
    let tokens = safe.max(floor);

    if provider == ApiProvider::Gemini {
        tokens.min(constants::GEMINI_MAX_REQUEST_TOKENS)
    } else {
        tokens
    }
}

/// 已存批次长度与当前模型预算比较后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetAdjustment {
    pub stored: usize,
    pub capped: usize,
}

/// 把已存的批次长度收紧到预算之内，超出时返回调整信息
pub fn clamp_batch_length(stored: usize, limit: usize) -> (usize, Option<BudgetAdjustment>) {
    if stored > limit {
        (
            limit,
            Some(BudgetAdjustment {
                stored,
                capped: limit,
            }),
        )
    } else {
        (stored.max(1), None)
    }
}

/// 校验用户输入的批次长度（设置页保存时使用）
pub fn validate_batch_length(value: usize, budget: &ModelBudget) -> Result<(), ConfigError> {
    if value < constants::MIN_BATCH_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "批次长度不能小于 {}",
            constants::MIN_BATCH_LENGTH
        )));
    }
    if value > budget.safe_char_budget {
        return Err(ConfigError::Invalid(format!(
            "批次长度 {} 超过 {} 的安全上限 {}",
            value, budget.model, budget.safe_char_budget
        )));
    }
    Ok(())
}
