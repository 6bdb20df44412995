//! 调用 LLM 服务商的翻译后端
//!
//! 对应请求/回复接口的服务端：组装系统提示、计算 `max_tokens`、选择服务商实现并发出请求。

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::dispatcher::{TranslationBackend, TranslationRequest};
use crate::translation::budget::request_max_tokens;
use crate::translation::config::{constants, Settings};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::prompt::PromptCatalog;
use crate::translation::providers::{provider_for, ApiProvider, ProviderCall};

/// 基于 reqwest 的服务商后端
#[derive(Debug, Clone)]
pub struct ProviderBackend {
    client: reqwest::Client,
    catalog: PromptCatalog,
    endpoints: BTreeMap<String, String>,
}

impl ProviderBackend {
    /// 按设置创建后端
    pub fn from_settings(settings: &Settings) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("transcraft/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::NetworkError(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self::with_client(client, settings))
    }

    pub fn with_client(client: reqwest::Client, settings: &Settings) -> Self {
        Self {
            client,
            catalog: PromptCatalog::new(
                settings.custom_expert_modes.clone(),
                settings.custom_common_instructions.clone(),
            ),
            endpoints: settings.api_endpoints.clone(),
        }
    }

    /// 覆盖某个服务商的接口地址
    pub fn with_endpoint<S: Into<String>>(mut self, provider: ApiProvider, endpoint: S) -> Self {
        self.endpoints.insert(provider.id().to_string(), endpoint.into());
        self
    }

    fn endpoint_for(&self, provider: ApiProvider) -> String {
        self.endpoints
            .get(provider.id())
            .map(|endpoint| endpoint.trim())
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or_else(|| provider.default_endpoint())
            .to_string()
    }

    /// 组装单次服务商调用
    pub fn build_call(&self, request: &TranslationRequest) -> TranslationResult<ProviderCall> {
        let provider = request.api_config.selected_api;
        let api_key = request.api_config.api_key();
        if provider.requires_api_key() && api_key.is_none() {
            return Err(TranslationError::AuthError(format!(
                "未设置 {} 的 API Key",
                provider
            )));
        }

        let model = request.api_config.model();
        Ok(ProviderCall {
            endpoint: self.endpoint_for(provider),
            api_key: api_key.map(str::to_string),
            model: model.to_string(),
            system_prompt: self
                .catalog
                .build_system_prompt(&request.expert_mode, &request.target_language),
            text: request.text.clone(),
            max_tokens: request_max_tokens(provider, model),
            temperature: constants::DEFAULT_TEMPERATURE,
        })
    }
}

#[async_trait]
impl TranslationBackend for ProviderBackend {
    async fn translate(&self, request: &TranslationRequest) -> TranslationResult<String> {
        let call = self.build_call(request)?;
        let provider = provider_for(request.api_config.selected_api);
        tracing::debug!(
            "调用 {} 模型 {}，max_tokens={}",
            provider.kind(),
            call.model,
            call.max_tokens
        );
        provider.send(&self.client, &call).await
    }
}
