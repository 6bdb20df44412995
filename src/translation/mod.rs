//! 网页翻译模块
//!
//! 把页面上的可翻译文本交给 LLM 服务商翻译，并以可还原的方式写回 DOM：
//!
//! - **pipeline**: 元素选择、过滤、分批与译文对齐（同步纯计算）
//! - **budget**: 按模型输出上限计算安全的批次字符数
//! - **language**: 翻译前的语言检测闸门
//! - **providers**: OpenAI / Claude / Gemini / OpenRouter / Ollama 适配
//! - **core**: 派发器、服务商后端与页面会话
//! - **mutator** / **state**: 占位节点生命周期与页面状态
//! - **report**: 运行结束后的错误汇总
//! - **config** / **error** / **prompt**: 设置、错误类型与系统提示
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transcraft::parsers::html_to_dom;
//! use transcraft::translation::{ConfigManager, PageSession, ProviderBackend, SettingsStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ConfigManager::new();
//! let backend = Arc::new(ProviderBackend::from_settings(&store.load()?)?);
//! let dom = html_to_dom(b"<p>Hello world</p>", "utf-8")?;
//!
//! let session = PageSession::new(dom, store, backend)?;
//! let outcome = session.translate_page(false).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod budget;
pub mod config;
pub mod core;
pub mod error;
pub mod language;
pub mod mutator;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod report;
pub mod state;
pub mod unit;

pub use self::core::{
    DispatchContext, Dispatcher, PageSession, ProviderBackend, RunOutcome, RunSummary,
    RuntimeHandle, TranslationBackend, TranslationRequest,
};
pub use budget::{compute_safe_batch_chars, ModelBudget};
pub use config::{constants, ConfigManager, MemorySettingsStore, Settings, SettingsStore};
pub use error::{
    ConfigError, ErrorCategory, ErrorSeverity, QuotaCause, TranslationError, TranslationResult,
};
pub use language::{should_skip, GateDecision, PageHints};
pub use mutator::PlaceholderRegistry;
pub use pipeline::{plan_batches, reconcile, select_translatable_units, Batch, BatchLimits};
pub use providers::{ApiConfig, ApiProvider};
pub use report::{ErrorSummary, FatalNotice};
pub use state::PageTranslationState;
pub use unit::{ElementRef, TranslatableUnit};
