//! 翻译系统核心模块
//!
//! - **dispatcher**: 单批次派发，运行时存活检查、超时竞争与错误分级日志
//! - **backend**: 请求/回复接口的服务端，组装提示并调用具体服务商
//! - **session**: 页面会话，串起选择、语言闸门、分批、派发、对齐与 DOM 变更
//!
//! 派发严格串行：上一批次完成或超时之前不会发出下一批次。

pub mod backend;
pub mod dispatcher;
pub mod session;

pub use backend::ProviderBackend;
pub use dispatcher::{
    BackendReply, DispatchContext, Dispatcher, ErrorDetail, RuntimeHandle, TranslationBackend,
    TranslationRequest,
};
pub use session::{PageSession, RunOutcome, RunSummary};
