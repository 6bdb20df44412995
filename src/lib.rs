//! # TransCraft
//!
//! 基于 LLM 的网页翻译核心：选择页面上的可翻译元素，按模型输出预算分批，
//! 以分隔符协议逐批请求翻译，再把译文拆回并以可还原的方式插入 DOM。
//!
//! ## 模块组织
//!
//! - `parsers` - HTML 解析、DOM 操作与序列化
//! - `translation` - 翻译流程（选择、分批、派发、对齐、DOM 变更）
//! - `env` - 环境变量访问器

pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use parsers::*;
