//! # 解析器模块
//!
//! 页面以 `markup5ever_rcdom` 的 `RcDom` 表示，翻译流程只通过这里的
//! 查询与增删节点函数接触 DOM。

pub mod html;

pub use html::{html_to_dom, html_to_dom_with_declared_charset, serialize_document};
