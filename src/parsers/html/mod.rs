//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作（查询、追加、摘除）
//! - `metadata`: 字符集声明
//! - `serializer`: 序列化功能

pub mod dom;
pub mod metadata;
pub mod serializer;

pub use dom::{
    append_child, class_tokens, clear_children, create_element, create_text, detach, find_nodes,
    get_child_node_by_name, get_node_attr, get_node_name, get_parent_node, has_class, html_to_dom,
    is_connected, set_node_attr, text_content,
};
pub use metadata::{get_charset, html_to_dom_with_declared_charset};
pub use serializer::serialize_document;
