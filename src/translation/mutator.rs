//! DOM 变更：加载占位、写入译文、移除与还原
//!
//! 所有插入的节点都是源元素的子节点，原始文本节点从不修改，还原时只需删除插入的节点。
//! 占位节点的生命周期只由 [`PlaceholderRegistry`] 管理，其他组件只持有占位 ID。

use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use crate::parsers::html::{
    append_child, clear_children, create_element, create_text, detach, get_node_attr,
    has_class, is_connected, set_node_attr,
};
use crate::translation::config::constants;
use crate::translation::unit::ElementRef;

/// 已插入的占位记录
#[derive(Debug, Clone)]
pub struct PlaceholderRecord {
    pub element: ElementRef,
    pub placeholder_id: String,
    pub node: Handle,
    /// 源元素标签，用于译文的附加 class
    pub source_tag: String,
    pub applied: bool,
}

/// 占位节点登记表
#[derive(Debug, Default)]
pub struct PlaceholderRegistry {
    records: HashMap<String, PlaceholderRecord>,
    sequence: u64,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, placeholder_id: &str) -> Option<&PlaceholderRecord> {
        self.records.get(placeholder_id)
    }

    /// 尚未写入译文的占位数
    pub fn pending(&self) -> usize {
        self.records.values().filter(|r| !r.applied).count()
    }

    fn next_id(&mut self) -> String {
        self.sequence += 1;
        format!(
            "translation_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            self.sequence
        )
    }

    /// 在元素末尾追加加载占位
    ///
    /// 元素已脱离文档，或已经有直属的翻译节点时返回 `None`。
    pub fn insert_placeholder(&mut self, element: &ElementRef) -> Option<String> {
        let Some(node) = element.live() else {
            tracing::debug!("元素已从文档中移除，跳过插入占位");
            return None;
        };

        if direct_translation_child(&node).is_some() {
            return None;
        }

        let placeholder_id = self.next_id();
        let placeholder = build_loading_block(&placeholder_id);
        append_child(&node, placeholder.clone());

        let source_tag = crate::parsers::html::get_node_name(&node)
            .unwrap_or_default()
            .to_string();
        self.records.insert(
            placeholder_id.clone(),
            PlaceholderRecord {
                element: element.clone(),
                placeholder_id: placeholder_id.clone(),
                node: placeholder,
                source_tag,
                applied: false,
            },
        );

        Some(placeholder_id)
    }

    /// 用译文替换占位内容
    ///
    /// 占位未登记（例如已被还原）或已脱离文档时返回 false。
    pub fn apply_translation(&mut self, placeholder_id: &str, text: &str, target_language: &str) -> bool {
        let Some(record) = self.records.get_mut(placeholder_id) else {
            tracing::debug!("占位 {} 未登记，忽略译文", placeholder_id);
            return false;
        };

        if !is_connected(&record.node) {
            tracing::debug!("占位 {} 已被页面移除", placeholder_id);
            self.records.remove(placeholder_id);
            return false;
        }

        let node = &record.node;
        clear_children(node);
        append_child(node, create_text(text));

        let mut class = constants::TRANSLATION_BLOCK_CLASS.to_string();
        if let Some(extra) = translated_class_for(&record.source_tag) {
            class.push(' ');
            class.push_str(extra);
        }
        set_node_attr(node, "class", Some(class));
        set_node_attr(node, "lang", Some(target_language.to_string()));
        record.applied = true;

        true
    }

    /// 移除占位并忘记它
    pub fn remove_placeholder(&mut self, placeholder_id: &str) -> bool {
        match self.records.remove(placeholder_id) {
            Some(record) => detach(&record.node),
            None => false,
        }
    }

    /// 移除所有尚未写入译文的占位，返回移除数量
    pub fn remove_pending(&mut self) -> usize {
        let pending: Vec<String> = self
            .records
            .iter()
            .filter(|(_, record)| !record.applied)
            .map(|(id, _)| id.clone())
            .collect();

        pending
            .iter()
            .filter(|id| self.remove_placeholder(id))
            .count()
    }

    /// 只移除给定 ID 中仍登记且尚未写入译文的占位，返回移除数量
    pub fn remove_pending_of<'a, I>(&mut self, placeholder_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut removed = 0;
        for id in placeholder_ids {
            let pending = self.records.get(id.as_str()).is_some_and(|r| !r.applied);
            if pending && self.remove_placeholder(id) {
                removed += 1;
            }
        }
        removed
    }

    /// 移除全部插入的节点，返回删除的节点数
    ///
    /// 先删除登记过的节点，再扫描文档删除登记表之外残留的翻译节点
    /// （宿主页面重新渲染时登记表可能与 DOM 不一致）。
    pub fn restore_all(&mut self, document: &Handle) -> usize {
        let mut removed = 0;
        for (_, record) in self.records.drain() {
            if detach(&record.node) {
                removed += 1;
            }
        }

        let mut strays = Vec::new();
        collect_translation_blocks(document, &mut strays);
        for node in &strays {
            if detach(node) {
                removed += 1;
            }
        }
        if !strays.is_empty() {
            tracing::debug!("清理了 {} 个未登记的翻译节点", strays.len());
        }

        removed
    }
}

/// 元素直属的翻译节点
fn direct_translation_child(node: &Handle) -> Option<Handle> {
    node.children
        .borrow()
        .iter()
        .find(|child| has_class(child, constants::TRANSLATION_BLOCK_CLASS))
        .cloned()
}

/// `div.ai-translation-block.loading > span.ai-translation-loading-text > span.loading-spinner`
fn build_loading_block(placeholder_id: &str) -> Handle {
    let class = format!(
        "{} {}",
        constants::TRANSLATION_BLOCK_CLASS,
        constants::LOADING_CLASS
    );
    let block = create_element(
        "div",
        &[
            ("class", class.as_str()),
            (constants::PLACEHOLDER_ID_ATTR, placeholder_id),
        ],
    );
    let label = create_element("span", &[("class", "ai-translation-loading-text")]);
    append_child(&label, create_text(constants::LOADING_TEXT));
    append_child(&label, create_element("span", &[("class", "loading-spinner")]));
    append_child(&block, label);
    block
}

fn translated_class_for(tag: &str) -> Option<&'static str> {
    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("ai-translation-heading"),
        "li" => Some("ai-translation-list-item"),
        "td" | "th" => Some("ai-translation-table-cell"),
        _ => None,
    }
}

fn collect_translation_blocks(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if has_class(child, constants::TRANSLATION_BLOCK_CLASS) {
            out.push(child.clone());
        } else {
            collect_translation_blocks(child, out);
        }
    }
}

/// 统计文档中的翻译节点
pub fn count_translation_blocks(document: &Handle) -> usize {
    let mut found = Vec::new();
    collect_translation_blocks(document, &mut found);
    found.len()
}

/// 读取占位 ID
pub fn placeholder_id_of(node: &Handle) -> Option<String> {
    get_node_attr(node, constants::PLACEHOLDER_ID_ATTR)
}
