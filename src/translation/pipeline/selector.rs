//! 可翻译元素选择器
//!
//! 对文档做一次先序遍历：每个节点只访问一次，祖先上下文（脚本区、扩展 UI、表单控件、
//! 命中排除规则的区域）沿递归向下传递。可见文本按文档顺序写入同一个缓冲区，
//! 元素只记录自己的字节区间，只有候选元素才会取出并规整文本。
//! 遍历结束后按先序区间去重，结果保持文档顺序。

use std::ops::Range;

use markup5ever_rcdom::{Handle, NodeData};

use super::filters::{has_layout_class, matching_rule, TextFilter};
use crate::parsers::html::{get_node_attr, get_node_name, has_class};
use crate::translation::config::constants;
use crate::translation::unit::TranslatableUnit;

/// 结构性文本标签
pub const STRUCTURAL_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "blockquote", "figcaption",
    "caption", "dt", "dd",
];

/// 通用容器标签，只在不含块级子元素时才作为候选
pub const CONTAINER_TAGS: &[&str] = &["div", "section", "article", "span"];

/// 使通用容器失去候选资格的块级后代
const BLOCK_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "div", "section", "article", "ul", "ol", "table",
];

/// 整个子树都不可见或不应翻译
const SKIPPED_SUBTREES: &[&str] = &["script", "style", "noscript", "template", "head"];

/// 表单控件
const FORM_CONTROL_TAGS: &[&str] = &["button", "input", "select", "textarea", "form"];

/// 拼接文本时两侧补空白的标签（模拟 innerText 的换行）
const SPACED_TAGS: &[&str] = &[
    "p", "div", "section", "article", "li", "td", "th", "tr", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote", "figcaption", "caption", "dt", "dd", "ul", "ol", "table",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateKind {
    Structural,
    Container,
}

impl CandidateKind {
    fn of(tag: &str) -> Option<Self> {
        if STRUCTURAL_TAGS.contains(&tag) {
            Some(CandidateKind::Structural)
        } else if CONTAINER_TAGS.contains(&tag) {
            Some(CandidateKind::Container)
        } else {
            None
        }
    }

    fn min_chars(&self) -> usize {
        match self {
            CandidateKind::Structural => constants::MIN_STRUCTURAL_TEXT_LENGTH,
            CandidateKind::Container => constants::MIN_CONTAINER_TEXT_LENGTH,
        }
    }
}

/// 由祖先继承的上下文
#[derive(Debug, Clone, Copy, Default)]
struct WalkContext {
    excluded: bool,
    in_form_control: bool,
}

/// 子树汇总，文本本身写在遍历器的共享缓冲区里
#[derive(Debug, Default, Clone, Copy)]
struct Subtree {
    /// 自身或后代是块级元素
    contains_block: bool,
    /// 后代中存在已插入的翻译节点
    contains_translation: bool,
}

#[derive(Debug)]
struct Candidate {
    node: Handle,
    /// 先序编号
    pre: usize,
    /// 子树中最后一个节点的先序编号
    end: usize,
    kind: CandidateKind,
    /// 子树文本在共享缓冲区中的字节区间
    span: Range<usize>,
    text: String,
}

/// 元素选择器
#[derive(Default)]
pub struct ElementSelector {
    filter: TextFilter,
}

impl ElementSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按文档顺序返回可翻译单元
    pub fn select(&self, document: &Handle) -> Vec<TranslatableUnit> {
        let mut walker = Walker {
            filter: &self.filter,
            counter: 0,
            text: String::new(),
            candidates: Vec::new(),
        };
        walker.visit(document, WalkContext::default());

        let found = walker.candidates.len();
        let kept = self.deduplicate(walker.candidates, &walker.text);
        tracing::debug!(
            "扫描 {} 个节点，候选 {} 个，去重后 {} 个",
            walker.counter,
            found,
            kept.len()
        );

        kept.into_iter()
            .map(|candidate| TranslatableUnit::new(&candidate.node, candidate.text))
            .collect()
    }

    /// 嵌套候选去重
    ///
    /// 1. 位于其他候选内部的通用容器属于祖先文本的一部分，丢弃；
    /// 2. 仍包裹着其他候选的元素是外层包装，保留更具体的内层元素；
    ///    结构性包装自身还有足够的直属文本时一并保留，只翻译内层候选之外的部分。
    fn deduplicate(&self, mut candidates: Vec<Candidate>, buffer: &str) -> Vec<Candidate> {
        // 遍历在后序位置登记候选
        candidates.sort_by_key(|candidate| candidate.pre);

        let mut open_ends: Vec<usize> = Vec::new();
        let mut inner: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            while open_ends.last().is_some_and(|&end| end < candidate.pre) {
                open_ends.pop();
            }
            let nested = !open_ends.is_empty();
            open_ends.push(candidate.end);

            if nested && candidate.kind == CandidateKind::Container {
                continue;
            }
            inner.push(candidate);
        }

        // 先序中紧随其后的候选落在区间内即为后代
        let own_texts: Vec<Option<String>> = inner
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let descendants = &inner[index + 1..];
                let wraps_next = descendants
                    .first()
                    .is_some_and(|next| next.pre <= candidate.end);
                if !wraps_next {
                    return Some(candidate.text.clone());
                }
                if candidate.kind != CandidateKind::Structural {
                    return None;
                }
                self.own_text(candidate, descendants, buffer)
            })
            .collect();

        inner
            .into_iter()
            .zip(own_texts)
            .filter_map(|(candidate, text)| text.map(|text| Candidate { text, ..candidate }))
            .collect()
    }

    /// 包装元素扣除内层候选后剩下的文本，不足以翻译时返回 `None`
    fn own_text(&self, wrapper: &Candidate, descendants: &[Candidate], buffer: &str) -> Option<String> {
        let mut own = String::new();
        let mut cursor = wrapper.span.start;
        let mut covered: Option<usize> = None;
        for nested in descendants.iter().take_while(|n| n.pre <= wrapper.end) {
            if covered.is_some_and(|end| nested.pre <= end) {
                continue;
            }
            own.push_str(&buffer[cursor..nested.span.start]);
            own.push(' ');
            cursor = nested.span.end;
            covered = Some(nested.end);
        }
        own.push_str(&buffer[cursor..wrapper.span.end]);

        let own = collapse_whitespace(&own);
        (own.chars().count() >= wrapper.kind.min_chars() && self.filter.is_meaningful(&own))
            .then_some(own)
    }
}

/// 便捷函数
pub fn select_translatable_units(document: &Handle) -> Vec<TranslatableUnit> {
    ElementSelector::new().select(document)
}

struct Walker<'a> {
    filter: &'a TextFilter,
    counter: usize,
    /// 按文档顺序拼接的可见文本，每个文本节点只写入一次
    text: String,
    candidates: Vec<Candidate>,
}

impl Walker<'_> {
    fn visit(&mut self, node: &Handle, context: WalkContext) -> Subtree {
        let pre = self.counter;
        self.counter += 1;

        let tag = match &node.data {
            NodeData::Text { contents } => {
                self.text.push_str(&contents.borrow());
                return Subtree::default();
            }
            NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.visit(child, context);
                }
                return Subtree::default();
            }
            NodeData::Element { .. } => get_node_name(node).unwrap_or_default(),
            _ => return Subtree::default(),
        };

        if tag == "br" {
            self.text.push(' ');
            return Subtree::default();
        }
        if SKIPPED_SUBTREES.contains(&tag) {
            return Subtree::default();
        }
        if has_class(node, constants::TRANSLATION_BLOCK_CLASS) {
            return Subtree {
                contains_block: true,
                contains_translation: true,
            };
        }
        if get_node_attr(node, "id").is_some_and(|id| constants::EXTENSION_UI_IDS.contains(&id.as_str())) {
            return Subtree::default();
        }

        let mut context = context;
        if tag == "nav" || matching_rule(node).is_some() {
            context.excluded = true;
        }
        if FORM_CONTROL_TAGS.contains(&tag) || get_node_attr(node, "role").as_deref() == Some("button") {
            context.in_form_control = true;
        }

        let spaced = SPACED_TAGS.contains(&tag);
        let start = self.text.len();
        if spaced {
            self.text.push(' ');
        }
        let mut subtree = Subtree::default();
        let mut has_block_descendant = false;
        for child in node.children.borrow().iter() {
            let child_tree = self.visit(child, context);
            has_block_descendant |= child_tree.contains_block;
            subtree.contains_translation |= child_tree.contains_translation;
        }
        if spaced {
            self.text.push(' ');
        }
        subtree.contains_block = has_block_descendant || BLOCK_TAGS.contains(&tag);

        let end = self.counter - 1;
        if let Some(kind) = CandidateKind::of(tag) {
            let node_span = NodeSpan {
                pre,
                end,
                bytes: start..self.text.len(),
            };
            self.consider(node, tag, kind, subtree, has_block_descendant, context, node_span);
        }

        subtree
    }

    #[allow(clippy::too_many_arguments)]
    fn consider(
        &mut self,
        node: &Handle,
        tag: &str,
        kind: CandidateKind,
        subtree: Subtree,
        has_block_descendant: bool,
        context: WalkContext,
        node_span: NodeSpan,
    ) {
        if context.excluded || subtree.contains_translation {
            return;
        }
        // 表单内只放行表格单元格
        if context.in_form_control && !matches!(tag, "td" | "th") {
            return;
        }
        if kind == CandidateKind::Container && (has_block_descendant || has_layout_class(node)) {
            return;
        }

        let text = collapse_whitespace(&self.text[node_span.bytes.clone()]);
        if text.chars().count() < kind.min_chars() || !self.filter.is_meaningful(&text) {
            return;
        }

        self.candidates.push(Candidate {
            node: node.clone(),
            pre: node_span.pre,
            end: node_span.end,
            kind,
            span: node_span.bytes,
            text,
        });
    }
}

/// 元素在遍历中的位置
struct NodeSpan {
    pre: usize,
    end: usize,
    bytes: Range<usize>,
}

/// 折叠连续空白并去除首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::html_to_dom;
    use markup5ever_rcdom::RcDom;

    fn parse(body: &str) -> RcDom {
        let html = format!("<html><head><title>t</title></head><body>{}</body></html>", body);
        html_to_dom(html.as_bytes(), "utf-8").unwrap()
    }

    fn texts(body: &str) -> Vec<String> {
        let dom = parse(body);
        select_translatable_units(&dom.document)
            .into_iter()
            .map(|u| u.source_text)
            .collect()
    }

    #[test]
    fn test_structural_tags_in_document_order() {
        let found = texts("<h1>Title here</h1><p>First   paragraph\n text</p><ul><li>Item one</li></ul><p>Hi</p>");
        assert_eq!(found, vec!["Title here", "First paragraph text", "Item one", "Hi"]);
    }

    #[test]
    fn test_container_threshold_and_block_children() {
        let found = texts(
            "<div>Short div</div><div>A container with enough text</div><section><p>Inner paragraph</p></section>",
        );
        assert_eq!(found, vec!["A container with enough text", "Inner paragraph"]);
    }

    #[test]
    fn test_exclusions() {
        let found = texts(
            r#"<nav><p>Home link text</p></nav>
               <div class="menu"><p>Menu entry</p></div>
               <p class="top-ad">Buy stuff now</p>
               <p class="header-text">Kept header text</p>
               <script>var x = "not text";</script>
               <div id="ai-translation-floating-container"><p>Extension UI</p></div>
               <form><p>Inside form</p><table><tr><td>Cell in form</td></tr></table></form>
               <p role="button">Clickable paragraph</p>
               <div class="row-layout">A layout wrapper text</div>"#,
        );
        assert_eq!(found, vec!["Kept header text", "Cell in form"]);
    }

    #[test]
    fn test_content_filter() {
        let found = texts("<p>12345</p><p>OK</p><p>--</p><td>2024</td><p>Real words</p>");
        assert_eq!(found, vec!["Real words"]);
    }

    #[test]
    fn test_translation_blocks_are_ignored() {
        let found = texts(
            r#"<p>Original text</p><div class="ai-translation-block">原文翻譯後的內容很長</div>
               <li><p>Para</p><div class="ai-translation-block">譯文</div></li>"#,
        );
        assert_eq!(found, vec!["Original text", "Para"]);
    }

    #[test]
    fn test_nested_dedup() {
        // 外层 li 被内层 p 取代；td 内的 span 并入 td；div 内的 span 并入 div
        let found = texts(
            "<ul><li><p>Inner para</p></li></ul>\
             <table><tr><td><span>Cell span text long</span></td></tr></table>\
             <div>Outer words and <span>inline span words</span></div>\
             <blockquote><p>Quoted one</p><p>Quoted two</p></blockquote>",
        );
        assert_eq!(
            found,
            vec![
                "Inner para",
                "Cell span text long",
                "Outer words and inline span words",
                "Quoted one",
                "Quoted two",
            ]
        );
    }

    #[test]
    fn test_wrapper_with_own_text_is_kept() {
        let found = texts(
            "<ul><li>Intro text here <p>Nested detail</p> closing words</li>\
             <li>2. <p>Only inner counts</p></li></ul>",
        );
        assert_eq!(
            found,
            vec![
                "Intro text here closing words",
                "Nested detail",
                "Only inner counts",
            ]
        );
    }

    #[test]
    fn test_deeply_nested_document() {
        let depth = 1000;
        let body = format!(
            "{}<p>Deep paragraph text</p>{}<p>{}Deeply wrapped words{}</p>",
            "<div>".repeat(depth),
            "</div>".repeat(depth),
            "<span>".repeat(depth),
            "</span>".repeat(depth),
        );
        let found = texts(&body);
        assert_eq!(found, vec!["Deep paragraph text", "Deeply wrapped words"]);
    }

    #[test]
    fn test_br_and_inline_whitespace() {
        let found = texts("<p>line one<br>line two</p>");
        assert_eq!(found, vec!["line one line two"]);
    }
}
