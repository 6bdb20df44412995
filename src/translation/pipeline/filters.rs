//! 元素与文本过滤器
//!
//! 排除规则以数据表的形式给出：每条规则描述一个 class/id 标记及其匹配方式，
//! 选择器只负责查表，不内嵌具体字符串判断。

use std::collections::HashSet;

use markup5ever_rcdom::Handle;

use crate::parsers::html::get_node_attr;
use crate::translation::config::constants;

/// 规则作用的属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Class,
    Id,
    Both,
}

/// 标记的匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// 属性值中任意位置包含标记
    Substring,
    /// 标记必须是以 `-`/`_`/空白 分隔的完整片段（避免 `ad` 命中 `header`、`shadow`）
    Segment,
}

/// 单条排除规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionRule {
    pub marker: &'static str,
    pub scope: RuleScope,
    pub kind: MatchKind,
}

const fn rule(marker: &'static str, scope: RuleScope, kind: MatchKind) -> ExclusionRule {
    ExclusionRule {
        marker,
        scope,
        kind,
    }
}

/// 非正文区域的 class/id 标记
pub const EXCLUSION_RULES: &[ExclusionRule] = &[
    rule("nav", RuleScope::Both, MatchKind::Substring),
    rule("menu", RuleScope::Both, MatchKind::Substring),
    rule("ad", RuleScope::Both, MatchKind::Segment),
    rule("banner", RuleScope::Both, MatchKind::Substring),
    rule("script", RuleScope::Both, MatchKind::Substring),
    rule("style", RuleScope::Both, MatchKind::Substring),
    rule("hidden", RuleScope::Class, MatchKind::Substring),
    rule("invisible", RuleScope::Class, MatchKind::Substring),
    rule("button", RuleScope::Both, MatchKind::Substring),
    rule("btn", RuleScope::Both, MatchKind::Substring),
    rule("control", RuleScope::Class, MatchKind::Substring),
    rule("widget", RuleScope::Class, MatchKind::Substring),
];

/// 纯布局容器的 class 标记（只对通用容器生效）
pub const LAYOUT_CLASS_MARKERS: &[&str] = &["container", "wrapper", "row", "col", "grid", "flex", "layout"];

impl ExclusionRule {
    fn applies_to_class(&self) -> bool {
        matches!(self.scope, RuleScope::Class | RuleScope::Both)
    }

    fn applies_to_id(&self) -> bool {
        matches!(self.scope, RuleScope::Id | RuleScope::Both)
    }

    /// 检查属性值是否命中此规则（属性值需已小写）
    pub fn matches(&self, value: &str) -> bool {
        match self.kind {
            MatchKind::Substring => value.contains(self.marker),
            MatchKind::Segment => value
                .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
                .any(|segment| segment == self.marker),
        }
    }
}

/// 返回元素命中的第一条排除规则
pub fn matching_rule(node: &Handle) -> Option<&'static ExclusionRule> {
    let class = get_node_attr(node, "class").map(|v| v.to_lowercase());
    let id = get_node_attr(node, "id").map(|v| v.to_lowercase());
    if class.is_none() && id.is_none() {
        return None;
    }

    EXCLUSION_RULES.iter().find(|rule| {
        (rule.applies_to_class() && class.as_deref().is_some_and(|c| rule.matches(c)))
            || (rule.applies_to_id() && id.as_deref().is_some_and(|i| rule.matches(i)))
    })
}

/// 元素的 class 是否只是布局用途
pub fn has_layout_class(node: &Handle) -> bool {
    get_node_attr(node, "class")
        .map(|classes| {
            classes.split_whitespace().any(|token| {
                let token = token.to_lowercase();
                LAYOUT_CLASS_MARKERS.iter().any(|marker| {
                    token
                        .split(|c: char| c == '-' || c == '_')
                        .any(|segment| segment == *marker)
                })
            })
        })
        .unwrap_or(false)
}

/// 文本内容过滤器
pub struct TextFilter {
    /// 功能性词汇集合
    functional_words: HashSet<String>,
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFilter {
    pub fn new() -> Self {
        let functional_words = constants::FUNCTIONAL_WORDS
            .iter()
            .map(|&s| s.to_lowercase())
            .collect();

        Self { functional_words }
    }

    /// 文本是否值得翻译（已去除首尾空白）
    pub fn is_meaningful(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }

        if self.is_pure_symbols_or_numbers(text) {
            return false;
        }

        if self.is_functional_text(text) {
            return false;
        }

        true
    }

    /// 检查是否为纯符号或数字
    fn is_pure_symbols_or_numbers(&self, text: &str) -> bool {
        !text.chars().any(char::is_alphabetic)
    }

    /// 检查是否为功能性文本
    fn is_functional_text(&self, text: &str) -> bool {
        self.functional_words.contains(&text.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::{find_nodes, html_to_dom};

    fn first(html: &str, tag: &str) -> Handle {
        let dom = html_to_dom(html.as_bytes(), "utf-8").unwrap();
        // 只读取属性，文档释放后节点属性仍然可用
        find_nodes(&dom.document, &[tag]).remove(0)
    }

    #[test]
    fn test_segment_rule_for_ad() {
        let ad = rule("ad", RuleScope::Both, MatchKind::Segment);
        assert!(ad.matches("ad"));
        assert!(ad.matches("top-ad-slot"));
        assert!(ad.matches("sidebar ad_unit"));
        assert!(!ad.matches("header"));
        assert!(!ad.matches("shadow-box"));
        assert!(!ad.matches("reading"));
    }

    #[test]
    fn test_matching_rule_by_class_and_id() {
        let nav = first(r#"<div class="site-navbar">Links</div>"#, "div");
        assert_eq!(matching_rule(&nav).map(|r| r.marker), Some("nav"));

        let id_ad = first(r#"<p id="AD">Buy now</p>"#, "p");
        assert_eq!(matching_rule(&id_ad).map(|r| r.marker), Some("ad"));

        let hidden_id = first(r#"<p id="hidden-note">x</p>"#, "p");
        assert!(matching_rule(&hidden_id).is_none());

        let article = first(r#"<p class="article-body lead">Text</p>"#, "p");
        assert!(matching_rule(&article).is_none());
    }

    #[test]
    fn test_layout_classes() {
        assert!(has_layout_class(&first(r#"<div class="main-container">x</div>"#, "div")));
        assert!(has_layout_class(&first(r#"<div class="col_md">x</div>"#, "div")));
        assert!(!has_layout_class(&first(r#"<div class="column-text">x</div>"#, "div")));
        assert!(!has_layout_class(&first("<div>x</div>", "div")));
    }

    #[test]
    fn test_text_filter() {
        let filter = TextFilter::new();
        assert!(filter.is_meaningful("Hello"));
        assert!(filter.is_meaningful("中文"));
        assert!(!filter.is_meaningful("12,345.00"));
        assert!(!filter.is_meaningful("→ | ←"));
        assert!(!filter.is_meaningful("OK"));
        assert!(!filter.is_meaningful(""));
    }
}
