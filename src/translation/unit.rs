//! 可翻译单元与元素引用

use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use crate::parsers::html::{get_node_name, is_connected};

/// 指向宿主文档元素的非拥有引用
///
/// 宿主页面可能随时移除节点，使用前必须通过 [`ElementRef::live`] 确认节点仍在文档中。
#[derive(Debug, Clone)]
pub struct ElementRef(Weak<Node>);

impl ElementRef {
    pub fn new(node: &Handle) -> Self {
        Self(Rc::downgrade(node))
    }

    pub fn upgrade(&self) -> Option<Handle> {
        self.0.upgrade()
    }

    /// 节点仍存活且挂在文档树上时返回句柄
    pub fn live(&self) -> Option<Handle> {
        self.upgrade().filter(is_connected)
    }

    pub fn points_to(&self, node: &Handle) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(node))
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

/// 选择器产出的可翻译单元
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatableUnit {
    pub element: ElementRef,
    /// 去除首尾空白、折叠内部空白后的可见文本，非空
    pub source_text: String,
    pub tag: String,
}

impl TranslatableUnit {
    pub fn new(node: &Handle, source_text: String) -> Self {
        Self {
            element: ElementRef::new(node),
            source_text,
            tag: get_node_name(node).unwrap_or_default().to_string(),
        }
    }
}

/// 可被分批的文本片段
pub trait Segment {
    fn source_text(&self) -> &str;

    /// 以 Unicode 标量计的长度
    fn char_len(&self) -> usize {
        self.source_text().chars().count()
    }
}

impl Segment for TranslatableUnit {
    fn source_text(&self) -> &str {
        &self.source_text
    }
}

impl Segment for String {
    fn source_text(&self) -> &str {
        self
    }
}

impl Segment for &str {
    fn source_text(&self) -> &str {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::{detach, find_nodes, html_to_dom};

    #[test]
    fn test_element_ref_tracks_detachment() {
        let dom = html_to_dom(b"<html><body><p>Hello there</p></body></html>", "utf-8").unwrap();
        let p = find_nodes(&dom.document, &["p"]).remove(0);

        let unit = TranslatableUnit::new(&p, "Hello there".to_string());
        assert_eq!(unit.tag, "p");
        assert!(unit.element.points_to(&p));
        assert!(unit.element.live().is_some());

        detach(&p);
        assert!(unit.element.live().is_none());
        assert!(unit.element.upgrade().is_some());
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!("繁體中文".char_len(), 4);
        assert_eq!("abc".to_string().char_len(), 3);
    }
}
