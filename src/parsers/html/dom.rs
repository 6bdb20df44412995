use std::cell::RefCell;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> std::io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => {
            let (string, _, _) = encoding.decode(data);
            string.into_owned()
        }
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some((first, rest)) = node_names.split_first() else {
        return found_nodes;
    };

    let matches = get_node_name(node) == Some(*first);
    if matches && rest.is_empty() {
        found_nodes.push(node.clone());
    }

    let next_names = if matches && !rest.is_empty() {
        rest
    } else {
        node_names
    };
    for child_node in node.children.borrow().iter() {
        found_nodes.append(&mut find_nodes(child_node, next_names));
    }

    found_nodes
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    children
        .iter()
        .find(|child| get_node_name(child) == Some(node_name))
        .cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
///
/// rcdom 把父指针存放在 `Cell` 中，读取时必须取出再放回。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs_mut = attrs.borrow_mut();

        match attr_value {
            Some(value) => {
                if let Some(existing) = attrs_mut
                    .iter_mut()
                    .find(|attr| &*attr.name.local == attr_name)
                {
                    existing.value.clear();
                    existing.value.push_slice(&value);
                } else {
                    attrs_mut.push(Attribute {
                        name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                        value: StrTendril::from_slice(&value),
                    });
                }
            }
            None => attrs_mut.retain(|attr| &*attr.name.local != attr_name),
        }
    }
}

/// 获取 class 属性拆分后的 token 列表
pub fn class_tokens(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|classes| classes.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// 判断元素是否带有指定 class
pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_node_attr(node, "class")
        .map(|classes| classes.split_whitespace().any(|token| token == class_name))
        .unwrap_or(false)
}

/// 创建 HTML 元素节点
pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    let attributes = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: StrTendril::from_slice(value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs: RefCell::new(attributes),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 创建文本节点
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 在父节点末尾追加子节点
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 将节点从父节点中摘除
pub fn detach(node: &Handle) -> bool {
    let Some(parent) = get_parent_node(node) else {
        return false;
    };

    let mut children = parent.children.borrow_mut();
    let before = children.len();
    children.retain(|c| !Rc::ptr_eq(c, node));
    let removed = children.len() != before;
    drop(children);

    node.parent.set(None);
    removed
}

/// 清空子节点
pub fn clear_children(node: &Handle) {
    for child in node.children.borrow_mut().drain(..) {
        child.parent.set(None);
    }
}

/// 节点是否仍然挂在文档树上
pub fn is_connected(node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if let NodeData::Document = current.data {
            return true;
        }
        match get_parent_node(&current) {
            Some(parent) => {
                let attached = parent.children.borrow().iter().any(|c| Rc::ptr_eq(c, &current));
                if !attached {
                    return false;
                }
                current = parent;
            }
            None => return false,
        }
    }
}

/// 拼接子树中所有文本节点的内容
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").unwrap()
    }

    #[test]
    fn test_find_nodes_by_path() {
        let dom = dom("<html><body><div><p>a</p></div><p>b</p></body></html>");
        assert_eq!(find_nodes(&dom.document, &["p"]).len(), 2);
        assert_eq!(find_nodes(&dom.document, &["div", "p"]).len(), 1);
        assert!(find_nodes(&dom.document, &[]).is_empty());
    }

    #[test]
    fn test_parent_lookup_is_repeatable() {
        let dom = dom("<p>x</p>");
        let p = find_nodes(&dom.document, &["p"]).remove(0);
        // 连续读取两次父节点都应成功
        assert_eq!(get_node_name(&get_parent_node(&p).unwrap()), Some("body"));
        assert_eq!(get_node_name(&get_parent_node(&p).unwrap()), Some("body"));
    }

    #[test]
    fn test_append_and_detach() {
        let dom = dom("<div><p>one</p><p>two</p></div>");
        let first = find_nodes(&dom.document, &["p"]).remove(0);
        let marker = create_element("span", &[("class", "m")]);

        append_child(&first, marker.clone());
        assert!(Rc::ptr_eq(first.children.borrow().last().unwrap(), &marker));
        assert!(is_connected(&marker));
        assert_eq!(text_content(&first), "one");

        assert!(detach(&marker));
        assert!(!is_connected(&marker));
        assert!(!detach(&marker));
    }

    #[test]
    fn test_set_and_remove_attr() {
        let dom = dom("<p class='a b'>x</p>");
        let p = find_nodes(&dom.document, &["p"]).remove(0);
        assert!(has_class(&p, "b"));

        set_node_attr(&p, "lang", Some("en".to_string()));
        assert_eq!(get_node_attr(&p, "lang").as_deref(), Some("en"));

        set_node_attr(&p, "lang", None);
        assert_eq!(get_node_attr(&p, "lang"), None);
    }
}
