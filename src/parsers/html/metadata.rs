//! 文档元数据：字符集声明

use encoding_rs::Encoding;
use markup5ever_rcdom::{Handle, RcDom};

use super::dom::{find_nodes, get_node_attr, html_to_dom};

/// 读取 `<meta charset>` 或 `<meta http-equiv="content-type">` 声明的字符集
pub fn get_charset(node: &Handle) -> Option<String> {
    for meta_node in find_nodes(node, &["html", "head", "meta"]).iter() {
        if let Some(charset) = get_node_attr(meta_node, "charset") {
            return Some(charset.trim().to_string());
        }

        let is_content_type = get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type");
        if is_content_type {
            if let Some(content) = get_node_attr(meta_node, "content") {
                return charset_from_content_type(&content);
            }
        }
    }

    None
}

/// `text/html; charset=gbk` → `gbk`
fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|charset| !charset.is_empty())
    })
}

/// 解析文档，并按页面自己声明的字符集重新解码
///
/// 先按 UTF-8 解析以读取 `<meta>` 声明；声明了可识别的其他编码时用该编码重新解析。
/// 返回 DOM 与文档编码，序列化时应使用同一编码。
pub fn html_to_dom_with_declared_charset(data: &[u8]) -> std::io::Result<(RcDom, String)> {
    let utf8 = encoding_rs::UTF_8.name();
    let dom = html_to_dom(data, utf8)?;

    let declared = get_charset(&dom.document)
        .and_then(|label| Encoding::for_label_no_replacement(label.as_bytes()));
    match declared {
        Some(encoding) if encoding != encoding_rs::UTF_8 => {
            tracing::debug!("页面声明字符集 {}，重新解析", encoding.name());
            Ok((html_to_dom(data, encoding.name())?, encoding.name().to_string()))
        }
        _ => Ok((dom, utf8.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::{serialize_document, text_content};

    #[test]
    fn test_get_charset_forms() {
        let meta = html_to_dom(b"<html><head><meta charset=\"GBK\"></head></html>", "utf-8").unwrap();
        assert_eq!(get_charset(&meta.document).as_deref(), Some("GBK"));

        let http_equiv = html_to_dom(
            b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"></head></html>",
            "utf-8",
        )
        .unwrap();
        assert_eq!(get_charset(&http_equiv.document).as_deref(), Some("windows-1252"));

        let none = html_to_dom(b"<p>no meta</p>", "utf-8").unwrap();
        assert_eq!(get_charset(&none.document), None);
    }

    #[test]
    fn test_declared_charset_is_used_for_parse_and_serialize() {
        let (bytes, _, _) = encoding_rs::GBK.encode(
            "<html><head><meta charset=\"gbk\"></head><body><p>简体中文段落</p></body></html>",
        );

        let (dom, encoding) = html_to_dom_with_declared_charset(&bytes).unwrap();
        assert_eq!(encoding, "GBK");
        let p = find_nodes(&dom.document, &["p"]).remove(0);
        assert_eq!(text_content(&p), "简体中文段落");

        let out = serialize_document(&dom.document, &encoding).unwrap();
        let (decoded, _, had_errors) = encoding_rs::GBK.decode(&out);
        assert!(!had_errors);
        assert!(decoded.contains("<p>简体中文段落</p>"));
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        let html = "<html><head><meta charset=\"no-such\"></head><body><p>héllo</p></body></html>";
        let (dom, encoding) = html_to_dom_with_declared_charset(html.as_bytes()).unwrap();
        assert_eq!(encoding, "UTF-8");
        let p = find_nodes(&dom.document, &["p"]).remove(0);
        assert_eq!(text_content(&p), "héllo");
    }
}
