//! 译文拆分与对齐
//!
//! 把模型返回的整段译文拆回逐个单元的译文。纯函数，不接触 DOM。

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::constants::SEPARATOR_TOKEN;

const BARE_TOKEN: &str = "TRANSLATE_SEPARATOR";

static EXACT_SEPARATOR: OnceLock<Option<Regex>> = OnceLock::new();
static BARE_SEPARATOR: OnceLock<Option<Regex>> = OnceLock::new();
static PARAGRAPH_BREAK: OnceLock<Option<Regex>> = OnceLock::new();

/// 使用的拆分方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// 完整的 `<<TRANSLATE_SEPARATOR>>`
    Separator,
    /// 模型丢掉了尖括号，只剩 `TRANSLATE_SEPARATOR`
    BareToken,
    /// 按空行拆分，且段数恰好吻合
    Paragraphs,
    /// 整段作为一个片段
    Whole,
}

/// 对齐结果
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// 按位置对应单元的译文，长度不超过期望数量
    pub segments: Vec<String>,
    /// 没有拿到译文的单元数
    pub unresolved: usize,
    pub strategy: SplitStrategy,
}

impl Reconciliation {
    pub fn is_complete(&self) -> bool {
        self.unresolved == 0
    }
}

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!("分隔符正则编译失败 {}: {}", pattern, e);
            None
        }
    })
    .as_ref()
}

fn split_on(regex: Option<&Regex>, literal: &str, blob: &str) -> Vec<String> {
    let pieces: Vec<&str> = match regex {
        Some(regex) => regex.split(blob).collect(),
        None => blob.split(literal).collect(),
    };
    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// 拆分译文并与期望数量对齐
///
/// 依次尝试完整分隔符、无括号分隔符、空行拆分（段数必须吻合），最后整段作为一个片段。
/// 片段少于期望时只填充前面的单元，多于期望时截断并记录日志。
pub fn reconcile(blob: &str, expected: usize) -> Reconciliation {
    if expected == 0 {
        return Reconciliation {
            segments: Vec::new(),
            unresolved: 0,
            strategy: SplitStrategy::Whole,
        };
    }

    let (mut segments, strategy) = split(blob, expected);

    if segments.len() > expected {
        tracing::warn!(
            "译文片段多于原文: 期望 {}，得到 {}，丢弃多余部分",
            expected,
            segments.len()
        );
        segments.truncate(expected);
    } else if segments.len() < expected {
        tracing::warn!(
            "译文片段少于原文: 期望 {}，得到 {}（{:?}）",
            expected,
            segments.len(),
            strategy
        );
    }

    Reconciliation {
        unresolved: expected - segments.len(),
        segments,
        strategy,
    }
}

fn split(blob: &str, expected: usize) -> (Vec<String>, SplitStrategy) {
    if blob.contains(SEPARATOR_TOKEN) {
        let regex = compiled(&EXACT_SEPARATOR, r"\s*<<TRANSLATE_SEPARATOR>>\s*");
        return (split_on(regex, SEPARATOR_TOKEN, blob), SplitStrategy::Separator);
    }

    if blob.contains(BARE_TOKEN) {
        let regex = compiled(&BARE_SEPARATOR, r"\s*<*\s*TRANSLATE_SEPARATOR\s*>*\s*");
        return (split_on(regex, BARE_TOKEN, blob), SplitStrategy::BareToken);
    }

    if expected > 1 {
        let regex = compiled(&PARAGRAPH_BREAK, r"\n[ \t\r]*\n\s*");
        let paragraphs = split_on(regex, "\n\n", blob);
        if paragraphs.len() == expected {
            return (paragraphs, SplitStrategy::Paragraphs);
        }
    }

    let whole = blob.trim();
    let segments = if whole.is_empty() {
        Vec::new()
    } else {
        vec![whole.to_string()]
    };
    (segments, SplitStrategy::Whole)
}
