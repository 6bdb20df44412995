//! 运行结束后的错误汇总
//!
//! 可恢复错误按类别累计受影响的元素数，展示时按类别优先级排序，
//! 最高优先级类别的补救建议排在最前面。致命错误另行生成 [`FatalNotice`]。

use std::collections::BTreeMap;
use std::fmt;

use crate::translation::error::{ErrorCategory, TranslationError};

/// 单个类别的汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorGroup {
    pub category: ErrorCategory,
    pub label: &'static str,
    /// 受影响的元素数
    pub count: usize,
    /// 该类别最先出现的一条错误消息
    pub sample: String,
}

/// 错误汇总
#[derive(Debug, Clone, Default)]
pub struct ErrorSummary {
    groups: BTreeMap<ErrorCategory, (usize, String)>,
}

impl ErrorSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次失败及其影响的元素数
    pub fn record(&mut self, error: &TranslationError, affected: usize) {
        let entry = self
            .groups
            .entry(error.category())
            .or_insert_with(|| (0, error.to_string()));
        entry.0 += affected;
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 失败元素总数
    pub fn total_failed(&self) -> usize {
        self.groups.values().map(|(count, _)| count).sum()
    }

    /// 按优先级排序的分组
    pub fn groups(&self) -> Vec<ErrorGroup> {
        self.groups
            .iter()
            .map(|(category, (count, sample))| ErrorGroup {
                category: *category,
                label: category.label(),
                count: *count,
                sample: sample.clone(),
            })
            .collect()
    }

    /// 优先级最高的类别
    pub fn primary(&self) -> Option<ErrorCategory> {
        self.groups.keys().next().copied()
    }

    pub fn remediation(&self) -> Option<&'static str> {
        self.primary().map(|category| category.remediation())
    }

    /// 生成面向用户的汇总文本
    pub fn render(&self, succeeded: usize) -> String {
        let mut out = format!(
            "翻译完成：成功 {} 个，失败 {} 个",
            succeeded,
            self.total_failed()
        );
        if let Some(hint) = self.remediation() {
            out.push_str(&format!("\n建议：{}", hint));
        }
        for group in self.groups() {
            out.push_str(&format!(
                "\n  - {}：{} 个元素（{}）",
                group.label, group.count, group.sample
            ));
        }
        out
    }
}

/// 致命错误提示
#[derive(Debug, Clone, PartialEq)]
pub struct FatalNotice {
    pub error: TranslationError,
    pub title: &'static str,
    pub remediation: &'static str,
}

impl FatalNotice {
    pub fn from_error(error: TranslationError) -> Self {
        let category = error.category();
        Self {
            title: category.label(),
            remediation: category.remediation(),
            error,
        }
    }
}

impl fmt::Display for FatalNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}：{}。{}", self.title, self.error, self.remediation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::QuotaCause;
    use std::time::Duration;

    #[test]
    fn test_groups_follow_priority_order() {
        let mut summary = ErrorSummary::new();
        summary.record(&TranslationError::unknown("odd"), 2);
        summary.record(&TranslationError::NetworkError("reset".into()), 3);
        summary.record(&TranslationError::Timeout(Duration::from_secs(60)), 1);
        summary.record(
            &TranslationError::QuotaExceeded(QuotaCause::RateLimited, "429".into()),
            4,
        );

        let order: Vec<ErrorCategory> = summary.groups().iter().map(|g| g.category).collect();
        assert_eq!(
            order,
            vec![ErrorCategory::RateLimit, ErrorCategory::Network, ErrorCategory::Unknown]
        );
        assert_eq!(summary.groups()[1].count, 4);
        assert_eq!(summary.total_failed(), 10);
        assert_eq!(summary.primary(), Some(ErrorCategory::RateLimit));
    }

    #[test]
    fn test_render_puts_primary_hint_first() {
        let mut summary = ErrorSummary::new();
        summary.record(&TranslationError::NetworkError("reset".into()), 2);
        summary.record(
            &TranslationError::QuotaExceeded(QuotaCause::Billing, "402".into()),
            1,
        );

        let text = summary.render(7);
        assert!(text.starts_with("翻译完成：成功 7 个，失败 3 个"));
        let hint = text.find(ErrorCategory::Billing.remediation()).unwrap();
        let network = text.find(ErrorCategory::Network.label()).unwrap();
        assert!(hint < network);
    }

    #[test]
    fn test_fatal_notice_names_remediation() {
        let notice = FatalNotice::from_error(TranslationError::AuthError("invalid key".into()));
        assert_eq!(notice.remediation, ErrorCategory::Auth.remediation());
        assert!(notice.to_string().contains("invalid key"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = ErrorSummary::new();
        assert!(summary.is_empty());
        assert_eq!(summary.remediation(), None);
        assert_eq!(summary.render(3), "翻译完成：成功 3 个，失败 0 个");
    }
}
