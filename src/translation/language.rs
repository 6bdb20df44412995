//! 语言检测闸门
//!
//! 抽样页面文本，判断源语言是否已经等于目标语言；相同则整次翻译可以跳过。
//! 检测分两层：拉丁、西里尔、阿拉伯文字先交给 whatlang，其余按文字区块占比的启发式判断。

use whatlang::{Lang, Script};

use crate::translation::config::constants;
use crate::translation::unit::Segment;

/// 繁体专用指示字（与简体集合不相交）
const TRADITIONAL_INDICATORS: &str = "繁體複雜學習開關們這樣時間問題說話語國經濟發變";
/// 简体专用指示字
const SIMPLIFIED_INDICATORS: &str = "简体复杂学习开关们这样时间问题说话语国经济发变";

/// 常用词投票表
const WORD_PATTERNS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "is", "are", "was", "were", "have", "has", "been", "being", "and", "or", "but",
            "in", "on", "at", "to", "for", "of", "with", "from", "about", "that", "this", "these",
            "those", "what", "where", "when", "why", "how",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "los", "las", "de", "del", "y", "que", "es", "en", "un", "una", "por",
            "para", "con", "sin", "sobre", "pero", "más", "muy", "todo", "todos", "esta", "este",
            "estos", "estas",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "de", "du", "des", "et", "que", "est", "dans", "un", "une", "pour",
            "avec", "sans", "sur", "mais", "plus", "très", "tout", "tous", "cette", "cet", "ces",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "den", "dem", "des", "und", "ist", "sind", "war", "waren",
            "haben", "hat", "hatte", "in", "auf", "an", "zu", "für", "von", "mit", "aus", "bei",
            "nach",
        ],
    ),
    (
        "it",
        &[
            "il", "lo", "la", "i", "gli", "le", "di", "del", "della", "e", "che", "è", "sono",
            "in", "un", "uno", "una", "per", "con", "senza", "su", "ma", "più", "molto", "tutto",
            "tutti",
        ],
    ),
    (
        "pt",
        &[
            "o", "a", "os", "as", "de", "do", "da", "dos", "das", "e", "que", "é", "são", "em",
            "um", "uma", "para", "por", "com", "sem", "sobre", "mas", "mais", "muito", "todo",
            "todos",
        ],
    ),
];

const MIN_WORD_VOTES: usize = 3;

/// 页面上下文提示
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageHints {
    /// `<html lang>`，小写
    pub html_lang: Option<String>,
    /// 页面主机名，小写
    pub hostname: Option<String>,
}

impl PageHints {
    pub fn new(html_lang: Option<&str>, hostname: Option<&str>) -> Self {
        Self {
            html_lang: html_lang.map(str::to_lowercase),
            hostname: hostname.map(str::to_lowercase),
        }
    }

    fn simplified_context(&self) -> bool {
        self.html_lang.as_deref().is_some_and(|l| l.contains("cn"))
            || self.hostname.as_deref().is_some_and(|h| h.contains(".cn"))
    }

    fn traditional_context(&self) -> bool {
        self.html_lang
            .as_deref()
            .is_some_and(|l| l.contains("tw") || l.contains("hk"))
            || self
                .hostname
                .as_deref()
                .is_some_and(|h| h.contains(".tw") || h.contains(".hk"))
    }
}

/// 文字区块计数
#[derive(Debug, Default, Clone, Copy)]
struct ScriptCounts {
    total: usize,
    han: usize,
    kana: usize,
    hangul: usize,
    arabic: usize,
    thai: usize,
    cyrillic: usize,
    latin: usize,
}

impl ScriptCounts {
    fn of(text: &str) -> Self {
        let mut counts = ScriptCounts::default();
        for c in text.chars() {
            // 只统计字母、数字与空白
            if !(c.is_alphanumeric() || c.is_whitespace()) {
                continue;
            }
            counts.total += 1;
            match c as u32 {
                0x4E00..=0x9FFF => counts.han += 1,
                0x3040..=0x30FF => counts.kana += 1,
                0xAC00..=0xD7AF => counts.hangul += 1,
                0x0600..=0x06FF => counts.arabic += 1,
                0x0E00..=0x0E7F => counts.thai += 1,
                0x0400..=0x04FF => counts.cyrillic += 1,
                _ if c.is_ascii_alphabetic() => counts.latin += 1,
                _ => {}
            }
        }
        counts
    }

    fn ratio(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64
        }
    }
}

/// 从单元中均匀抽样，拼接成检测文本
///
/// 在 `floor(len / 10 * i)` 处取 10 个样本，优先使用长度超过 20 的文本，
/// 都不够长时退回使用全部样本；结果截断到 `max_chars` 个字符。
pub fn sample_text<T: Segment>(units: &[T], max_chars: usize) -> String {
    if units.is_empty() {
        return String::new();
    }

    let count = constants::LANGUAGE_SAMPLE_COUNT.min(units.len());
    let step = units.len() as f64 / count as f64;
    let sampled: Vec<&str> = (0..count)
        .map(|i| units[((step * i as f64).floor() as usize).min(units.len() - 1)].source_text())
        .collect();

    let long: Vec<&str> = sampled
        .iter()
        .copied()
        .filter(|text| text.chars().count() > constants::LANGUAGE_SAMPLE_MIN_CHARS)
        .collect();
    let chosen = if long.is_empty() { sampled } else { long };

    chosen.join(" ").chars().take(max_chars).collect()
}

/// 检测文本语言，无法判断时返回 `None`
pub fn detect_language(text: &str, hints: &PageHints) -> Option<String> {
    let counts = ScriptCounts::of(text);
    if counts.total < constants::MIN_DETECTION_CHARS {
        tracing::debug!("检测文本过短（{} 字符），跳过语言检测", counts.total);
        return None;
    }

    if counts.ratio(counts.han) > 0.2 {
        return Some(detect_chinese_variant(text, hints).to_string());
    }

    if counts.kana > 0 && (counts.ratio(counts.kana) > 0.05 || counts.kana > 10) {
        return Some("ja".to_string());
    }

    if let Some(code) = detect_statistically(text) {
        return Some(code);
    }

    let thresholds = [
        (counts.hangul, "ko"),
        (counts.thai, "th"),
        (counts.arabic, "ar"),
        (counts.cyrillic, "ru"),
    ];
    if let Some((_, code)) = thresholds
        .iter()
        .find(|(count, _)| counts.ratio(*count) > 0.3)
    {
        return Some(code.to_string());
    }

    if counts.ratio(counts.latin) > 0.7 {
        return Some(vote_latin_language(text).to_string());
    }

    tracing::debug!("未能识别语言: {:?}", counts);
    None
}

/// whatlang 只用于字母文字，且结果必须可靠
fn detect_statistically(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    if !matches!(info.script(), Script::Latin | Script::Cyrillic | Script::Arabic) {
        return None;
    }
    if !info.is_reliable() {
        tracing::debug!(
            "whatlang 结果不可靠: {:?} (置信度 {:.2})",
            info.lang(),
            info.confidence()
        );
        return None;
    }

    let code = lang_to_code(info.lang())?;
    tracing::debug!("whatlang 检测结果: {}", code);
    Some(code.to_string())
}

fn lang_to_code(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Pol => "pl",
        Lang::Tur => "tr",
        Lang::Vie => "vi",
        Lang::Swe => "sv",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Bul => "bg",
        Lang::Ara => "ar",
        Lang::Pes => "fa",
        Lang::Urd => "ur",
        _ => return None,
    };
    Some(code)
}

fn detect_chinese_variant(text: &str, hints: &PageHints) -> &'static str {
    let traditional = text
        .chars()
        .filter(|c| TRADITIONAL_INDICATORS.contains(*c))
        .count();
    let simplified = text
        .chars()
        .filter(|c| SIMPLIFIED_INDICATORS.contains(*c))
        .count();

    tracing::debug!("繁简指示字: 繁体 {} / 简体 {}", traditional, simplified);

    if simplified > 0 && simplified as f64 > traditional as f64 * 1.5 {
        return "zh-CN";
    }
    if traditional > 0 && traditional as f64 > simplified as f64 * 1.5 {
        return "zh-TW";
    }
    if hints.simplified_context() {
        return "zh-CN";
    }
    if hints.traditional_context() {
        return "zh-TW";
    }

    if traditional >= simplified {
        "zh-TW"
    } else {
        "zh-CN"
    }
}

/// 按常用词出现次数投票，票数不足时默认英语
fn vote_latin_language(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best = ("en", 0usize);
    for (code, vocabulary) in WORD_PATTERNS {
        let votes = words.iter().filter(|w| vocabulary.contains(w)).count();
        if votes > best.1 {
            best = (code, votes);
        }
    }

    if best.1 >= MIN_WORD_VOTES {
        best.0
    } else {
        "en"
    }
}

/// 规范化语言代码：中文保留地区变体，其余语言去掉地区后缀
pub fn normalize_language(code: &str) -> String {
    let lower = code.trim().to_lowercase();
    if lower.starts_with("zh") {
        match lower.as_str() {
            "zh-tw" | "zh-hk" | "zh-hant" => "zh-TW".to_string(),
            "zh-cn" | "zh-sg" | "zh-hans" => "zh-CN".to_string(),
            _ => code.trim().to_string(),
        }
    } else {
        lower.split('-').next().unwrap_or_default().to_string()
    }
}

/// 检测结果与目标语言相同时返回 true
pub fn same_language(detected: &str, target: &str) -> bool {
    normalize_language(detected) == normalize_language(target)
}

/// 语言闸门判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed { detected: Option<String> },
    Skip { detected: String },
}

/// 抽样文本已经是目标语言时跳过；无法判断时继续翻译
pub fn should_skip(sample: &str, target_language: &str, hints: &PageHints) -> GateDecision {
    match detect_language(sample, hints) {
        Some(detected) if same_language(&detected, target_language) => {
            tracing::info!("页面语言 {} 与目标语言 {} 相同", detected, target_language);
            GateDecision::Skip { detected }
        }
        detected => {
            tracing::debug!(
                "语言检测: {:?} → {}，继续翻译",
                detected,
                target_language
            );
            GateDecision::Proceed { detected }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skips(sample: &str, target: &str) -> bool {
        matches!(
            should_skip(sample, target, &PageHints::default()),
            GateDecision::Skip { .. }
        )
    }

    #[test]
    fn test_traditional_indicator_text() {
        let sample = "這樣時間問題說話語國經濟發變學習開關繁體複雜們這樣時間問題說話語國經濟發變".repeat(3) + "的";
        assert!(skips(&sample, "zh-TW"));
        assert!(!skips(&sample, "zh-CN"));
    }

    #[test]
    fn test_simplified_indicator_text() {
        let sample = "这样的时间问题说话语言国家经济发展变化学习开关".repeat(2);
        assert_eq!(
            detect_language(&sample, &PageHints::default()).as_deref(),
            Some("zh-CN")
        );
    }

    #[test]
    fn test_hints_break_ties() {
        let neutral = "我今天去散步看花喝茶聊天";
        let hints = PageHints::new(Some("zh-TW"), None);
        assert_eq!(detect_chinese_variant(neutral, &hints), "zh-TW");
        let hints = PageHints::new(None, Some("news.example.cn"));
        assert_eq!(detect_chinese_variant(neutral, &hints), "zh-CN");
    }

    #[test]
    fn test_japanese_by_kana() {
        let sample = "これはにほんごのぶんしょうです。ひらがなとカタカナがたくさんあります。";
        assert_eq!(
            detect_language(sample, &PageHints::default()).as_deref(),
            Some("ja")
        );
    }

    #[test]
    fn test_korean_and_thai() {
        assert_eq!(
            detect_language("안녕하세요 오늘 날씨가 정말 좋네요", &PageHints::default()).as_deref(),
            Some("ko")
        );
        assert_eq!(
            detect_language("สวัสดีครับ วันนี้อากาศดีมาก", &PageHints::default()).as_deref(),
            Some("th")
        );
    }

    #[test]
    fn test_english_page() {
        let sample = "The quick brown fox jumps over the lazy dog and this is what happens when the dog wakes up.";
        assert_eq!(
            detect_language(sample, &PageHints::default()).as_deref(),
            Some("en")
        );
        assert!(skips(sample, "en-US"));
        assert!(!skips(sample, "zh-TW"));
    }

    #[test]
    fn test_word_vote() {
        assert_eq!(vote_latin_language("el perro y la casa de los niños para todos"), "es");
        assert_eq!(vote_latin_language("xyz qwe"), "en");
    }

    #[test]
    fn test_short_text_is_undetermined() {
        assert_eq!(detect_language("Hi!", &PageHints::default()), None);
        assert!(!skips("Hi!", "en"));
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("en-US"), "en");
        assert_eq!(normalize_language("zh-TW"), "zh-TW");
        assert_eq!(normalize_language("zh-hk"), "zh-TW");
        assert!(!same_language("zh-TW", "zh-CN"));
        assert!(same_language("pt-BR", "pt"));
    }

    #[test]
    fn test_sampling_prefers_long_texts() {
        let units: Vec<String> = (0..30)
            .map(|i| {
                if i % 3 == 0 {
                    format!("paragraph number {} with plenty of words", i)
                } else {
                    "short".to_string()
                }
            })
            .collect();
        let sample = sample_text(&units, 600);
        assert!(sample.starts_with("paragraph number 0"));
        assert!(!sample.contains("short"));

        let truncated = sample_text(&units, 12);
        assert_eq!(truncated.chars().count(), 12);
    }

    #[test]
    fn test_sampling_falls_back_to_short_texts() {
        let units = vec!["a".to_string(), "b".to_string()];
        assert_eq!(sample_text(&units, 600), "a b");
        assert_eq!(sample_text::<String>(&[], 600), "");
    }
}
