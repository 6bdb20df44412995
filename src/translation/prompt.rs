//! 系统提示构建
//!
//! 系统提示 = 分隔符保留指令 + 专家模式角色描述 + 通用翻译规则。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::translation::config::constants::SEPARATOR_TOKEN;
use crate::translation::error::ConfigError;

/// 目标语言占位符
const TARGET_LANGUAGE_PLACEHOLDER: &str = "{targetLanguage}";

/// 所有模式共用的翻译规则
pub const COMMON_TRANSLATION_INSTRUCTIONS: &str = "
IMPORTANT: If you see <<TRANSLATE_SEPARATOR>> in the text, you MUST preserve it exactly as is in your translation. This is a delimiter between different text segments.

CRITICAL RULES:
- Translate ALL content regardless of punctuation, symbols, quotes, brackets, ellipses, or any other marks
- Do not skip any text segments, even if they contain unusual characters, symbols, or formatting
- Every piece of text must be translated
- Preserve the original formatting and tone
- Provide ONLY the direct translation
- Never add commentary, explanations, status updates, or meta-text about the translation process itself
- Your response should contain nothing but the translated content
";

const SEPARATOR_INSTRUCTION: &str = "CRITICAL INSTRUCTION: The text contains <<TRANSLATE_SEPARATOR>> markers that divide different text segments. You MUST:
1. Translate each segment separately
2. Keep the <<TRANSLATE_SEPARATOR>> markers EXACTLY as they appear in the original text
3. Maintain the same number of segments as the input
4. Do NOT combine segments or change the separator format

";

/// 内置专家模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpertMode {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub role_prompt: &'static str,
}

pub const BUILTIN_EXPERT_MODES: &[ExpertMode] = &[
    ExpertMode {
        id: "general",
        name: "一般翻譯",
        description: "標準翻譯模式",
        role_prompt: "You are a professional translator. Translate the following text to {targetLanguage}.",
    },
    ExpertMode {
        id: "novel_general",
        name: "小說模式（通用）",
        description: "適合一般小說翻譯，保持文學性和情感表達",
        role_prompt: "You are a literary translator specializing in novels and creative works. Translate the following text to {targetLanguage}. Maintain the literary style, emotional nuances, character voices, and narrative flow. Preserve cultural references when appropriate and adapt them naturally. Focus on readability and emotional impact rather than literal accuracy.",
    },
    ExpertMode {
        id: "novel_romance",
        name: "愛情小說模式",
        description: "專為愛情小說設計，強調情感細膩和浪漫氛圍",
        role_prompt: "You are a specialized translator for romance novels. Translate the following text to {targetLanguage}. Focus on conveying intimate emotions, romantic tension, and passionate expressions. Maintain the sensual and emotional tone while preserving character chemistry and romantic dialogue. Use elegant and evocative language that captures the heart-fluttering moments and emotional depth. Adapt cultural expressions of love and affection appropriately.",
    },
    ExpertMode {
        id: "novel_fantasy",
        name: "奇幻小說模式",
        description: "適合奇幻冒險小說，保持魔法世界觀和史詩感",
        role_prompt: "You are a fantasy literature translator specializing in magical worlds and epic adventures. Translate the following text to {targetLanguage}. Maintain the grandeur and mystique of fantasy settings, preserve magical terminology and world-building elements. Keep character names, place names, and unique fantasy concepts consistent. Convey the sense of wonder, adventure, and epic scale while maintaining readability. Adapt magical concepts and mythological references appropriately for the target culture.",
    },
    ExpertMode {
        id: "novel_mystery",
        name: "懸疑推理模式",
        description: "專為懸疑推理小說設計，保持緊張感和邏輯性",
        role_prompt: "You are a mystery and thriller translator specializing in suspenseful narratives. Translate the following text to {targetLanguage}. Maintain the tension, pacing, and atmospheric elements crucial to mystery stories. Preserve clues, red herrings, and logical deductions accurately. Keep investigative terminology and procedural details precise. Convey psychological tension, fear, and anticipation while maintaining clarity for readers to follow the plot. Adapt cultural references to crime, law enforcement, and social contexts appropriately.",
    },
    ExpertMode {
        id: "novel_scifi",
        name: "科幻小說模式",
        description: "適合科幻小說，平衡科學概念和想像力",
        role_prompt: "You are a science fiction translator specializing in futuristic and technological narratives. Translate the following text to {targetLanguage}. Maintain scientific accuracy where applicable while preserving speculative and imaginative elements. Keep technological terminology consistent and comprehensible. Convey the wonder of scientific discovery and future possibilities. Preserve world-building elements related to advanced civilizations, space exploration, and technological concepts. Adapt scientific and cultural concepts appropriately while maintaining the visionary aspect of the genre.",
    },
    ExpertMode {
        id: "novel_historical",
        name: "歷史小說模式",
        description: "適合歷史小說，保持時代感和文化背景",
        role_prompt: "You are a historical fiction translator specializing in period literature. Translate the following text to {targetLanguage}. Maintain historical authenticity and period-appropriate language while remaining accessible to modern readers. Preserve cultural references, social customs, and historical context accurately. Keep historical figures, places, and events factually correct. Convey the atmosphere and mindset of the historical period while adapting archaic expressions for contemporary understanding. Balance historical accuracy with narrative flow and readability.",
    },
    ExpertMode {
        id: "novel_literary",
        name: "文學小說模式",
        description: "適合純文學作品，注重文字藝術和深層意涵",
        role_prompt: "You are a literary translator specializing in high-quality literary fiction. Translate the following text to {targetLanguage}. Focus on preserving the artistic and poetic qualities of the prose. Maintain complex themes, symbolic meanings, and metaphorical language. Pay special attention to rhythm, style, and the author's unique voice. Preserve literary devices such as irony, symbolism, and stream of consciousness. Convey philosophical and psychological depth while maintaining the aesthetic beauty of the original text. Prioritize literary merit and artistic expression over literal translation.",
    },
    ExpertMode {
        id: "technical",
        name: "科技模式",
        description: "適合技術文件翻譯，保持專業術語準確性",
        role_prompt: "You are a technical translator specializing in technology and scientific documents. Translate the following text to {targetLanguage}. Maintain technical accuracy, use proper terminology, and preserve the formal tone. Keep technical terms, API names, code snippets, and specifications unchanged when they are industry standards. Ensure clarity and precision for technical readers.",
    },
    ExpertMode {
        id: "academic",
        name: "學術模式",
        description: "適合學術論文翻譯，保持嚴謹性",
        role_prompt: "You are an academic translator specializing in scholarly works. Translate the following text to {targetLanguage}. Maintain academic rigor, preserve citations, methodology descriptions, and formal academic tone. Use appropriate academic vocabulary and ensure logical flow of arguments. Keep proper nouns, research terms, and statistical data accurate.",
    },
    ExpertMode {
        id: "business",
        name: "商業模式",
        description: "適合商業文件翻譯，保持專業語調",
        role_prompt: "You are a business translator specializing in corporate communications. Translate the following text to {targetLanguage}. Maintain professional tone, business terminology, and corporate etiquette. Adapt cultural business practices appropriately while preserving the original intent. Focus on clarity and professional impact.",
    },
];

/// 用户自定义的专家模式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CustomExpertMode {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
}

/// 语言代码 → 提示中使用的语言名称
pub fn language_name(code: &str) -> &str {
    match code {
        "zh-TW" => "Traditional Chinese",
        "zh-CN" => "Simplified Chinese",
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        other => other,
    }
}

/// 模式 ID 只允许字母、数字和下划线
pub fn validate_mode_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Invalid(format!(
            "模式 ID 只能包含英文字母、数字和底线: {:?}",
            id
        )));
    }
    Ok(())
}

/// 提示目录：内置模式 + 设置中的自定义模式与通用规则
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    custom_modes: BTreeMap<String, CustomExpertMode>,
    common_instructions: Option<String>,
}

impl PromptCatalog {
    pub fn new(
        custom_modes: BTreeMap<String, CustomExpertMode>,
        common_instructions: Option<String>,
    ) -> Self {
        Self {
            custom_modes,
            common_instructions: common_instructions.filter(|text| !text.trim().is_empty()),
        }
    }

    /// 查找角色描述；自定义模式可覆盖同名内置模式，未知模式回退到 general
    pub fn role_prompt(&self, mode: &str) -> &str {
        if let Some(custom) = self.custom_modes.get(mode) {
            if !custom.system_prompt.trim().is_empty() {
                return &custom.system_prompt;
            }
        }

        BUILTIN_EXPERT_MODES
            .iter()
            .find(|m| m.id == mode)
            .or_else(|| BUILTIN_EXPERT_MODES.first())
            .map(|m| m.role_prompt)
            .unwrap_or_default()
    }

    /// 所有可用模式的 ID
    pub fn mode_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = BUILTIN_EXPERT_MODES
            .iter()
            .map(|m| m.id.to_string())
            .collect();
        for id in self.custom_modes.keys() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// 构建完整的系统提示
    pub fn build_system_prompt(&self, mode: &str, target_language: &str) -> String {
        let role = self
            .role_prompt(mode)
            .replacen(TARGET_LANGUAGE_PLACEHOLDER, language_name(target_language), 1);
        let common = self
            .common_instructions
            .as_deref()
            .unwrap_or(COMMON_TRANSLATION_INSTRUCTIONS);

        with_separator_instruction(format!("{}{}", role, common))
    }
}

/// 在提示开头补上分隔符保留指令（已提及分隔符时不重复）
pub fn with_separator_instruction(prompt: String) -> String {
    if prompt.contains(SEPARATOR_TOKEN) {
        prompt
    } else {
        format!("{}{}", SEPARATOR_INSTRUCTION, prompt)
    }
}
