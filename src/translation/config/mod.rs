//! 翻译配置管理模块
//!
//! 设置以 TOML/JSON 文件、环境变量和默认值分层加载，运行开始时读取一次。

pub mod manager;

pub use manager::{ConfigManager, MemorySettingsStore, Settings, SettingsStore};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关
    pub const DEFAULT_MAX_BATCH_LENGTH: usize = 8000;
    pub const DEFAULT_MAX_BATCH_ELEMENTS: usize = 20;
    pub const MIN_BATCH_LENGTH: usize = 1000;

    /// 段落分隔标记，模型必须原样保留
    pub const SEPARATOR_TOKEN: &str = "<<TRANSLATE_SEPARATOR>>";
    /// 批次内各段之间实际插入的分隔符
    pub const BATCH_SEPARATOR: &str = "\n\n<<TRANSLATE_SEPARATOR>>\n\n";

    // 令牌预算
    pub const OUTPUT_SAFETY_MARGIN: f64 = 0.9;
    pub const CHARS_PER_TOKEN: usize = 4;
    pub const MIN_SAFE_BATCH_CHARS: usize = 1000;
    pub const UNKNOWN_MODEL_OUTPUT_TOKENS: u32 = 4000;
    pub const FALLBACK_REQUEST_MAX_TOKENS: u32 = 3600;
    pub const GEMINI_MAX_REQUEST_TOKENS: u32 = 7372;

    // 请求设置
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    pub const MIN_REQUEST_TIMEOUT_SECS: u64 = 15;
    pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 120;
    pub const DEFAULT_TEMPERATURE: f64 = 0.3;

    // 语言设置
    pub const DEFAULT_TARGET_LANGUAGE: &str = "zh-TW";
    pub const DEFAULT_EXPERT_MODE: &str = "general";
    pub const DEFAULT_LANGUAGE_DETECTION_CHARS: usize = 600;
    pub const LANGUAGE_SAMPLE_COUNT: usize = 10;
    pub const LANGUAGE_SAMPLE_MIN_CHARS: usize = 20;
    pub const MIN_DETECTION_CHARS: usize = 10;

    // 文本过滤相关
    pub const MIN_STRUCTURAL_TEXT_LENGTH: usize = 2;
    pub const MIN_CONTAINER_TEXT_LENGTH: usize = 11;

    // DOM 标记
    pub const TRANSLATION_BLOCK_CLASS: &str = "ai-translation-block";
    pub const LOADING_CLASS: &str = "loading";
    pub const PLACEHOLDER_ID_ATTR: &str = "data-element-id";
    pub const LOADING_TEXT: &str = "翻譯中 ";

    /// 扩展自身 UI 的根节点 id
    pub const EXTENSION_UI_IDS: &[&str] = &[
        "ai-translation-floating-container",
        "ai-translation-language-menu",
        "ai-translation-error-modal",
        "ai-translation-same-language-modal",
    ];

    // 功能性词汇
    pub const FUNCTIONAL_WORDS: &[&str] = &[
        "ok", "yes", "no", "on", "off", "go", "up", "x", ">", "▶", "▲", "▼", "◀", "•",
    ];

    /// 环境变量前缀
    pub const ENV_PREFIX: &str = "TRANSCRAFT";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "transcraft.toml",
        ".transcraft.toml",
        "~/.config/transcraft/config.toml",
        "/etc/transcraft/config.toml",
    ];
}
