//! 统一的环境变量管理
//!
//! 进程级的开关（日志级别、颜色、配置文件位置）通过类型安全的访问器读取；
//! 翻译设置本身由 [`crate::translation::config::ConfigManager`] 以 `TRANSCRAFT_` 前缀分层加载。

use std::env;
use std::fmt;
use std::path::PathBuf;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "TRANSCRAFT_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid log level '{}'. Use: trace, debug, info, warn, error", value),
                }),
            }
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Disable colored output when set to any value";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 显式指定的配置文件
    pub struct ConfigPath;
    impl EnvVar<PathBuf> for ConfigPath {
        const NAME: &'static str = "TRANSCRAFT_CONFIG";
        const DEFAULT: Option<PathBuf> = None;
        const DESCRIPTION: &'static str = "Path to a TOML settings file (overrides the default search paths)";

        fn parse(value: &str) -> EnvResult<PathBuf> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Path must not be empty".to_string(),
                });
            }
            Ok(PathBuf::from(shellexpand::tilde(trimmed).into_owned()))
        }
    }

    /// 调试模式
    pub struct DebugMode;
    impl EnvVar<bool> for DebugMode {
        const NAME: &'static str = "TRANSCRAFT_DEBUG_MODE";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Verbose per-batch logging (same as debug_mode in the settings file)";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled", value),
        }),
    }
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,
    pub no_color: bool,
    pub config_path: Option<PathBuf>,
    pub debug: bool,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,
            no_color: core::NoColor::get()?,
            config_path: match env::var(translation::ConfigPath::NAME) {
                Ok(value) => Some(translation::ConfigPath::parse(&value)?),
                Err(_) => None,
            },
            debug: translation::DebugMode::get()?,
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n",
        core::LogLevel::NAME, core::LogLevel::DESCRIPTION, "info"));
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n",
        core::NoColor::NAME, core::NoColor::DESCRIPTION, core::NoColor::DEFAULT));

    docs.push_str("\n## Translation Configuration\n\n");
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n",
        translation::ConfigPath::NAME, translation::ConfigPath::DESCRIPTION, translation::ConfigPath::DEFAULT));
    docs.push_str(&format!("- `{}`: {} (default: {:?})\n",
        translation::DebugMode::NAME, translation::DebugMode::DESCRIPTION, translation::DebugMode::DEFAULT));

    docs.push_str("\n## Settings Overrides\n\n");
    docs.push_str("Every settings key can be overridden with the `TRANSCRAFT_` prefix; nested maps use `__`:\n\n");
    for (key, example) in [
        ("SELECTED_API", "claude"),
        ("SELECTED_MODEL", "claude-3-5-sonnet-20241022"),
        ("API_KEYS__OPENAI", "sk-..."),
        ("TARGET_LANGUAGE", "zh-TW"),
        ("EXPERT_MODE", "technical"),
        ("MAX_BATCH_LENGTH", "8000"),
        ("MAX_BATCH_ELEMENTS", "20"),
        ("REQUEST_TIMEOUT", "60"),
        ("ENABLE_LANGUAGE_DETECTION", "true"),
        ("LANGUAGE_DETECTION_CHARS", "600"),
    ] {
        docs.push_str(&format!("- `TRANSCRAFT_{}` (e.g. `{}`)\n", key, example));
    }

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(core::LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(core::LogLevel::parse("warn").unwrap(), "warn");
        assert!(core::LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_boolean_parsing() {
        assert!(translation::DebugMode::parse("true").unwrap());
        assert!(translation::DebugMode::parse("1").unwrap());
        assert!(translation::DebugMode::parse("YES").unwrap());
        assert!(!translation::DebugMode::parse("off").unwrap());
        assert!(translation::DebugMode::parse("maybe").is_err());
    }

    #[test]
    fn test_config_path_parsing() {
        assert_eq!(
            translation::ConfigPath::parse(" /etc/transcraft.toml ").unwrap(),
            PathBuf::from("/etc/transcraft.toml")
        );
        assert!(translation::ConfigPath::parse("  ").is_err());
    }

    #[test]
    fn test_no_color_any_value() {
        assert!(core::NoColor::parse("1").unwrap());
        assert!(!core::NoColor::parse("").unwrap());
    }

    #[test]
    fn test_env_docs_list_variables() {
        let docs = generate_env_docs();
        assert!(docs.contains("TRANSCRAFT_LOG_LEVEL"));
        assert!(docs.contains("TRANSCRAFT_CONFIG"));
        assert!(docs.contains("TRANSCRAFT_API_KEYS__OPENAI"));
    }
}
