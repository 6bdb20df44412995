//! 配置管理器
//!
//! 提供统一的设置接口，支持文件配置、环境变量和默认值

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::ConfigError;
use crate::translation::prompt::CustomExpertMode;
use crate::translation::providers::{ApiConfig, ApiProvider};

/// 持久化的用户设置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    // 服务商
    pub selected_api: ApiProvider,
    pub api_keys: BTreeMap<String, String>,
    pub selected_model: Option<String>,
    pub api_endpoints: BTreeMap<String, String>,

    // 翻译目标
    pub target_language: String,
    pub expert_mode: String,
    pub custom_common_instructions: Option<String>,
    pub custom_expert_modes: BTreeMap<String, CustomExpertMode>,

    // 批次配置
    pub max_batch_length: usize,
    pub max_batch_elements: usize,
    pub batch_char_ceiling: Option<usize>,
    pub request_timeout: u64,

    // 语言检测
    pub enable_language_detection: bool,
    pub language_detection_chars: usize,

    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_api: ApiProvider::OpenAi,
            api_keys: BTreeMap::new(),
            selected_model: None,
            api_endpoints: BTreeMap::new(),

            target_language: constants::DEFAULT_TARGET_LANGUAGE.to_string(),
            expert_mode: constants::DEFAULT_EXPERT_MODE.to_string(),
            custom_common_instructions: None,
            custom_expert_modes: BTreeMap::new(),

            max_batch_length: constants::DEFAULT_MAX_BATCH_LENGTH,
            max_batch_elements: constants::DEFAULT_MAX_BATCH_ELEMENTS,
            batch_char_ceiling: None,
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            enable_language_detection: true,
            language_detection_chars: constants::DEFAULT_LANGUAGE_DETECTION_CHARS,

            debug_mode: false,
        }
    }
}

impl Settings {
    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_elements == 0 {
            return Err(ConfigError::Invalid("每批元素数量不能为0".to_string()));
        }

        if self.max_batch_length == 0 {
            return Err(ConfigError::Invalid("批次长度不能为0".to_string()));
        }

        if !(constants::MIN_REQUEST_TIMEOUT_SECS..=constants::MAX_REQUEST_TIMEOUT_SECS)
            .contains(&self.request_timeout)
        {
            return Err(ConfigError::Invalid(format!(
                "请求超时必须在 {}-{} 秒之间",
                constants::MIN_REQUEST_TIMEOUT_SECS,
                constants::MAX_REQUEST_TIMEOUT_SECS
            )));
        }

        if self.target_language.trim().is_empty() {
            return Err(ConfigError::Invalid("目标语言不能为空".to_string()));
        }

        if self.language_detection_chars == 0 {
            return Err(ConfigError::Invalid("语言检测字符数不能为0".to_string()));
        }

        Ok(())
    }

    /// 当前服务商的 API Key（去除空白后为空视为未配置）
    pub fn api_key_for(&self, provider: ApiProvider) -> Option<&str> {
        self.api_keys
            .get(provider.id())
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
    }

    /// 检查当前服务商是否已配置可用的凭据
    pub fn ensure_api_configured(&self) -> Result<(), ConfigError> {
        if self.selected_api.requires_api_key() && self.api_key_for(self.selected_api).is_none() {
            return Err(ConfigError::MissingApiKey(self.selected_api));
        }
        Ok(())
    }

    /// 实际使用的模型
    pub fn model(&self) -> String {
        self.selected_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| self.selected_api.default_model())
            .to_string()
    }

    /// 请求超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// 构造发往后端的 API 配置
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            selected_api: self.selected_api,
            api_keys: self.api_keys.clone(),
            selected_model: Some(self.model()),
        }
    }
}

/// 设置存储的窄接口
///
/// 运行开始时 `load` 一次；只有自动下调的批次长度会被写回。
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, ConfigError>;

    fn persist_max_batch_length(&self, value: usize) -> Result<(), ConfigError>;
}

/// 基于文件与环境变量的配置管理器
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    path: Option<PathBuf>,
}

impl ConfigManager {
    /// 按搜索路径查找配置文件
    pub fn new() -> Self {
        Self::load_dotenv();

        let path = constants::CONFIG_PATHS.iter().find_map(|path| {
            let expanded = shellexpand::tilde(path);
            let candidate = Path::new(expanded.as_ref());
            candidate.exists().then(|| candidate.to_path_buf())
        });

        match &path {
            Some(found) => tracing::info!("加载配置文件: {}", found.display()),
            None => tracing::info!("未找到配置文件，使用默认配置"),
        }

        Self { path }
    }

    /// 使用指定的配置文件
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self::load_dotenv();
        let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned();
        Self {
            path: Some(PathBuf::from(expanded)),
        }
    }

    /// 当前使用的配置文件路径
    pub fn config_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 合并默认值、配置文件和环境变量
    fn build(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = &self.path {
            builder = builder.add_source(File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(constants::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        tracing::debug!(
            "加载的配置 - 服务商: {}, 目标语言: {}",
            settings.selected_api,
            settings.target_language
        );
        Ok(settings)
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in [".env.local", ".env"] {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(&Settings::default())?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl SettingsStore for ConfigManager {
    fn load(&self) -> Result<Settings, ConfigError> {
        let settings = self.build()?;
        settings.validate()?;
        Ok(settings)
    }

    fn persist_max_batch_length(&self, value: usize) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            tracing::debug!("没有配置文件，跳过写回批次长度");
            return Ok(());
        };

        let mut table: toml::Table = if path.exists() {
            toml::from_str(&std::fs::read_to_string(path)?)?
        } else {
            toml::Table::new()
        };
        table.insert(
            "max_batch_length".to_string(),
            toml::Value::Integer(value as i64),
        );

        std::fs::write(path, toml::to_string_pretty(&table)?)?;
        tracing::info!("已写回批次长度 {} 到 {}", value, path.display());
        Ok(())
    }
}

/// 内存中的设置存储，供嵌入方与测试使用
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<Settings>>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    /// 当前保存的设置副本
    pub fn snapshot(&self) -> Settings {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        let settings = self.snapshot();
        settings.validate()?;
        Ok(settings)
    }

    fn persist_max_batch_length(&self, value: usize) -> Result<(), ConfigError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ConfigError::Invalid("设置存储已损坏".to_string()))?;
        guard.max_batch_length = value;
        Ok(())
    }
}
