//! TransCraft 命令行入口
//!
//! 翻译一个保存下来的 HTML 页面：译文以 `ai-translation-block` 节点追加到原文元素末尾，
//! 结果写到文件或标准输出，运行汇总打印到标准错误。

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use transcraft::env::{generate_env_docs, EnvConfig};
use transcraft::parsers::{html_to_dom_with_declared_charset, serialize_document};
use transcraft::translation::budget::{validate_batch_length, ModelBudget};
use transcraft::translation::{
    ApiProvider, ConfigManager, MemorySettingsStore, PageSession, ProviderBackend, RunOutcome,
    Settings, SettingsStore,
};

/// Translate a saved web page with an LLM provider
#[derive(Parser, Debug)]
#[command(name = "transcraft", author, version, about, long_about = None)]
struct Cli {
    /// HTML file to translate, or "-" for stdin
    #[arg(required_unless_present_any = ["env_docs", "init_config"])]
    input: Option<String>,

    /// Write the translated page here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target language (e.g. zh-TW, zh-CN, en, ja)
    #[arg(short = 't', long = "target")]
    target_language: Option<String>,

    /// Provider: openai, claude, gemini, openrouter, ollama
    #[arg(short = 'a', long = "api")]
    api: Option<ApiProvider>,

    /// Model name for the selected provider
    #[arg(short, long)]
    model: Option<String>,

    /// Expert mode (general, technical, academic, novel_fantasy, ...)
    #[arg(short = 'e', long = "expert-mode")]
    expert_mode: Option<String>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page URL, used as a hint for Chinese variant detection
    #[arg(short = 'u', long = "url")]
    page_url: Option<String>,

    /// Translate even when the page already looks like the target language
    #[arg(short, long)]
    force: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Maximum characters per batch
    #[arg(long)]
    max_batch_length: Option<usize>,

    /// Print the supported environment variables and exit
    #[arg(long)]
    env_docs: bool,

    /// Write a settings file with default values and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.env_docs {
        print!("{}", generate_env_docs());
        return ExitCode::SUCCESS;
    }
    if let Some(path) = &cli.init_config {
        return match ConfigManager::generate_example_config(path) {
            Ok(()) => {
                eprintln!("已生成示例配置: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = match load_settings(&cli, &env_config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&cli, &env_config, &settings);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: 无法创建运行时: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, settings)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// 合并配置文件、环境变量与命令行参数
fn load_settings(cli: &Cli, env_config: &EnvConfig) -> Result<Settings, Box<dyn std::error::Error>> {
    let manager = match cli.config.as_ref().or(env_config.config_path.as_ref()) {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let mut settings = manager.load()?;

    if let Some(api) = cli.api {
        settings.selected_api = api;
        if cli.model.is_none() {
            settings.selected_model = None;
        }
    }
    if let Some(model) = &cli.model {
        settings.selected_model = Some(model.clone());
    }
    if let Some(target) = &cli.target_language {
        settings.target_language = target.clone();
    }
    if let Some(mode) = &cli.expert_mode {
        settings.expert_mode = mode.clone();
    }
    if let Some(length) = cli.max_batch_length {
        let budget = ModelBudget::for_model(settings.selected_api, &settings.model());
        validate_batch_length(length, &budget)?;
        settings.max_batch_length = length;
    }
    settings.debug_mode |= env_config.debug;

    settings.validate()?;
    settings.ensure_api_configured()?;
    Ok(settings)
}

fn init_logging(cli: &Cli, env_config: &EnvConfig, settings: &Settings) {
    let level = if cli.quiet {
        "warn"
    } else if settings.debug_mode {
        "debug"
    } else {
        env_config.log_level.as_str()
    };

    let filter = EnvFilter::try_new(format!("transcraft={}", level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!env_config.no_color)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, settings: Settings) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let input = cli.input.as_deref().unwrap_or("-");
    let data = if input == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(input)?
    };

    let (dom, document_encoding) = html_to_dom_with_declared_charset(&data)?;
    let backend = Arc::new(ProviderBackend::from_settings(&settings)?);
    let mut session = PageSession::new(dom, MemorySettingsStore::new(settings), backend)?;
    if let Some(url) = &cli.page_url {
        session = session.with_page_url(url);
    }

    let outcome = session.translate_page(cli.force).await?;
    let code = report(&outcome);

    let html = serialize_document(&session.document(), &document_encoding)?;
    match &cli.output {
        Some(path) => fs::write(path, html)?,
        None => io::stdout().write_all(&html)?,
    }

    Ok(code)
}

fn report(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Completed(summary) | RunOutcome::Abandoned(summary) => {
            eprintln!("{}", summary.render());
            ExitCode::SUCCESS
        }
        RunOutcome::Aborted { notice, summary } => {
            eprintln!("翻译已终止 - {}", notice);
            eprintln!("{}", summary.render());
            ExitCode::from(2)
        }
        RunOutcome::SameLanguage { detected } => {
            eprintln!(
                "页面语言（{}）已是目标语言，未翻译。使用 --force 强制翻译。",
                detected
            );
            ExitCode::SUCCESS
        }
        RunOutcome::NothingToTranslate => {
            eprintln!("页面上没有可翻译的内容");
            ExitCode::SUCCESS
        }
        RunOutcome::AlreadyRunning
        | RunOutcome::AlreadyTranslated
        | RunOutcome::Restored { .. } => ExitCode::SUCCESS,
    }
}
