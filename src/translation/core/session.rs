//! 页面翻译会话
//!
//! `PageSession` 是页面状态的唯一所有者，串起整条流程：
//!
//! 1. 选择可翻译单元（[`ElementSelector`]）；
//! 2. 语言闸门：抽样检测，源语言与目标语言相同则跳过（强制翻译除外）；
//! 3. 按模型预算收紧批次长度，切分批次；
//! 4. 为所有单元插入加载占位；
//! 5. 逐批派发，一次只有一个请求在途；
//! 6. 拆分译文、写回 DOM，失败的单元移除占位并计入汇总。
//!
//! ## 线程模型
//!
//! 会话持有 `Rc` DOM 句柄，因此不是 `Send`，需要在单线程运行时（`current_thread`）上驱动。
//! 状态放在 `RefCell` 中，借用从不跨越 `.await`，所以在一次运行进行中调用
//! [`PageSession::restore_original`] 是安全的：运行会被放弃，迟到的译文不会再写入。
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transcraft::parsers::html_to_dom;
//! use transcraft::translation::config::{MemorySettingsStore, Settings};
//! use transcraft::translation::core::{PageSession, ProviderBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::default();
//! let backend = Arc::new(ProviderBackend::from_settings(&settings)?);
//! let dom = html_to_dom(b"<p>Hello world</p>", "utf-8")?;
//! let session = PageSession::new(dom, MemorySettingsStore::new(settings), backend)?;
//!
//! let outcome = session.translate_page(false).await?;
//! if let Some(summary) = outcome.summary() {
//!     println!("{}", summary.render());
//! }
//! # Ok(())
//! # }
//! ```

use std::cell::{Ref, RefCell};
use std::sync::Arc;
use std::time::{Duration, Instant};

use markup5ever_rcdom::{Handle, RcDom};

use super::dispatcher::{DispatchContext, Dispatcher, RuntimeHandle, TranslationBackend};
use crate::parsers::html::{find_nodes, get_node_attr};
use crate::translation::budget::{clamp_batch_length, BudgetAdjustment, ModelBudget};
use crate::translation::config::{Settings, SettingsStore};
use crate::translation::error::ConfigError;
use crate::translation::language::{sample_text, should_skip, GateDecision, PageHints};
use crate::translation::pipeline::{reconcile, BatchLimits, BatchPlanner, ElementSelector};
use crate::translation::report::{ErrorSummary, FatalNotice};
use crate::translation::state::{PageTranslationState, RunTicket};

/// 一次运行的统计
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// 选中的单元数
    pub total_units: usize,
    pub batches: usize,
    pub succeeded: usize,
    /// 模型返回的片段不足，没有拿到译文的单元数
    pub unresolved: usize,
    /// 翻译期间元素被页面移除或已有译文，未处理的单元数
    pub skipped: usize,
    pub errors: ErrorSummary,
    /// 已存批次长度被下调时的提示
    pub adjustment: Option<BudgetAdjustment>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// 失败的单元总数（派发失败 + 未拿到译文）
    pub fn failed(&self) -> usize {
        self.errors.total_failed() + self.unresolved
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "翻译完成：成功 {} 个，失败 {} 个（{} 个批次，耗时 {:.1} 秒）",
            self.succeeded,
            self.failed(),
            self.batches,
            self.elapsed.as_secs_f64()
        );
        if let Some(hint) = self.errors.remediation() {
            out.push_str(&format!("\n建议：{}", hint));
        }
        for group in self.errors.groups() {
            out.push_str(&format!(
                "\n  - {}：{} 个元素（{}）",
                group.label, group.count, group.sample
            ));
        }
        if self.unresolved > 0 {
            out.push_str(&format!("\n  - 译文片段不足：{} 个元素", self.unresolved));
        }
        if let Some(adjustment) = self.adjustment {
            out.push_str(&format!(
                "\n提示：批次长度 {} 超过当前模型的安全上限，已调整为 {}",
                adjustment.stored, adjustment.capped
            ));
        }
        out
    }
}

/// 一次翻译请求的结果
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// 致命错误终止了运行
    Aborted {
        notice: FatalNotice,
        summary: RunSummary,
    },
    /// 运行中途被取消或恢复原文
    Abandoned(RunSummary),
    /// 页面已是目标语言，可强制翻译
    SameLanguage { detected: String },
    NothingToTranslate,
    AlreadyRunning,
    AlreadyTranslated,
    /// 切换操作恢复了原文
    Restored { removed: usize },
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Completed(summary)
            | RunOutcome::Abandoned(summary)
            | RunOutcome::Aborted { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RunOutcome::Aborted { .. })
    }
}

/// 页面翻译会话
pub struct PageSession {
    dom: RcDom,
    hints: PageHints,
    store: Box<dyn SettingsStore>,
    backend: Arc<dyn TranslationBackend>,
    runtime: RuntimeHandle,
    selector: ElementSelector,
    state: RefCell<PageTranslationState>,
}

impl PageSession {
    /// 创建会话，目标语言与专家模式取自当前设置
    pub fn new<S>(dom: RcDom, store: S, backend: Arc<dyn TranslationBackend>) -> Result<Self, ConfigError>
    where
        S: SettingsStore + 'static,
    {
        let settings = store.load()?;
        let html_lang = find_nodes(&dom.document, &["html"])
            .first()
            .and_then(|html| get_node_attr(html, "lang"));

        Ok(Self {
            hints: PageHints::new(html_lang.as_deref(), None),
            state: RefCell::new(PageTranslationState::new(
                settings.target_language.clone(),
                settings.expert_mode.clone(),
            )),
            dom,
            store: Box::new(store),
            backend,
            runtime: RuntimeHandle::new(),
            selector: ElementSelector::new(),
        })
    }

    /// 设置页面地址，域名用于中文繁简判断
    pub fn with_page_url(mut self, page_url: &str) -> Self {
        match url::Url::parse(page_url) {
            Ok(parsed) => {
                self.hints = PageHints::new(self.hints.html_lang.as_deref(), parsed.host_str());
            }
            Err(e) => tracing::warn!("无法解析页面地址 {}: {}", page_url, e),
        }
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimeHandle) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn document(&self) -> Handle {
        self.dom.document.clone()
    }

    pub fn runtime(&self) -> RuntimeHandle {
        self.runtime.clone()
    }

    /// 当前状态的只读视图，不要跨 `.await` 持有
    pub fn state(&self) -> Ref<'_, PageTranslationState> {
        self.state.borrow()
    }

    pub fn set_target_language<S: Into<String>>(&self, target_language: S) {
        self.state.borrow_mut().target_language = target_language.into();
    }

    pub fn set_expert_mode<S: Into<String>>(&self, expert_mode: S) {
        self.state.borrow_mut().expert_mode = expert_mode.into();
    }

    /// 恢复原文，返回移除的节点数
    pub fn restore_original(&self) -> usize {
        self.state.borrow_mut().restore_all(&self.dom.document)
    }

    /// 停止发出后续批次，已写入的译文保留
    pub fn cancel(&self) {
        let mut state = self.state.borrow_mut();
        state.abandon_run();
        state.placeholders.remove_pending();
    }

    /// SPA 路由变化
    pub fn reset_for_navigation(&self) {
        self.state
            .borrow_mut()
            .reset_for_navigation(&self.dom.document);
    }

    /// 悬浮按钮语义：已翻译（或正在翻译）则恢复，否则翻译
    pub async fn toggle(&self) -> Result<RunOutcome, ConfigError> {
        let active = {
            let state = self.state.borrow();
            state.is_translated || state.is_translating
        };
        if active {
            let removed = self.restore_original();
            return Ok(RunOutcome::Restored { removed });
        }
        self.translate_page(false).await
    }

    /// 页面加载后的自动翻译，每个页面只执行一次
    pub async fn auto_translate(&self) -> Result<Option<RunOutcome>, ConfigError> {
        {
            let mut state = self.state.borrow_mut();
            if state.auto_translate_completed {
                return Ok(None);
            }
            state.auto_translate_completed = true;
        }
        self.translate_page(false).await.map(Some)
    }

    /// 翻译整个页面
    ///
    /// `force` 跳过语言闸门。设置在开始时读取一次，运行期间不再重新读取。
    pub async fn translate_page(&self, force: bool) -> Result<RunOutcome, ConfigError> {
        {
            let state = self.state.borrow();
            if state.is_translating {
                return Ok(RunOutcome::AlreadyRunning);
            }
            if state.is_translated {
                return Ok(RunOutcome::AlreadyTranslated);
            }
        }

        let settings = self.store.load()?;
        let Some(ticket) = self.state.borrow_mut().begin_run() else {
            return Ok(RunOutcome::AlreadyRunning);
        };
        let started = Instant::now();
        let (target_language, expert_mode) = {
            let state = self.state.borrow();
            (state.target_language.clone(), state.expert_mode.clone())
        };

        let units = self.selector.select(&self.dom.document);
        if units.is_empty() {
            tracing::info!("页面上没有可翻译的内容");
            self.state.borrow_mut().finish_run(&ticket, false);
            return Ok(RunOutcome::NothingToTranslate);
        }

        if settings.enable_language_detection && !force {
            let sample = sample_text(&units, settings.language_detection_chars);
            if let GateDecision::Skip { detected } = should_skip(&sample, &target_language, &self.hints) {
                self.state.borrow_mut().finish_run(&ticket, false);
                return Ok(RunOutcome::SameLanguage { detected });
            }
        }

        let (limits, adjustment) = self.batch_limits(&settings);
        let total_units = units.len();
        let batches = BatchPlanner::new(limits).plan(units);

        let slots: Vec<Vec<Option<String>>> = {
            let mut state = self.state.borrow_mut();
            batches
                .iter()
                .map(|batch| {
                    batch
                        .units
                        .iter()
                        .map(|unit| state.placeholders.insert_placeholder(&unit.element))
                        .collect()
                })
                .collect()
        };
        let run_ids: Vec<String> = slots.iter().flatten().flatten().cloned().collect();

        tracing::info!(
            "开始翻译: {} 个单元，{} 个批次，目标语言 {}",
            total_units,
            batches.len(),
            target_language
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.backend),
            self.runtime.clone(),
            settings.request_timeout(),
        );
        let context = DispatchContext {
            target_language,
            api_config: settings.api_config(),
            expert_mode,
        };
        let mut summary = RunSummary {
            total_units,
            batches: batches.len(),
            adjustment,
            ..RunSummary::default()
        };

        for (batch, ids) in batches.iter().zip(slots) {
            if ticket.is_cancelled() {
                return Ok(self.abandoned(&ticket, &run_ids, summary, started));
            }

            let live = ids.iter().flatten().count();
            if live == 0 {
                summary.skipped += batch.len();
                continue;
            }
            tracing::debug!("{}", batch.summary());

            let result = tokio::select! {
                biased;
                _ = ticket.token.cancelled() => None,
                result = dispatcher.dispatch(&batch.combined_text, &context) => Some(result),
            };
            let result = match result {
                Some(result) if !ticket.is_cancelled() => result,
                _ => return Ok(self.abandoned(&ticket, &run_ids, summary, started)),
            };

            let mut state = self.state.borrow_mut();
            match result {
                Ok(blob) => {
                    let reconciled = reconcile(&blob, batch.len());
                    for (index, id) in ids.iter().enumerate() {
                        let Some(id) = id else {
                            summary.skipped += 1;
                            continue;
                        };
                        match reconciled.segments.get(index) {
                            Some(text) => {
                                if state
                                    .placeholders
                                    .apply_translation(id, text, &context.target_language)
                                {
                                    summary.succeeded += 1;
                                } else {
                                    summary.skipped += 1;
                                }
                            }
                            None => {
                                state.placeholders.remove_placeholder(id);
                                summary.unresolved += 1;
                            }
                        }
                    }
                }
                Err(error) if error.is_fatal() => {
                    let removed = state.placeholders.remove_pending_of(&run_ids);
                    summary.errors.record(&error, live);
                    summary.elapsed = started.elapsed();
                    state.finish_run(&ticket, summary.succeeded > 0);
                    tracing::error!(
                        "致命错误，终止翻译并移除 {} 个未完成的占位: {}",
                        removed,
                        error
                    );
                    return Ok(RunOutcome::Aborted {
                        notice: FatalNotice::from_error(error),
                        summary,
                    });
                }
                Err(error) => {
                    for id in ids.iter().flatten() {
                        state.placeholders.remove_placeholder(id);
                    }
                    summary.errors.record(&error, live);
                }
            }

            tracing::debug!(
                "进度 {}/{} 批次，成功 {} 个",
                batch.index + 1,
                batches.len(),
                summary.succeeded
            );
        }

        summary.elapsed = started.elapsed();
        self.state
            .borrow_mut()
            .finish_run(&ticket, summary.succeeded > 0);
        tracing::info!(
            "翻译结束: 成功 {}，失败 {}，耗时 {:.1} 秒",
            summary.succeeded,
            summary.failed(),
            summary.elapsed.as_secs_f64()
        );

        Ok(RunOutcome::Completed(summary))
    }

    /// 由设置和当前模型预算确定本次运行的批次限制
    fn batch_limits(&self, settings: &Settings) -> (BatchLimits, Option<BudgetAdjustment>) {
        let model = settings.model();
        let budget = ModelBudget::for_model(settings.selected_api, &model);
        let limit = budget.effective_limit(settings.batch_char_ceiling);
        let (max_chars, adjustment) = clamp_batch_length(settings.max_batch_length, limit);

        if let Some(adjustment) = adjustment {
            tracing::info!(
                "批次长度 {} 超过 {} 的安全上限，已调整为 {}",
                adjustment.stored,
                model,
                adjustment.capped
            );
            if let Err(e) = self.store.persist_max_batch_length(adjustment.capped) {
                tracing::warn!("写回批次长度失败: {}", e);
            }
        }

        (
            BatchLimits::new(max_chars, settings.max_batch_elements),
            adjustment,
        )
    }

    /// 被放弃的运行只清理自己插入的占位
    ///
    /// 恢复原文后可能已经开始了新的运行，此时页面状态归新运行所有，不再改动。
    fn abandoned(
        &self,
        ticket: &RunTicket,
        run_ids: &[String],
        mut summary: RunSummary,
        started: Instant,
    ) -> RunOutcome {
        let mut state = self.state.borrow_mut();
        state.placeholders.remove_pending_of(run_ids);
        if state.is_current(ticket) {
            let kept = run_ids
                .iter()
                .any(|id| state.placeholders.get(id).is_some());
            state.is_translated = kept;
        }
        summary.elapsed = started.elapsed();
        tracing::info!("翻译已中止，已完成 {} 个单元", summary.succeeded);
        RunOutcome::Abandoned(summary)
    }
}
