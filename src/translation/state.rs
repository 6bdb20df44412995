//! 页面级翻译状态
//!
//! 每个页面一份，由会话（[`crate::translation::core::PageSession`]）独占并负责修改，
//! 其他组件以参数形式接收，不存在全局可变状态。

use markup5ever_rcdom::Handle;
use tokio_util::sync::CancellationToken;

use crate::translation::mutator::PlaceholderRegistry;

/// 页面翻译状态
#[derive(Debug)]
pub struct PageTranslationState {
    pub is_translated: bool,
    pub is_translating: bool,
    pub target_language: String,
    pub expert_mode: String,
    pub placeholders: PlaceholderRegistry,
    /// 自动翻译在当前页面已经执行过
    pub auto_translate_completed: bool,
    run_token: CancellationToken,
    /// 每次开始运行加一，用来识别已被新运行取代的旧运行
    generation: u64,
}

/// 一次运行的凭据
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub token: CancellationToken,
    pub generation: u64,
}

impl RunTicket {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl PageTranslationState {
    pub fn new<S: Into<String>>(target_language: S, expert_mode: S) -> Self {
        Self {
            is_translated: false,
            is_translating: false,
            target_language: target_language.into(),
            expert_mode: expert_mode.into(),
            placeholders: PlaceholderRegistry::new(),
            auto_translate_completed: false,
            run_token: CancellationToken::new(),
            generation: 0,
        }
    }

    /// 开始一次运行，返回该次运行的凭据
    ///
    /// 已有运行进行中时返回 `None`。
    pub fn begin_run(&mut self) -> Option<RunTicket> {
        if self.is_translating {
            return None;
        }
        self.is_translating = true;
        self.run_token = CancellationToken::new();
        self.generation += 1;
        Some(RunTicket {
            token: self.run_token.clone(),
            generation: self.generation,
        })
    }

    /// 凭据是否属于最近一次开始的运行
    pub fn is_current(&self, ticket: &RunTicket) -> bool {
        ticket.generation == self.generation
    }

    /// 结束运行；被放弃的运行不会把页面标记为已翻译
    pub fn finish_run(&mut self, ticket: &RunTicket, translated: bool) {
        if ticket.is_cancelled() || !self.is_current(ticket) {
            return;
        }
        self.is_translating = false;
        if translated {
            self.is_translated = true;
        }
    }

    /// 放弃进行中的运行
    ///
    /// 令牌被取消后，迟到的译文不会再写入 DOM。
    pub fn abandon_run(&mut self) {
        if self.is_translating {
            tracing::debug!("放弃进行中的翻译");
        }
        self.run_token.cancel();
        self.is_translating = false;
    }

    /// 恢复原文：放弃运行、移除所有插入节点，并清除已翻译标记
    pub fn restore_all(&mut self, document: &Handle) -> usize {
        self.abandon_run();
        let removed = self.placeholders.restore_all(document);
        self.is_translated = false;
        tracing::info!("已恢复原文，移除 {} 个翻译节点", removed);
        removed
    }

    /// SPA 路由变化时调用
    pub fn reset_for_navigation(&mut self, document: &Handle) {
        self.restore_all(document);
        self.auto_translate_completed = false;
    }
}
