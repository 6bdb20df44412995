//! 翻译管道模块
//!
//! 选择 → 过滤 → 分批 → 译文对齐，全部是同步的纯计算步骤

pub mod batch;
pub mod filters;
pub mod reconcile;
pub mod selector;

// 重新导出主要类型
pub use batch::{plan_batches, Batch, BatchLimits, BatchPlanner};
pub use filters::{ExclusionRule, MatchKind, RuleScope, TextFilter, EXCLUSION_RULES};
pub use reconcile::{reconcile, Reconciliation, SplitStrategy};
pub use selector::{select_translatable_units, ElementSelector};
