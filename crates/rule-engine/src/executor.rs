//! 规则执行引擎
//!
//! 按顺序对同一个上下文执行规则：触发判断为真时执行并记录结果。
//! 没有事务语义，规则出错时立即返回，已经写入上下文的修改保留。

use crate::context::RuleContext;
use crate::error::{Result, RuleError};
use crate::rules::{Rule, SharedRule};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument};

/// 协作式取消标记，只在顶层规则之间检查
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 驱动一条规则的完整协议，返回是否触发
pub(crate) fn run_rule(rule: &dyn Rule, context: &mut RuleContext) -> Result<bool> {
    if !rule.should_trigger(context)? {
        debug!(rule_id = %rule.id(), "规则未触发");
        return Ok(false);
    }
    let result = rule.perform(context)?;
    debug!(rule_id = %rule.id(), result = %result, "规则执行完成");
    rule.record(context, result);
    Ok(true)
}

/// 规则引擎
///
/// 不持有跨执行的状态，可以在互不重叠的调用之间复用。
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    cancellation: Option<CancellationFlag>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用协作式取消
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    /// 执行规则并返回同一个上下文，便于在动作中嵌套调用
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub fn execute<'c>(
        &self,
        rules: &[SharedRule],
        context: &'c mut RuleContext,
    ) -> Result<&'c mut RuleContext> {
        for (completed, rule) in rules.iter().enumerate() {
            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationFlag::is_cancelled)
            {
                debug!(completed, "规则执行已取消");
                return Err(RuleError::Cancelled { completed });
            }
            run_rule(rule.as_ref(), context)?;
        }
        Ok(context)
    }

    /// 以值传入上下文的便捷形式
    pub fn run(&self, rules: &[SharedRule], mut context: RuleContext) -> Result<RuleContext> {
        self.execute(rules, &mut context)?;
        Ok(context)
    }
}
