//! 规则抽象
//!
//! 每条规则都遵循 触发判断 → 执行 → 记录 的协议，由 [`RuleEngine`](crate::RuleEngine)
//! 按顺序驱动。

use crate::context::RuleContext;
use crate::error::Result;
use crate::executor::run_rule;
use serde_json::{Map, Value};
use std::sync::Arc;

/// 规则
pub trait Rule: Send + Sync {
    /// 规则标识，默认为实现类型的短名称
    fn id(&self) -> String {
        short_type_name(std::any::type_name_of_val(self))
    }

    fn should_trigger(&self, _context: &RuleContext) -> Result<bool> {
        Ok(true)
    }

    fn perform(&self, context: &mut RuleContext) -> Result<Value>;

    /// 把执行结果追加到审计日志
    fn record(&self, context: &mut RuleContext, result: Value) {
        context.record(self.id(), result);
    }
}

pub type SharedRule = Arc<dyn Rule>;

/// 去掉模块路径和泛型参数，`a::b::Foo<T>` → `Foo`
pub fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

type Predicate = Box<dyn Fn(&RuleContext) -> Result<bool> + Send + Sync>;
type Action = Box<dyn Fn(&mut RuleContext) -> Result<Map<String, Value>> + Send + Sync>;

/// 谓词/动作规则
///
/// 谓词决定是否触发，动作返回的部分映射合并进上下文并作为执行结果记录。
pub struct ConditionalRule {
    name: Option<String>,
    predicate: Predicate,
    action: Action,
}

impl ConditionalRule {
    pub fn new<P, A>(predicate: P, action: A) -> Self
    where
        P: Fn(&RuleContext) -> Result<bool> + Send + Sync + 'static,
        A: Fn(&mut RuleContext) -> Result<Map<String, Value>> + Send + Sync + 'static,
    {
        Self {
            name: None,
            predicate: Box::new(predicate),
            action: Box::new(action),
        }
    }

    /// 无条件触发
    pub fn always<A>(action: A) -> Self
    where
        A: Fn(&mut RuleContext) -> Result<Map<String, Value>> + Send + Sync + 'static,
    {
        Self::new(|_| Ok(true), action)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Rule for ConditionalRule {
    fn id(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| short_type_name(std::any::type_name::<Self>()))
    }

    fn should_trigger(&self, context: &RuleContext) -> Result<bool> {
        (self.predicate)(context)
    }

    fn perform(&self, context: &mut RuleContext) -> Result<Value> {
        let values = (self.action)(context)?;
        context.update(values.clone());
        Ok(Value::Object(values))
    }
}

impl std::fmt::Debug for ConditionalRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalRule")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

/// 有序组合规则
///
/// 依次驱动每条子规则的完整协议，子规则各自记录，组合规则本身再由引擎记录一次。
#[derive(Clone, Default)]
pub struct SequencedRuleset {
    name: Option<String>,
    rules: Vec<SharedRule>,
}

impl SequencedRuleset {
    pub fn new(rules: Vec<SharedRule>) -> Self {
        Self { name: None, rules }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn rules(&self) -> &[SharedRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Rule for SequencedRuleset {
    fn id(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| short_type_name(std::any::type_name::<Self>()))
    }

    fn perform(&self, context: &mut RuleContext) -> Result<Value> {
        for rule in &self.rules {
            run_rule(rule.as_ref(), context)?;
        }
        Ok(Value::Bool(true))
    }
}
