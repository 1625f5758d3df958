//! 表格规则
//!
//! 由声明式定义编译一次得到，按声明顺序逐个检查子句：逻辑为真的子句依次
//! 执行动作并写入目标字段，为假的子句跳过后继续下一个。

use crate::compiler::RuleCompiler;
use crate::context::RuleContext;
use crate::error::{Result, RuleError};
use crate::expr::Expression;
use crate::logic::LogicEvaluator;
use crate::models::TableRuleDefinition;
use crate::rules::{Rule, short_type_name};
use serde_json::Value;
use tracing::debug;

/// 子句动作
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Literal(Value),
    Expr(Expression),
}

impl Action {
    pub fn evaluate(&self, context: &RuleContext) -> Result<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Expr(expression) => expression.evaluate(context).map_err(|e| match e {
                RuleError::ActionEvaluation { .. } => e,
                other => RuleError::action(expression.source(), other.to_string()),
            }),
        }
    }
}

/// 编译后的子句
#[derive(Debug, Clone)]
pub struct CompiledClause {
    pub id: Option<String>,
    pub evaluator: LogicEvaluator,
    /// (动作, 去掉命名空间前缀的目标字段)，已按较短一侧截断
    pub assignments: Vec<(Action, String)>,
}

#[derive(Debug, Clone)]
pub struct TableRule {
    name: String,
    definition: TableRuleDefinition,
    clauses: Vec<CompiledClause>,
}

impl TableRule {
    /// 规则名称缺省为 `TableRule`，定义中给出 ruleset 时使用它
    pub(crate) fn new(definition: TableRuleDefinition, clauses: Vec<CompiledClause>) -> Self {
        let name = definition
            .ruleset
            .clone()
            .unwrap_or_else(|| short_type_name(std::any::type_name::<Self>()));
        Self {
            name,
            definition,
            clauses,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        RuleCompiler::new().compile_from_json(json)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        RuleCompiler::new().compile_from_yaml(yaml)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 原始定义
    pub fn definition(&self) -> &TableRuleDefinition {
        &self.definition
    }

    pub fn clauses(&self) -> &[CompiledClause] {
        &self.clauses
    }
}

impl Rule for TableRule {
    fn id(&self) -> String {
        self.name.clone()
    }

    /// 返回是否所有子句都匹配
    fn perform(&self, context: &mut RuleContext) -> Result<Value> {
        let mut matched_count = 0usize;
        let mut all_matched = true;

        for (position, clause) in self.clauses.iter().enumerate() {
            if !clause.evaluator.evaluate(context)? {
                debug!(rule = %self.name, clause = position + 1, "子句条件不满足，跳过");
                all_matched = false;
                continue;
            }

            matched_count += 1;
            let clause_id = clause
                .id
                .clone()
                .unwrap_or_else(|| matched_count.to_string());
            let record_id = format!("{}.{}", self.name, clause_id);

            for (action, target) in &clause.assignments {
                let value = action.evaluate(context)?;
                debug!(rule = %record_id, target = %target, value = %value, "写入目标字段");
                context.set(target.clone(), value.clone());
                context.record(record_id.clone(), value);
            }
        }

        Ok(Value::Bool(all_matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(ctx: &RuleContext) -> Vec<(String, Value)> {
        ctx.executed()
            .iter()
            .map(|e| (e.rule_id.clone(), e.result.clone()))
            .collect()
    }

    #[test]
    fn test_single_clause_end_to_end() {
        let rule = TableRule::from_json(
            r#"{"rules": [{"if": {"conditions": ["not context.foo"]}, "then": ["10"], "target": ["bar"]}]}"#,
        )
        .unwrap();
        let mut ctx = RuleContext::from_json(r#"{"foo": false}"#).unwrap();

        assert!(rule.should_trigger(&ctx).unwrap());
        let result = rule.perform(&mut ctx).unwrap();
        rule.record(&mut ctx, result);

        assert_eq!(ctx.get("bar"), Some(&json!(10)));
        assert_eq!(
            entries(&ctx),
            vec![
                ("TableRule.1".to_string(), json!(10)),
                ("TableRule".to_string(), json!(true)),
            ]
        );
    }

    #[test]
    fn test_skipped_clause_continues() {
        let rule = TableRule::from_yaml(
            r#"
rules:
  - if: ["context.a == 1"]
    then: ["'first'"]
    target: ["context.first"]
  - if: ["context.a == 2"]
    then: ["'second'"]
    target: ["context.second"]
  - rule: last
    if: ["context.a > 0"]
    then: ["context.a + 1", 42]
    target: ["context.third", "context.answer"]
"#,
        )
        .unwrap();
        let mut ctx = RuleContext::from_json(r#"{"a": 1}"#).unwrap();
        let result = rule.perform(&mut ctx).unwrap();

        assert_eq!(result, json!(false));
        assert_eq!(ctx.get("first"), Some(&json!("first")));
        assert!(!ctx.contains("second"));
        assert_eq!(ctx.get("third"), Some(&json!(2)));
        assert_eq!(
            entries(&ctx),
            vec![
                ("TableRule.1".to_string(), json!("first")),
                ("TableRule.last".to_string(), json!(2)),
                ("TableRule.last".to_string(), json!(42)),
            ]
        );
    }

    #[test]
    fn test_counter_counts_matched_clauses_only() {
        let rule = TableRule::from_json(
            r#"{"rules": [
                {"if": [false], "then": [1], "target": ["x"]},
                {"if": [true], "then": [2], "target": ["y"]}
            ]}"#,
        )
        .unwrap();
        let mut ctx = RuleContext::new();
        rule.perform(&mut ctx).unwrap();
        assert_eq!(entries(&ctx), vec![("TableRule.1".to_string(), json!(2))]);
    }

    #[test]
    fn test_later_clause_sees_earlier_writes() {
        let rule = TableRule::from_json(
            r#"{"ruleset": "Chain", "rules": [
                {"if": [true], "then": ["5"], "target": ["n"]},
                {"if": ["context.n == 5"], "then": ["context.n * 2"], "target": ["n"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(rule.id(), "Chain");
        let mut ctx = RuleContext::new();
        assert_eq!(rule.perform(&mut ctx).unwrap(), json!(true));
        assert_eq!(ctx.get("n"), Some(&json!(10)));
        assert_eq!(ctx.executed()[1].rule_id, "Chain.2");
    }

    #[test]
    fn test_action_errors() {
        let rule = TableRule::from_json(
            r#"{"rules": [{"if": [true], "then": ["context.label * 2"], "target": ["x"]}]}"#,
        )
        .unwrap();
        let mut ctx = RuleContext::from_json(r#"{"label": "abc"}"#).unwrap();
        let err = rule.perform(&mut ctx).unwrap_err();
        assert_eq!(err.code(), "ACTION_EVALUATION_ERROR");
        assert!(!ctx.contains("x"));
    }

    #[test]
    fn test_definition_is_kept() {
        let json = r#"{"ruleset": "r", "rules": [{"if": [true], "then": [1], "target": ["x"]}]}"#;
        let rule = TableRule::from_json(json).unwrap();
        assert_eq!(rule.definition(), &TableRuleDefinition::from_json(json).unwrap());
        assert_eq!(rule.clauses().len(), 1);
        assert_eq!(rule.with_name("renamed").name(), "renamed");
    }
}
