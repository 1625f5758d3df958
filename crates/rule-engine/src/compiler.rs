//! 规则编译器
//!
//! 校验表格规则定义，应用词汇替换，并把每个子句的逻辑串、条件和动作
//! 预先编译成可直接执行的形式。

use crate::context::strip_namespace;
use crate::error::{Result, RuleError};
use crate::expr::Expression;
use crate::logic::LogicEvaluator;
use crate::models::{ClauseDefinition, ConditionSpec, TableRuleDefinition};
use crate::table::{Action, CompiledClause, TableRule};
use crate::translator::Translator;
use serde_json::Value;
use tracing::{debug, warn};

/// 规则编译器
#[derive(Debug, Clone, Default)]
pub struct RuleCompiler {
    translator: Option<Translator>,
    /// then/target 数量不一致时报错而不是截断
    strict_arity: bool,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 定义中没有 translations 时使用的替换表
    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_strict_arity(mut self, strict: bool) -> Self {
        self.strict_arity = strict;
        self
    }

    /// 从 JSON 字符串编译规则
    pub fn compile_from_json(&self, json: &str) -> Result<TableRule> {
        let definition: TableRuleDefinition = serde_json::from_str(json)?;
        self.compile(definition)
    }

    /// 从 YAML 字符串编译规则
    pub fn compile_from_yaml(&self, yaml: &str) -> Result<TableRule> {
        let definition: TableRuleDefinition = serde_yaml::from_str(yaml)?;
        self.compile(definition)
    }

    /// 编译规则
    pub fn compile(&self, definition: TableRuleDefinition) -> Result<TableRule> {
        if definition.rules.is_empty() {
            return Err(RuleError::Definition("表格规则至少需要一个子句".to_string()));
        }

        let translator = if definition.translations.is_empty() {
            self.translator.clone()
        } else {
            Some(Translator::new(definition.translations.iter().cloned())?)
        };

        let clauses = definition
            .rules
            .iter()
            .enumerate()
            .map(|(i, clause)| self.compile_clause(i + 1, clause, translator.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            ruleset = definition.ruleset.as_deref().unwrap_or_default(),
            clauses = clauses.len(),
            "表格规则编译完成"
        );

        Ok(TableRule::new(definition, clauses))
    }

    fn compile_clause(
        &self,
        position: usize,
        clause: &ClauseDefinition,
        translator: Option<&Translator>,
    ) -> Result<CompiledClause> {
        let label = clause
            .rule
            .clone()
            .unwrap_or_else(|| format!("#{position}"));
        let translate = |text: &str| match translator {
            Some(translator) => translator.replace(text),
            None => text.to_string(),
        };

        if clause.condition.conditions.is_empty() {
            return Err(RuleError::Definition(format!(
                "子句 {label} 至少需要一个条件"
            )));
        }

        let specs: Vec<ConditionSpec> = clause
            .condition
            .conditions
            .iter()
            .map(|spec| match spec {
                ConditionSpec::Expression(source) => ConditionSpec::Expression(translate(source)),
                other => other.clone(),
            })
            .collect();
        let evaluator = LogicEvaluator::new(clause.condition.logic.as_deref(), &specs)?;

        let (actions, targets) = (clause.then.len(), clause.target.len());
        if actions != targets {
            if self.strict_arity {
                return Err(RuleError::ArityMismatch {
                    clause: label,
                    actions,
                    targets,
                });
            }
            warn!(
                clause = %label,
                actions,
                targets,
                "then 与 target 数量不一致，按较短一侧截断"
            );
        }

        let assignments = clause
            .then
            .iter()
            .zip(&clause.target)
            .map(|(action, target)| {
                let action = match action {
                    Value::String(source) => Action::Expr(Expression::compile(&translate(source))?),
                    literal => Action::Literal(literal.clone()),
                };
                let target = translate(target);
                let target = strip_namespace(&target);
                if target.is_empty() {
                    return Err(RuleError::Definition(format!(
                        "子句 {label} 的目标字段不能为空"
                    )));
                }
                Ok((action, target.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledClause {
            id: clause.rule.clone(),
            evaluator,
            assignments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RuleContext;
    use crate::rules::Rule;
    use serde_json::json;

    #[test]
    fn test_compile_from_json() {
        let rule = RuleCompiler::new()
            .compile_from_json(
                r#"{"rules": [{"if": {"logic": "1 | 2", "conditions": [{"a": 1}, {"b": 1}]},
                    "then": ["context.a + 1"], "target": ["context.c"]}]}"#,
            )
            .unwrap();
        let clause = &rule.clauses()[0];
        assert_eq!(clause.assignments.len(), 1);
        assert_eq!(clause.assignments[0].1, "c");
        assert!(matches!(clause.assignments[0].0, Action::Expr(_)));
    }

    #[test]
    fn test_empty_definition_rejected() {
        let err = RuleCompiler::new()
            .compile_from_json(r#"{"rules": []}"#)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_DEFINITION");

        let err = RuleCompiler::new()
            .compile_from_json(r#"{"rules": [{"if": [], "then": [], "target": []}]}"#)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_DEFINITION");
    }

    #[test]
    fn test_invalid_pieces_fail_at_compile_time() {
        let compiler = RuleCompiler::new();
        let cases = [
            (r#"{"rules": [{"if": {"logic": "1 &", "conditions": [{"a": 1}]}}]}"#, "PARSE_ERROR"),
            (r#"{"rules": [{"if": {"logic": "2", "conditions": [{"a": 1}]}}]}"#, "UNKNOWN_CONDITION"),
            (r#"{"rules": [{"if": ["a ==="]}]}"#, "EXPRESSION_ERROR"),
            (r#"{"rules": [{"if": [true], "then": ["1 +"], "target": ["x"]}]}"#, "EXPRESSION_ERROR"),
            (r#"{"rules": [{"if": [true], "then": [1], "target": ["context."]}]}"#, "INVALID_DEFINITION"),
            (r#"{"rules": "nope"}"#, "JSON_ERROR"),
        ];
        for (json, code) in cases {
            assert_eq!(compiler.compile_from_json(json).unwrap_err().code(), code, "{json}");
        }
        assert_eq!(
            compiler.compile_from_yaml("rules: [").unwrap_err().code(),
            "YAML_ERROR"
        );
    }

    #[test]
    fn test_arity_truncation() {
        let json = r#"{"rules": [{"if": [true], "then": [1, 2, 3], "target": ["a", "b"]}]}"#;
        let rule = RuleCompiler::new().compile_from_json(json).unwrap();
        let mut ctx = RuleContext::new();
        rule.perform(&mut ctx).unwrap();
        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.get("b"), Some(&json!(2)));
        assert_eq!(ctx.executed().len(), 2);

        let err = RuleCompiler::new()
            .with_strict_arity(true)
            .compile_from_json(json)
            .unwrap_err();
        assert!(matches!(
            err,
            RuleError::ArityMismatch { actions: 3, targets: 2, .. }
        ));
    }

    #[test]
    fn test_translations_apply_to_conditions_actions_and_targets() {
        let yaml = r#"
translations:
  - ["Fahrpreis", "context.fare"]
  - ["ist", "=="]
  - ["mal", "*"]
rules:
  - if: ["context.tag ist 'Sonntag'"]
    then: ["Fahrpreis mal 1.5"]
    target: ["Fahrpreis"]
"#;
        let rule = RuleCompiler::new().compile_from_yaml(yaml).unwrap();
        let mut ctx = RuleContext::from_json(r#"{"tag": "Sonntag", "fare": 800}"#).unwrap();
        rule.perform(&mut ctx).unwrap();
        assert_eq!(ctx.get("fare"), Some(&json!(1200.0)));
    }

    #[test]
    fn test_compiler_translator_is_fallback() {
        let translator = Translator::new([("is", "==")]).unwrap();
        let compiler = RuleCompiler::new().with_translator(translator);
        let rule = compiler
            .compile_from_json(r#"{"rules": [{"if": ["context.a is 1"], "then": [true], "target": ["ok"]}]}"#)
            .unwrap();
        let mut ctx = RuleContext::from_json(r#"{"a": 1}"#).unwrap();
        rule.perform(&mut ctx).unwrap();
        assert_eq!(ctx.get("ok"), Some(&json!(true)));
    }
}
