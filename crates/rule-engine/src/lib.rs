//! 嵌入式规则引擎
//!
//! 在一个可变的上下文上判断条件、组合逻辑并按顺序执行规则，支持：
//! - 点号路径字段解析和比较器后缀
//! - AND/OR/XOR/NOT 条件表达式
//! - `1 & (2|~3)` 形式的紧凑逻辑串和两阶段求值
//! - JSON/YAML 表格规则定义、词汇替换和受限表达式动作
//! - 顺序执行引擎和审计日志

pub mod compiler;
pub mod condition;
pub mod context;
pub mod error;
pub mod executor;
pub mod expr;
pub mod logic;
pub mod models;
pub mod operators;
pub mod resolver;
pub mod rules;
pub mod table;
pub mod translator;
pub mod values;

pub use compiler::RuleCompiler;
pub use condition::{ConditionExpression, Subject};
pub use context::{AuditEntry, CONTEXT_NAMESPACE, Namespace, RuleContext, strip_namespace};
pub use error::{Result, RuleError};
pub use executor::{CancellationFlag, RuleEngine};
pub use expr::Expression;
pub use logic::{LogicEvaluator, LogicTree};
pub use models::{ClauseCondition, ClauseDefinition, ConditionSpec, TableRuleDefinition};
pub use operators::{Comparator, LogicalOperator};
pub use resolver::{FieldAccess, FieldResolver};
pub use rules::{ConditionalRule, Rule, SequencedRuleset, SharedRule};
pub use table::{Action, CompiledClause, TableRule};
pub use translator::Translator;
