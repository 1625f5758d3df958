//! 两阶段逻辑求值器

use super::parser::{self, LogicTree};
use crate::condition::ConditionExpression;
use crate::context::Namespace;
use crate::error::{Result, RuleError};
use crate::models::ConditionSpec;
use serde_json::{Map, Value};

/// 条件在逻辑上下文中的名称前缀
pub const CONDITION_PREFIX: &str = "cond";

/// 逻辑求值器
///
/// 第一阶段对每个条件在原始上下文中求值，得到 `cond{i}` → 布尔值的逻辑上下文；
/// 第二阶段在这个逻辑上下文上对折叠后的逻辑树求值，同一序号多次出现也只解析一次字段。
#[derive(Debug, Clone)]
pub struct LogicEvaluator {
    tree: LogicTree,
    logic: ConditionExpression,
    conditions: Vec<(String, ConditionExpression)>,
    constant: Option<bool>,
}

impl LogicEvaluator {
    /// 创建求值器
    ///
    /// # Arguments
    /// * `logic` - 逻辑串，缺省为 `"1 & 2 & ... & N"`
    /// * `specs` - 条件描述，第一项为布尔值时求值器恒返回该值
    pub fn new(logic: Option<&str>, specs: &[ConditionSpec]) -> Result<Self> {
        if specs.is_empty() {
            return Err(RuleError::Definition("条件列表不能为空".to_string()));
        }

        let logic_source = match logic {
            Some(logic) => logic.to_string(),
            None => Self::default_logic(specs.len()),
        };
        let tree = parser::parse(&logic_source)?;
        let folded = Self::fold(&tree);

        if let Some(constant) = specs[0].as_constant() {
            return Ok(Self {
                tree,
                logic: folded,
                conditions: Vec::new(),
                constant: Some(constant),
            });
        }

        let count = specs.len();
        if let Some(index) = tree.references().into_iter().find(|i| *i == 0 || *i > count) {
            return Err(RuleError::UnknownCondition { index, count });
        }

        let conditions = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                ConditionExpression::from_spec(spec).map(|expr| (Self::condition_name(i + 1), expr))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tree,
            logic: folded,
            conditions,
            constant: None,
        })
    }

    pub fn default_logic(count: usize) -> String {
        (1..=count)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(" & ")
    }

    /// 解析逻辑串并折叠为条件表达式
    pub fn parse_logic(logic: &str) -> Result<ConditionExpression> {
        parser::parse(logic).map(|tree| Self::fold(&tree))
    }

    /// 序号叶子映射为 `(cond{i}, true)`，操作符与取反映射为对应组合
    pub fn fold(tree: &LogicTree) -> ConditionExpression {
        match tree {
            LogicTree::Ref(index) => ConditionExpression::leaf(Self::condition_name(*index), true),
            LogicTree::Not(inner) => Self::fold(inner).negate(),
            LogicTree::Binary { left, op, right } => {
                Self::fold(left).combine(&Self::fold(right), *op)
            }
        }
    }

    fn condition_name(index: usize) -> String {
        format!("{CONDITION_PREFIX}{index}")
    }

    /// 折叠后的逻辑表达式
    pub fn logic(&self) -> &ConditionExpression {
        &self.logic
    }

    pub fn tree(&self) -> &LogicTree {
        &self.tree
    }

    pub fn conditions(&self) -> &[(String, ConditionExpression)] {
        &self.conditions
    }

    pub fn constant(&self) -> Option<bool> {
        self.constant
    }

    /// 第一阶段：所有条件在原始上下文中求值
    pub fn logic_context<N>(&self, namespace: &N) -> Result<Map<String, Value>>
    where
        N: Namespace + ?Sized,
    {
        self.conditions
            .iter()
            .map(|(name, expr)| Ok((name.clone(), Value::Bool(expr.evaluate(namespace)?))))
            .collect()
    }

    pub fn evaluate<N>(&self, namespace: &N) -> Result<bool>
    where
        N: Namespace + ?Sized,
    {
        if let Some(constant) = self.constant {
            return Ok(constant);
        }
        let logic_context = self.logic_context(namespace)?;
        self.logic.evaluate(&logic_context)
    }
}
