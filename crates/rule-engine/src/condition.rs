//! 条件表达式
//!
//! 由字段比较叶子和 AND/OR/XOR 内部节点组成的不可变布尔树。
//! 所有组合操作都返回新树，子树通过 `Arc` 共享。

use crate::context::Namespace;
use crate::error::Result;
use crate::expr::Expression;
use crate::models::ConditionSpec;
use crate::operators::LogicalOperator;
use crate::resolver::FieldResolver;
use crate::values;
use serde_json::Value;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::sync::Arc;

/// 叶子条件的求值对象
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    /// 字段路径，交给 FieldResolver 解析和比较
    Path(String),
    /// 表达式，取其真值与期望值比较
    Expr(Expression),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConditionExpression {
    /// 中性元素，与任何树组合都得到另一方
    #[default]
    Empty,
    Leaf {
        subject: Subject,
        expected: Value,
        negated: bool,
    },
    Node {
        operator: LogicalOperator,
        left: Arc<ConditionExpression>,
        right: Arc<ConditionExpression>,
        negated: bool,
    },
}

impl ConditionExpression {
    pub fn empty() -> Self {
        Self::Empty
    }

    /// 字段比较叶子
    pub fn leaf(path: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self::Leaf {
            subject: Subject::Path(path.into()),
            expected: expected.into(),
            negated: false,
        }
    }

    /// 表达式真值叶子
    pub fn predicate(expression: Expression) -> Self {
        Self::Leaf {
            subject: Subject::Expr(expression),
            expected: Value::Bool(true),
            negated: false,
        }
    }

    pub fn constant(value: bool) -> Self {
        Self::predicate(Expression::literal(Value::Bool(value)))
    }

    /// 从条件描述构建
    ///
    /// 字符串按表达式编译，只是一个字段引用时退化为 `(path, true)` 的字段叶子；
    /// 映射的多个条目以 AND 组合；布尔值成为常量叶子。
    pub fn from_spec(spec: &ConditionSpec) -> Result<Self> {
        match spec {
            ConditionSpec::Constant(value) => Ok(Self::constant(*value)),
            ConditionSpec::Expression(source) => {
                let expression = Expression::compile(source)?;
                Ok(match expression.as_path() {
                    Some(path) => Self::leaf(path, true),
                    None => Self::predicate(expression),
                })
            }
            ConditionSpec::Fields(fields) => Ok(fields
                .iter()
                .fold(Self::Empty, |acc, (path, expected)| {
                    acc.and(&Self::leaf(path.as_str(), expected.clone()))
                })),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// 用逻辑操作符与另一棵树组合
    pub fn combine(&self, other: &Self, operator: LogicalOperator) -> Self {
        match (self, other) {
            (Self::Empty, _) => other.clone(),
            (_, Self::Empty) => self.clone(),
            _ => Self::Node {
                operator,
                left: Arc::new(self.clone()),
                right: Arc::new(other.clone()),
                negated: false,
            },
        }
    }

    pub fn and(&self, other: &Self) -> Self {
        self.combine(other, LogicalOperator::And)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.combine(other, LogicalOperator::Or)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.combine(other, LogicalOperator::Xor)
    }

    /// 翻转顶层取反标志，不改动子树
    pub fn negate(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Leaf {
                subject,
                expected,
                negated,
            } => Self::Leaf {
                subject: subject.clone(),
                expected: expected.clone(),
                negated: !negated,
            },
            Self::Node {
                operator,
                left,
                right,
                negated,
            } => Self::Node {
                operator: *operator,
                left: Arc::clone(left),
                right: Arc::clone(right),
                negated: !negated,
            },
        }
    }

    /// 对命名空间求值，取反作用于组合结果而非各个子树
    pub fn evaluate<N>(&self, namespace: &N) -> Result<bool>
    where
        N: Namespace + ?Sized,
    {
        match self {
            Self::Empty => Ok(true),
            Self::Leaf {
                subject,
                expected,
                negated,
            } => {
                let matched = match subject {
                    Subject::Path(path) => FieldResolver::evaluate(path, namespace, expected)?,
                    Subject::Expr(expression) => {
                        let value = expression.evaluate(namespace)?;
                        values::loose_eq(&Value::Bool(values::truthy(&value)), expected)
                    }
                };
                Ok(matched ^ negated)
            }
            Self::Node {
                operator,
                left,
                right,
                negated,
            } => {
                let left = left.evaluate(namespace)?;
                let right = right.evaluate(namespace)?;
                Ok(operator.apply(left, right) ^ negated)
            }
        }
    }
}

impl fmt::Display for ConditionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "N/A"),
            Self::Leaf {
                subject,
                expected,
                negated,
            } => {
                let op = if *negated { "!=" } else { "==" };
                write!(f, "{subject} {op} {expected}")
            }
            Self::Node {
                operator,
                left,
                right,
                negated,
            } => {
                let prefix = if *negated { "NOT" } else { "" };
                write!(f, "{prefix}({left} {operator} {right})")
            }
        }
    }
}

impl BitAnd for ConditionExpression {
    type Output = ConditionExpression;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(&rhs)
    }
}

impl BitOr for ConditionExpression {
    type Output = ConditionExpression;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(&rhs)
    }
}

impl BitXor for ConditionExpression {
    type Output = ConditionExpression;

    fn bitxor(self, rhs: Self) -> Self::Output {
        self.xor(&rhs)
    }
}

impl Not for ConditionExpression {
    type Output = ConditionExpression;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RuleContext;
    use serde_json::json;

    type C = ConditionExpression;

    fn context() -> RuleContext {
        RuleContext::from_json(r#"{"foo": "bar", "num": 10, "flag": true}"#).unwrap()
    }

    #[test]
    fn test_leaf() {
        let ctx = context();
        assert!(C::leaf("foo", "bar").evaluate(&ctx).unwrap());
        assert!(!C::leaf("foo", "baz").evaluate(&ctx).unwrap());
        assert!(!C::leaf("foo", "bar").negate().evaluate(&ctx).unwrap());
        assert!(C::leaf("num.gte", 10).evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_empty_is_neutral() {
        let leaf = C::leaf("foo", "bar");
        assert_eq!(C::empty().and(&leaf), leaf);
        assert_eq!(leaf.or(&C::empty()), leaf);
        assert_eq!(C::empty().negate(), C::Empty);
        assert!(C::empty().evaluate(&context()).unwrap());
        assert_eq!(C::empty().to_string(), "N/A");
    }

    #[test]
    fn test_combinators_do_not_mutate() {
        let a = C::leaf("foo", "bar");
        let b = C::leaf("num", 10);
        let combined = a.and(&b);
        assert_eq!(a, C::leaf("foo", "bar"));
        assert_eq!(b, C::leaf("num", 10));
        assert!(matches!(combined, C::Node { operator: LogicalOperator::And, .. }));
    }

    #[test]
    fn test_structural_equality() {
        let a = C::leaf("foo", "bar") & C::leaf("num", 10);
        let b = C::leaf("foo", "bar") & C::leaf("num", 10);
        assert_eq!(a, b);
        assert_ne!(a, C::leaf("foo", "bar") | C::leaf("num", 10));
    }

    #[test]
    fn test_double_negation() {
        let ctx = context();
        let exprs = [
            C::leaf("foo", "bar"),
            C::leaf("foo", "bar") ^ C::leaf("flag", true),
            !(C::leaf("num", 1) | C::leaf("flag", false)),
        ];
        for expr in exprs {
            let twice = expr.negate().negate();
            assert_eq!(twice, expr);
            assert_eq!(twice.evaluate(&ctx).unwrap(), expr.evaluate(&ctx).unwrap());
            assert_eq!(
                expr.negate().evaluate(&ctx).unwrap(),
                !expr.evaluate(&ctx).unwrap()
            );
        }
    }

    #[test]
    fn test_boolean_algebra() {
        let ctx = context();
        let leaves = [C::leaf("foo", "bar"), C::leaf("num", 11), C::leaf("flag", true)];
        for a in &leaves {
            for b in &leaves {
                let (x, y) = (a.evaluate(&ctx).unwrap(), b.evaluate(&ctx).unwrap());
                assert_eq!(a.and(b).evaluate(&ctx).unwrap(), x && y);
                assert_eq!(a.or(b).evaluate(&ctx).unwrap(), x || y);
                assert_eq!(a.xor(b).evaluate(&ctx).unwrap(), x ^ y);
            }
        }
    }

    #[test]
    fn test_negation_applies_to_combined_result() {
        let ctx = context();
        // NOT(true AND false) == true，而逐个取反会得到 false
        let expr = !(C::leaf("foo", "bar") & C::leaf("num", 11));
        assert!(expr.evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(C::leaf("a", 1).to_string(), "a == 1");
        assert_eq!(C::leaf("a", 1).negate().to_string(), "a != 1");
        let node = C::leaf("a", 1) & C::leaf("b", "x");
        assert_eq!(node.to_string(), "(a == 1 AND b == \"x\")");
        assert_eq!(node.negate().to_string(), "NOT(a == 1 AND b == \"x\")");
    }

    #[test]
    fn test_from_spec() {
        let ctx = RuleContext::from_json(r#"{"foo": false, "weather": "nice", "a": 1, "b": 2}"#)
            .unwrap();

        let spec = ConditionSpec::Expression("not context.foo".to_string());
        assert!(C::from_spec(&spec).unwrap().evaluate(&ctx).unwrap());

        let spec = ConditionSpec::Expression("context.foo".to_string());
        assert_eq!(C::from_spec(&spec).unwrap(), C::leaf("foo", true));

        let spec = ConditionSpec::Expression("context.weather == 'nice'".to_string());
        assert!(C::from_spec(&spec).unwrap().evaluate(&ctx).unwrap());

        let spec: ConditionSpec = serde_json::from_value(json!({"a": 1, "b.gt": 1})).unwrap();
        let expr = C::from_spec(&spec).unwrap();
        assert!(matches!(expr, C::Node { .. }));
        assert!(expr.evaluate(&ctx).unwrap());

        assert!(!C::from_spec(&ConditionSpec::Constant(false)).unwrap().evaluate(&ctx).unwrap());
    }
}
