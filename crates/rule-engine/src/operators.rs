//! 规则操作符定义

use crate::error::{Result, RuleError};
use crate::values;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// 比较器，以字段路径最后一段的后缀形式出现，如 `order.amount.gte`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    // 数值/全序比较
    Gt,
    Lt,
    Gte,
    Lte,

    // 通用比较
    Eq,
    Neq,

    // 包含检查
    Contains,
    #[serde(rename = "icontains")]
    IContains,

    // 真值检查
    Bool,
}

impl Comparator {
    pub const ALL: [Comparator; 9] = [
        Self::Gt,
        Self::Lt,
        Self::Gte,
        Self::Lte,
        Self::Eq,
        Self::Neq,
        Self::Contains,
        Self::IContains,
        Self::Bool,
    ];

    /// 按路径后缀查找比较器
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == suffix)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::Bool => "bool",
        }
    }

    /// 在解析出的字段值与期望值之间应用比较器
    pub fn apply(&self, value: &Value, expected: &Value) -> Result<bool> {
        match self {
            Self::Gt => self.ordering(value, expected).map(|o| o == Ordering::Greater),
            Self::Lt => self.ordering(value, expected).map(|o| o == Ordering::Less),
            Self::Gte => self.ordering(value, expected).map(|o| o != Ordering::Less),
            Self::Lte => self.ordering(value, expected).map(|o| o != Ordering::Greater),
            Self::Eq => Ok(values::loose_eq(value, expected)),
            Self::Neq => Ok(!values::loose_eq(value, expected)),
            Self::Contains => values::contains(value, expected)
                .ok_or_else(|| self.mismatch(value, expected)),
            Self::IContains => values::contains_ignore_case(value, expected)
                .ok_or_else(|| self.mismatch(value, expected)),
            Self::Bool => Ok(values::loose_eq(
                &Value::Bool(values::truthy(value)),
                expected,
            )),
        }
    }

    fn ordering(&self, value: &Value, expected: &Value) -> Result<Ordering> {
        values::compare(value, expected).ok_or_else(|| self.mismatch(value, expected))
    }

    fn mismatch(&self, value: &Value, expected: &Value) -> RuleError {
        RuleError::TypeMismatch {
            operator: self.to_string(),
            left: values::type_name(value).to_string(),
            right: values::type_name(expected).to_string(),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Xor,
}

impl LogicalOperator {
    pub fn apply(&self, left: bool, right: bool) -> bool {
        match self {
            Self::And => left && right,
            Self::Or => left || right,
            Self::Xor => left ^ right,
        }
    }

    /// 紧凑逻辑串中的符号
    pub fn symbol(&self) -> char {
        match self {
            Self::And => '&',
            Self::Or => '|',
            Self::Xor => '^',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '&' => Some(Self::And),
            '|' => Some(Self::Or),
            '^' => Some(Self::Xor),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Xor => write!(f, "XOR"),
        }
    }
}
