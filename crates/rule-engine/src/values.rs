//! 值语义
//!
//! 条件叶子、比较器和表达式求值共用的真值、宽松相等、排序与包含判断。

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// 数值视图，布尔值按 0/1 参与比较和运算
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    /// 转回 JSON 值，NaN 和无穷大无法表示时返回 None
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Int(i) => Some(Value::from(i)),
            Self::Float(f) => Number::from_f64(f).map(Value::Number),
        }
    }

    fn partial_cmp(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

/// 真值判断：null、false、0、空字符串、空数组、空对象为假
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// 宽松相等
///
/// 数值不区分整数和浮点表示（`800 == 800.0`），布尔与数值比较时按 0/1 处理，
/// 数组和对象逐元素比较，其余类型严格相等。
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, v)| b.get(key).is_some_and(|w| loose_eq(v, w)))
        }
        _ => match (Numeric::of(left), Numeric::of(right)) {
            (Some(a), Some(b)) => a.partial_cmp(b) == Some(Ordering::Equal),
            _ => left == right,
        },
    }
}

/// 全序比较，类型不可比较时返回 None
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => Numeric::of(left)?.partial_cmp(Numeric::of(right)?),
    }
}

/// 包含判断：字符串子串、数组成员、对象键
pub fn contains(container: &Value, item: &Value) -> Option<bool> {
    match container {
        Value::String(s) => item.as_str().map(|sub| s.contains(sub)),
        Value::Array(items) => Some(items.iter().any(|v| loose_eq(v, item))),
        Value::Object(map) => item.as_str().map(|key| map.contains_key(key)),
        _ => None,
    }
}

/// 忽略大小写的包含判断
pub fn contains_ignore_case(container: &Value, item: &Value) -> Option<bool> {
    let needle = item.as_str()?.to_lowercase();
    match container {
        Value::String(s) => Some(s.to_lowercase().contains(&needle)),
        Value::Array(items) => Some(
            items
                .iter()
                .any(|v| v.as_str().is_some_and(|s| s.to_lowercase() == needle)),
        ),
        Value::Object(map) => Some(map.keys().any(|key| key.to_lowercase() == needle)),
        _ => None,
    }
}

/// 获取值的类型名称
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("nice")));
        assert!(truthy(&json!({"a": 1})));
    }

    #[test]
    fn test_loose_eq_numbers() {
        assert!(loose_eq(&json!(800), &json!(800.0)));
        assert!(loose_eq(&json!(1), &json!(true)));
        assert!(loose_eq(&json!(0), &json!(false)));
        assert!(!loose_eq(&json!(2), &json!(true)));
        assert!(!loose_eq(&json!("1"), &json!(1)));
    }

    #[test]
    fn test_loose_eq_nested() {
        assert!(loose_eq(&json!([1, {"a": 2}]), &json!([1.0, {"a": 2.0}])));
        assert!(!loose_eq(&json!([1, 2]), &json!([1, 2, 3])));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(10), &json!(9.5)), Some(Ordering::Greater));
        assert_eq!(compare(&json!("abc"), &json!("abd")), Some(Ordering::Less));
        assert_eq!(compare(&json!([1, 2]), &json!([1, 2, 0])), Some(Ordering::Less));
        assert_eq!(compare(&json!("a"), &json!(1)), None);
        assert_eq!(compare(&json!(null), &json!(null)), None);
    }

    #[test]
    fn test_contains() {
        assert_eq!(contains(&json!("foobar"), &json!("ba")), Some(true));
        assert_eq!(contains(&json!("foobar"), &json!("BA")), Some(false));
        assert_eq!(contains(&json!(["a", 1]), &json!(1.0)), Some(true));
        assert_eq!(contains(&json!({"k": 1}), &json!("k")), Some(true));
        assert_eq!(contains(&json!(10), &json!(1)), None);
        assert_eq!(contains_ignore_case(&json!("foobar"), &json!("BA")), Some(true));
        assert_eq!(contains_ignore_case(&json!("foobar"), &json!("xx")), Some(false));
    }
}
