//! 表格规则定义模型
//!
//! JSON 与 YAML 可互换的文本格式：
//!
//! ```yaml
//! ruleset: fares
//! rules:
//!   - rule: weekday
//!     if:
//!       logic: "1 & ~2"
//!       conditions: ["context.distance", "context.weekend"]
//!     then: ["context.fare * 4"]
//!     target: ["context.fare"]
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 条件描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionSpec {
    /// 常量，出现在第一位时整个条件组恒为该值
    Constant(bool),
    /// 字段路径或表达式
    Expression(String),
    /// 字段路径 → 期望值，多个条目以 AND 组合
    Fields(Map<String, Value>),
}

impl ConditionSpec {
    pub fn expression(source: impl Into<String>) -> Self {
        Self::Expression(source.into())
    }

    pub fn field(path: impl Into<String>, expected: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(path.into(), expected.into());
        Self::Fields(fields)
    }

    pub fn as_constant(&self) -> Option<bool> {
        match self {
            Self::Constant(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for ConditionSpec {
    fn from(value: bool) -> Self {
        Self::Constant(value)
    }
}

impl From<&str> for ConditionSpec {
    fn from(source: &str) -> Self {
        Self::Expression(source.to_string())
    }
}

/// 子句条件：可选逻辑串与有序条件列表
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawClauseCondition")]
pub struct ClauseCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    pub conditions: Vec<ConditionSpec>,
}

impl ClauseCondition {
    pub fn new(logic: Option<&str>, conditions: Vec<ConditionSpec>) -> Self {
        Self {
            logic: logic.map(str::to_string),
            conditions,
        }
    }
}

/// `if` 同时接受结构化写法和旧的列表写法
#[derive(Deserialize)]
#[serde(untagged)]
enum RawClauseCondition {
    Legacy(Vec<ConditionSpec>),
    Structured {
        #[serde(default)]
        logic: Option<String>,
        conditions: Vec<ConditionSpec>,
    },
}

impl From<RawClauseCondition> for ClauseCondition {
    fn from(raw: RawClauseCondition) -> Self {
        match raw {
            RawClauseCondition::Legacy(conditions) => Self {
                logic: None,
                conditions,
            },
            RawClauseCondition::Structured { logic, conditions } => Self { logic, conditions },
        }
    }
}

/// 表格规则的一个子句
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseDefinition {
    /// 显式子句标识，缺省时使用匹配计数
    #[serde(
        default,
        alias = "id",
        deserialize_with = "clause_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub rule: Option<String>,
    #[serde(rename = "if")]
    pub condition: ClauseCondition,
    /// 动作，字符串按表达式求值，其余作为字面量
    #[serde(default)]
    pub then: Vec<Value>,
    /// 与 then 按位置配对的目标字段
    #[serde(default)]
    pub target: Vec<String>,
}

/// 表格规则定义
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRuleDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset: Option<String>,
    pub rules: Vec<ClauseDefinition>,
    /// 编译前应用的词汇替换，按声明顺序
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<(String, String)>,
}

impl TableRuleDefinition {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// 子句标识可以写成字符串或整数
fn clause_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_definition_from_json() {
        let definition = TableRuleDefinition::from_json(
            r#"{
                "ruleset": "fares",
                "rules": [{
                    "rule": "weekday",
                    "if": {"logic": "1 & ~2", "conditions": ["context.distance", {"weekend": 1}, true]},
                    "then": ["context.fare * 4", 5],
                    "target": ["context.fare", "bonus"]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(definition.ruleset.as_deref(), Some("fares"));
        let clause = &definition.rules[0];
        assert_eq!(clause.rule.as_deref(), Some("weekday"));
        assert_eq!(clause.condition.logic.as_deref(), Some("1 & ~2"));
        assert_eq!(
            clause.condition.conditions,
            vec![
                ConditionSpec::expression("context.distance"),
                ConditionSpec::field("weekend", 1),
                ConditionSpec::Constant(true),
            ]
        );
        assert_eq!(clause.then, vec![json!("context.fare * 4"), json!(5)]);
    }

    #[test]
    fn test_legacy_list_from_yaml() {
        let definition = TableRuleDefinition::from_yaml(
            r#"
rules:
  - id: 7
    if: ["not context.foo"]
    then: ["10"]
    target: ["bar"]
translations:
  - ["ist", "=="]
"#,
        )
        .unwrap();

        let clause = &definition.rules[0];
        assert_eq!(clause.rule.as_deref(), Some("7"));
        assert_eq!(clause.condition.logic, None);
        assert_eq!(
            clause.condition.conditions,
            vec![ConditionSpec::expression("not context.foo")]
        );
        assert_eq!(
            definition.translations,
            vec![("ist".to_string(), "==".to_string())]
        );
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let definition = TableRuleDefinition {
            ruleset: None,
            rules: vec![ClauseDefinition {
                rule: None,
                condition: ClauseCondition::new(None, vec!["context.a".into()]),
                then: vec![json!(1)],
                target: vec!["b".to_string()],
            }],
            translations: Vec::new(),
        };
        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(
            value,
            json!({"rules": [{"if": {"conditions": ["context.a"]}, "then": [1], "target": ["b"]}]})
        );
        let back: TableRuleDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(back, definition);
    }
}
