//! 规则上下文
//!
//! 一次执行所用的可变命名值集合，以及只追加的审计日志。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 条件、动作和目标路径中代表上下文本身的命名空间
pub const CONTEXT_NAMESPACE: &str = "context";

/// 以此前缀开头的字段为内部字段，不出现在对外快照中
pub const INTERNAL_PREFIX: char = '_';

/// 审计日志条目：规则标识与该规则的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub rule_id: String,
    pub result: Value,
}

impl AuditEntry {
    pub fn new(rule_id: impl Into<String>, result: impl Into<Value>) -> Self {
        Self {
            rule_id: rule_id.into(),
            result: result.into(),
        }
    }
}

/// 名称查找能力，条件和表达式求值都基于它
pub trait Namespace {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Namespace for Map<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Namespace for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// 去掉路径开头的 `context.` 命名空间前缀
pub fn strip_namespace(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix(CONTEXT_NAMESPACE)
        .and_then(|rest| rest.strip_prefix('.'))
        .map(str::trim_start)
        .unwrap_or(path)
}

/// 规则上下文
///
/// 每次执行创建一个，不在无关的执行之间共享。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleContext {
    data: Map<String, Value>,
    executed: Vec<AuditEntry>,
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data,
            executed: Vec::new(),
        }
    }

    /// 从 JSON 对象创建
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let data: Map<String, Value> = serde_json::from_str(json)?;
        Ok(Self::from_map(data))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(name.into(), value.into());
    }

    /// 将部分映射合并进上下文
    pub fn update(&mut self, values: Map<String, Value>) {
        self.data.extend(values);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.data.remove(name)
    }

    /// 追加审计记录，审计日志在一次执行中从不截断
    pub fn record(&mut self, rule_id: impl Into<String>, result: impl Into<Value>) {
        self.executed.push(AuditEntry::new(rule_id, result));
    }

    pub fn executed(&self) -> &[AuditEntry] {
        &self.executed
    }

    /// 对外快照，不含内部字段和审计日志
    pub fn snapshot(&self) -> Map<String, Value> {
        self.data
            .iter()
            .filter(|(key, _)| !key.starts_with(INTERNAL_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn into_snapshot(self) -> Map<String, Value> {
        self.data
            .into_iter()
            .filter(|(key, _)| !key.starts_with(INTERNAL_PREFIX))
            .collect()
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl Namespace for RuleContext {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

impl From<Map<String, Value>> for RuleContext {
    fn from(data: Map<String, Value>) -> Self {
        Self::from_map(data)
    }
}
