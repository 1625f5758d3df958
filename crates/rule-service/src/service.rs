//! 同步执行服务
//!
//! 每次调用创建一个新的上下文，按目标取出规则交给引擎执行，返回上下文快照。

use crate::error::Result;
use crate::store::RuleStore;
use rule_engine::{RuleContext, RuleEngine};
use rulekit_shared::observability::metrics;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 执行目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    Rule,
    Ruleset,
}

impl ExecutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Ruleset => "ruleset",
        }
    }
}

/// 执行目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    Rule(String),
    Ruleset(String),
}

impl ExecutionTarget {
    pub fn new(kind: ExecutionKind, id: impl Into<String>) -> Self {
        match kind {
            ExecutionKind::Rule => Self::Rule(id.into()),
            ExecutionKind::Ruleset => Self::Ruleset(id.into()),
        }
    }

    pub fn kind(&self) -> ExecutionKind {
        match self {
            Self::Rule(_) => ExecutionKind::Rule,
            Self::Ruleset(_) => ExecutionKind::Ruleset,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Rule(id) | Self::Ruleset(id) => id,
        }
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.id())
    }
}

/// 执行请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub kind: ExecutionKind,
    pub target: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ExecutionRequest {
    pub fn into_parts(self) -> (ExecutionTarget, Map<String, Value>) {
        (ExecutionTarget::new(self.kind, self.target), self.context)
    }
}

/// 执行响应，`result` 为执行后的上下文快照（不含内部字段和审计日志）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub result: Map<String, Value>,
}

/// 规则执行服务
#[derive(Clone)]
pub struct RuleService {
    store: RuleStore,
    engine: RuleEngine,
}

impl RuleService {
    pub fn new(store: RuleStore) -> Self {
        Self {
            store,
            engine: RuleEngine::new(),
        }
    }

    /// 使用指定的引擎（例如带取消标记）
    pub fn with_engine(mut self, engine: RuleEngine) -> Self {
        self.engine = engine;
        self
    }

    /// 执行规则或规则集
    #[instrument(skip(self, context), fields(target = %target))]
    pub fn execute(
        &self,
        target: &ExecutionTarget,
        context: Map<String, Value>,
    ) -> Result<ExecutionResponse> {
        let start = Instant::now();
        let kind = target.kind().as_str();

        let outcome = self.run(target, context);
        let elapsed = start.elapsed().as_secs_f64();

        match &outcome {
            Ok(_) => {
                metrics::record_rule_execution(kind, "success", elapsed);
                info!(elapsed_ms = elapsed * 1000.0, "执行完成");
            }
            Err(e) => {
                metrics::record_rule_execution(kind, e.code(), elapsed);
                warn!(code = e.code(), "执行失败: {}", e);
            }
        }
        outcome
    }

    pub fn execute_rule(&self, id: &str, context: Map<String, Value>) -> Result<ExecutionResponse> {
        self.execute(&ExecutionTarget::Rule(id.to_string()), context)
    }

    pub fn execute_ruleset(
        &self,
        id: &str,
        context: Map<String, Value>,
    ) -> Result<ExecutionResponse> {
        self.execute(&ExecutionTarget::Ruleset(id.to_string()), context)
    }

    fn run(&self, target: &ExecutionTarget, context: Map<String, Value>) -> Result<ExecutionResponse> {
        let rules = match target {
            ExecutionTarget::Rule(id) => vec![self.store.get_rule(id)?],
            ExecutionTarget::Ruleset(id) => self.store.get_ruleset(id)?,
        };

        let mut ctx = RuleContext::from_map(context);
        self.engine.execute(&rules, &mut ctx)?;
        debug!(executed = ctx.executed().len(), "审计记录");

        Ok(ExecutionResponse {
            result: ctx.into_snapshot(),
        })
    }
}
