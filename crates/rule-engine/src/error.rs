//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("字段解析失败: 无法解析 '{segment}' (路径 '{path}')")]
    FieldResolution { path: String, segment: String },

    #[error("逻辑表达式解析失败: '{input}' 位置 {position}: {message}")]
    Parse {
        input: String,
        position: usize,
        message: String,
    },

    #[error("逻辑表达式引用了不存在的条件 {index} (共 {count} 个条件)")]
    UnknownCondition { index: usize, count: usize },

    #[error("表达式编译失败: '{expression}': {message}")]
    Expression { expression: String, message: String },

    #[error("动作表达式执行失败: '{expression}': {message}")]
    ActionEvaluation { expression: String, message: String },

    #[error("类型不匹配: 操作符 {operator} 不支持 {left} 与 {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("子句 {clause} 的 then/target 数量不一致: then={actions}, target={targets}")]
    ArityMismatch {
        clause: String,
        actions: usize,
        targets: usize,
    },

    #[error("规则定义无效: {0}")]
    Definition(String),

    #[error("规则执行失败: {0}")]
    ExecutionError(String),

    #[error("规则执行已取消: 已完成 {completed} 条规则")]
    Cancelled { completed: usize },

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML 解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::FieldResolution { .. } => "FIELD_RESOLUTION_ERROR",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::UnknownCondition { .. } => "UNKNOWN_CONDITION",
            Self::Expression { .. } => "EXPRESSION_ERROR",
            Self::ActionEvaluation { .. } => "ACTION_EVALUATION_ERROR",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::ArityMismatch { .. } => "ARITY_MISMATCH",
            Self::Definition(_) => "INVALID_DEFINITION",
            Self::ExecutionError(_) => "EXECUTION_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::JsonError(_) => "JSON_ERROR",
            Self::YamlError(_) => "YAML_ERROR",
        }
    }

    pub(crate) fn action(expression: &str, message: impl Into<String>) -> Self {
        Self::ActionEvaluation {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = RuleError::FieldResolution {
            path: "user.age".to_string(),
            segment: "age".to_string(),
        };
        assert_eq!(err.code(), "FIELD_RESOLUTION_ERROR");
        assert!(err.to_string().contains("user.age"));
    }

    #[test]
    fn test_json_error_conversion() {
        let err: RuleError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), "JSON_ERROR");
    }
}
