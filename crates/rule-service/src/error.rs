//! 规则服务错误类型

use rule_engine::RuleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("规则集未找到: {0}")]
    RulesetNotFound(String),

    #[error("规则集定义无效: {0}")]
    InvalidRuleset(String),

    #[error("任务未找到: {0}")]
    TaskNotFound(String),

    #[error("任务异常终止: {0}")]
    TaskAborted(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// 核心不做重试，规则错误重放同一输入结果相同
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rule(e) => e.code(),
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::RulesetNotFound(_) => "RULESET_NOT_FOUND",
            Self::InvalidRuleset(_) => "INVALID_RULESET",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::TaskAborted(_) => "TASK_ABORTED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_errors_keep_their_code() {
        let err: ServiceError = RuleError::UnknownCondition { index: 3, count: 2 }.into();
        assert_eq!(err.code(), "UNKNOWN_CONDITION");
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            RuleError::UnknownCondition { index: 3, count: 2 }.to_string()
        );
    }

    #[test]
    fn test_service_error_codes() {
        assert_eq!(ServiceError::RuleNotFound("x".into()).code(), "RULE_NOT_FOUND");
        assert_eq!(ServiceError::RulesetNotFound("x".into()).code(), "RULESET_NOT_FOUND");
        assert_eq!(ServiceError::TaskNotFound("x".into()).code(), "TASK_NOT_FOUND");
        assert!(!ServiceError::RuleNotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_io_error_is_retryable() {
        let err: ServiceError = std::io::Error::other("disk").into();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(err.is_retryable());
    }
}
