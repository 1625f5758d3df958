//! 规则执行服务
//!
//! 在核心规则引擎之外提供规则存储、同步执行服务和异步任务派发。

pub mod error;
pub mod service;
pub mod store;
pub mod tasks;

pub use error::{Result, ServiceError};
pub use service::{ExecutionKind, ExecutionRequest, ExecutionResponse, ExecutionTarget, RuleService};
pub use store::{DefinitionFormat, MemoryStorage, RulePosition, RuleStorage, RuleStore};
pub use tasks::{TaskDispatcher, TaskHandle, TaskStatus};
