//! 共享库
//!
//! 包含规则服务共用的分层配置加载和日志、指标初始化代码。

pub mod config;
pub mod observability;
