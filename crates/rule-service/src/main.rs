//! 规则执行器
//!
//! 从标准输入读取一个执行请求，通过任务派发器执行后把响应输出到标准输出。

use anyhow::{Result, bail};
use rule_service::{ExecutionRequest, MemoryStorage, RuleService, RuleStore, TaskDispatcher, TaskStatus};
use rulekit_shared::config::AppConfig;
use rulekit_shared::observability;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("rule-runner").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let _guard = observability::init(&config.service_name, &config.observability)?;

    info!("Starting rule-runner...");

    let storage = Arc::new(MemoryStorage::from_config(&config.engine)?);
    info!(
        rules = storage.len(),
        rulesets = storage.list_rulesets().len(),
        "Rule storage initialized"
    );

    let service = RuleService::new(RuleStore::new(storage));
    let dispatcher = TaskDispatcher::new(Arc::new(service));

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let request: ExecutionRequest = serde_json::from_str(&input)?;
    let (target, context) = request.into_parts();

    let handle = dispatcher.submit(target, context);
    match dispatcher.wait(&handle).await? {
        TaskStatus::Succeeded(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        TaskStatus::Failed { code, message } => {
            error!(task_id = %handle.id(), code = %code, "执行失败: {}", message);
            bail!("{}: {}", code, message);
        }
        TaskStatus::Pending => bail!("任务 {} 未完成", handle.id()),
    }

    info!("rule-runner finished");
    Ok(())
}
