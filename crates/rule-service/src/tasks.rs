//! 异步任务派发
//!
//! 提交后立即返回任务句柄，执行放在 Tokio 的阻塞线程池中完成；
//! 调用方可以查询状态或等待结果。
//!
//! 任务记录的生命周期：
//! - `wait` 拿到最终状态后立即移除记录
//! - 只靠 `status` 轮询的任务，结束后保留一段时间（默认 10 分钟），
//!   在之后的 `submit` 时清理
//! - 未结束的任务不会被清理

use crate::error::{Result, ServiceError};
use crate::service::{ExecutionResponse, ExecutionTarget, RuleService};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rulekit_shared::observability::metrics;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// 任务句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    id: Uuid,
    submitted_at: DateTime<Utc>,
}

impl TaskHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// 任务状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Succeeded(ExecutionResponse),
    Failed { code: String, message: String },
}

impl TaskStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn from_error(error: &ServiceError) -> Self {
        Self::Failed {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// 已结束任务的默认保留时间
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(600);

#[derive(Debug, Clone)]
struct TaskState {
    status: TaskStatus,
    finished_at: Option<Instant>,
}

impl TaskState {
    fn finished(status: TaskStatus) -> Self {
        Self {
            status,
            finished_at: Some(Instant::now()),
        }
    }
}

/// 读取当前状态；执行端未写入结果就退出时视为中止
fn current_status(id: Uuid, rx: &watch::Receiver<TaskState>) -> TaskStatus {
    let status = rx.borrow().status.clone();
    if status.is_pending() && rx.has_changed().is_err() {
        return TaskStatus::from_error(&ServiceError::TaskAborted(id.to_string()));
    }
    status
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// 任务派发器
#[derive(Clone)]
pub struct TaskDispatcher {
    service: Arc<RuleService>,
    tasks: Arc<DashMap<Uuid, watch::Receiver<TaskState>>>,
    retention: Duration,
}

impl TaskDispatcher {
    pub fn new(service: Arc<RuleService>) -> Self {
        Self {
            service,
            tasks: Arc::new(DashMap::new()),
            retention: DEFAULT_RETENTION,
        }
    }

    /// 设置已结束任务的保留时间
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// 提交执行任务，需要在 Tokio 运行时内调用
    ///
    /// 提交前先清理超过保留时间的已结束任务。
    #[instrument(skip(self, context), fields(target = %target))]
    pub fn submit(&self, target: ExecutionTarget, context: Map<String, Value>) -> TaskHandle {
        self.purge_finished();

        let handle = TaskHandle {
            id: Uuid::new_v4(),
            submitted_at: Utc::now(),
        };
        let (tx, rx) = watch::channel(TaskState {
            status: TaskStatus::Pending,
            finished_at: None,
        });
        self.tasks.insert(handle.id, rx);
        metrics::record_task_submitted(target.kind().as_str());

        let service = Arc::clone(&self.service);
        let task_id = handle.id;
        tokio::task::spawn_blocking(move || {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| service.execute(&target, context)));
            let status = match outcome {
                Ok(Ok(response)) => TaskStatus::Succeeded(response),
                Ok(Err(e)) => TaskStatus::from_error(&e),
                Err(payload) => {
                    error!(%task_id, "任务执行中断: {}", panic_message(payload.as_ref()));
                    TaskStatus::from_error(&ServiceError::TaskAborted(task_id.to_string()))
                }
            };
            debug!(%task_id, "任务完成");
            // 记录已被移除时无人接收
            let _ = tx.send(TaskState::finished(status));
        });

        info!(task_id = %handle.id, "任务已提交");
        handle
    }

    /// 查询任务当前状态
    pub fn status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        self.tasks
            .get(&handle.id)
            .map(|rx| current_status(handle.id, &rx))
            .ok_or_else(|| ServiceError::TaskNotFound(handle.id.to_string()))
    }

    /// 等待任务结束并返回最终状态，随后移除任务记录
    ///
    /// 执行线程异常退出时返回 `TASK_ABORTED` 失败状态。
    pub async fn wait(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        let mut rx = self
            .tasks
            .get(&handle.id)
            .map(|rx| rx.clone())
            .ok_or_else(|| ServiceError::TaskNotFound(handle.id.to_string()))?;

        let status = match rx.wait_for(|state| !state.status.is_pending()).await {
            Ok(state) => state.status.clone(),
            Err(_) => TaskStatus::from_error(&ServiceError::TaskAborted(handle.id.to_string())),
        };
        self.tasks.remove(&handle.id);
        Ok(status)
    }

    /// 移除任务记录，返回最后的状态
    pub fn remove(&self, handle: &TaskHandle) -> Option<TaskStatus> {
        self.tasks
            .remove(&handle.id)
            .map(|(id, rx)| current_status(id, &rx))
    }

    fn purge_finished(&self) {
        let before = self.tasks.len();
        self.tasks.retain(|_, rx| {
            let state = rx.borrow();
            match state.finished_at {
                Some(finished_at) => finished_at.elapsed() < self.retention,
                None => rx.has_changed().is_ok(),
            }
        });
        let purged = before.saturating_sub(self.tasks.len());
        if purged > 0 {
            debug!(purged, "清理已结束任务");
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
