//! 指标模块
//!
//! 基于 metrics crate 的门面记录指标，不安装导出器；
//! 嵌入方自行安装 recorder 后即可采集。

/// 注册指标描述
pub fn describe_metrics() {
    metrics::describe_counter!("rule_executions_total", "Total number of rule executions");
    metrics::describe_histogram!(
        "rule_execution_duration_seconds",
        "Rule execution duration in seconds"
    );
    metrics::describe_counter!(
        "rule_tasks_submitted_total",
        "Total number of asynchronously submitted rule tasks"
    );
}

/// 记录一次规则执行
///
/// `kind` 为 rule 或 ruleset，`outcome` 为 success 或错误码
pub fn record_rule_execution(kind: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "rule_executions_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "rule_execution_duration_seconds",
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}

/// 记录一次异步任务提交
pub fn record_task_submitted(kind: &str) {
    metrics::counter!("rule_tasks_submitted_total", "kind" => kind.to_string()).increment(1);
}
