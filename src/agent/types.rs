//! 执行计划与任务结果的数据结构

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{AgentError, FlowInfo, Result};
use crate::flow::Variables;

/// 计划中的一步：调用哪个 flow、以什么输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub flow: String,
    /// 输入文本，可含 {{previous_output}} / {{step_N_output}} / {{objective}}
    pub input: String,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: usize,
    #[serde(default = "default_retryable")]
    pub retryable: bool,
}

fn default_retryable() -> bool {
    true
}

impl ExecutionStep {
    pub fn new(flow: impl Into<String>, input: impl Into<String>, order: usize) -> Self {
        Self {
            flow: flow.into(),
            input: input.into(),
            variables: Variables::new(),
            description: String::new(),
            order,
            retryable: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub objective: String,
    pub steps: Vec<ExecutionStep>,
}

impl ExecutionPlan {
    pub fn new(objective: impl Into<String>, steps: Vec<ExecutionStep>) -> Self {
        Self {
            objective: objective.into(),
            steps,
        }
    }

    /// 拒绝空计划、未知 flow 与空输入
    pub fn validate(&self, available: &[FlowInfo]) -> Result<()> {
        if self.steps.is_empty() {
            return Err(AgentError::InvalidPlan("plan has no steps".to_string()));
        }
        let known: HashSet<&str> = available.iter().map(|f| f.name.as_str()).collect();
        for (i, step) in self.steps.iter().enumerate() {
            if !known.contains(step.flow.as_str()) {
                return Err(AgentError::InvalidPlan(format!(
                    "step {} references unknown flow '{}'",
                    i + 1,
                    step.flow
                )));
            }
            if step.input.trim().is_empty() {
                return Err(AgentError::InvalidPlan(format!(
                    "step {} ({}) has empty input",
                    i + 1,
                    step.flow
                )));
            }
        }
        Ok(())
    }

    /// 按 order 稳定排序后的副本
    pub fn sorted_steps(&self) -> Vec<ExecutionStep> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.order);
        steps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// 计划中的序号（从 1 计）
    pub index: usize,
    pub flow: String,
    pub description: String,
    /// 替换占位符之后的输入
    pub input: String,
    pub variables: Variables,
    pub output: String,
    pub think: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub objective: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn start(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            status: TaskStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            steps: Vec::new(),
            error: None,
        }
    }

    /// 最后一步的输出；尚无步骤时为空串
    pub fn final_output(&self) -> &str {
        self.steps.last().map(|s| s.output.as_str()).unwrap_or("")
    }

    pub(crate) fn finish(&mut self, status: TaskStatus, error: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.error = error;
        self.duration_ms = elapsed_ms(self.started_at, now);
        self.ended_at = Some(now);
    }
}

pub(crate) fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flows() -> Vec<FlowInfo> {
        vec![FlowInfo::new("a", "first"), FlowInfo::new("b", "second")]
    }

    #[test]
    fn test_validate() {
        let ok = ExecutionPlan::new("o", vec![ExecutionStep::new("a", "o", 0)]);
        assert!(ok.validate(&flows()).is_ok());

        let empty = ExecutionPlan::new("o", vec![]);
        assert!(matches!(empty.validate(&flows()), Err(AgentError::InvalidPlan(_))));

        let unknown = ExecutionPlan::new("o", vec![ExecutionStep::new("zzz", "o", 0)]);
        assert!(unknown.validate(&flows()).is_err());

        let blank = ExecutionPlan::new("o", vec![ExecutionStep::new("a", "  ", 0)]);
        assert!(blank.validate(&flows()).is_err());
    }

    #[test]
    fn test_sorted_steps_is_stable() {
        let plan = ExecutionPlan::new(
            "o",
            vec![
                ExecutionStep::new("b", "1", 1),
                ExecutionStep::new("a", "2", 0),
                ExecutionStep::new("b", "3", 1),
            ],
        );
        let inputs: Vec<String> = plan.sorted_steps().into_iter().map(|s| s.input).collect();
        assert_eq!(inputs, vec!["2", "1", "3"]);
    }

    #[test]
    fn test_task_finish() {
        let mut task = TaskResult::start("o");
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.final_output(), "");
        task.finish(TaskStatus::Failed, Some("boom".into()));
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.ended_at.is_some());
        assert_eq!(task.status.to_string(), "failed");
    }
}
