//! Job：在独立 tokio 任务中跑一次「规划 → 执行」
//!
//! 状态经 watch 通道发布：pending → running → completed | paused | failed。
//! stop 取消令牌，当前 plan step 跑完后停下（状态 paused）；resume 换新令牌并从头重新规划。

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::agent::executor::AgentExecutor;
use crate::agent::memory::TaskMemory;
use crate::agent::planner::Planner;
use crate::agent::types::{ExecutionPlan, TaskResult, TaskStatus};
use crate::core::{AgentError, Registry, Result};
use crate::flow::Variables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Paused,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Paused | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Paused => "paused",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 规划并执行一个 objective；Agent::execute 与 Job 共用
pub(crate) struct TaskRunner {
    pub(crate) registry: Arc<Registry>,
    pub(crate) memory: Arc<TaskMemory>,
    pub(crate) planner: Planner,
    pub(crate) flows: Vec<String>,
}

impl TaskRunner {
    pub(crate) async fn run(
        &self,
        objective: &str,
        variables: &Variables,
        cancel: Option<CancellationToken>,
    ) -> Result<TaskResult> {
        let mut plan = match self.prepare_plan(objective).await {
            Ok(plan) => plan,
            Err(e) => {
                let mut task = TaskResult::start(objective);
                task.finish(TaskStatus::Failed, Some(e.to_string()));
                self.memory.store_task(&task);
                return Err(e);
            }
        };
        for step in &mut plan.steps {
            for (k, v) in variables {
                step.variables.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        let mut executor = AgentExecutor::new(self.registry.clone(), self.memory.clone());
        if let Some(token) = cancel {
            executor = executor.with_cancellation(token);
        }
        executor.execute(&plan).await
    }

    async fn prepare_plan(&self, objective: &str) -> Result<ExecutionPlan> {
        let flows = self.registry.flow_infos(&self.flows)?;
        let plan = self.planner.plan(objective, &flows).await?;
        plan.validate(&flows)?;
        Ok(plan)
    }
}

pub struct Job {
    id: String,
    objective: String,
    variables: Variables,
    runner: Arc<TaskRunner>,
    status_tx: Arc<watch::Sender<JobStatus>>,
    status_rx: watch::Receiver<JobStatus>,
    cancel: Mutex<CancellationToken>,
}

impl Job {
    pub(crate) fn new(objective: String, variables: Variables, runner: Arc<TaskRunner>) -> Self {
        let (status_tx, status_rx) = watch::channel(JobStatus::Pending);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            objective,
            variables,
            runner,
            status_tx: Arc::new(status_tx),
            status_rx,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn status(&self) -> JobStatus {
        *self.status_rx.borrow()
    }

    /// 启动（仅 pending 状态可用）
    pub fn execute(&self) -> Result<()> {
        match self.status() {
            JobStatus::Pending => {
                self.spawn();
                Ok(())
            }
            other => Err(AgentError::InvalidJobState(format!(
                "job {} cannot start from {}",
                self.id, other
            ))),
        }
    }

    /// 请求暂停；正在运行的 plan step 不被打断
    pub fn stop(&self) -> Result<()> {
        match self.status() {
            JobStatus::Running => {
                self.current_token().cancel();
                tracing::info!(job = %self.id, "stop requested");
                Ok(())
            }
            other => Err(AgentError::InvalidJobState(format!(
                "job {} is not running ({})",
                self.id, other
            ))),
        }
    }

    /// 从 paused / failed 重新开始：新令牌，重新规划
    pub fn resume(&self) -> Result<()> {
        match self.status() {
            JobStatus::Paused | JobStatus::Failed => {
                *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = CancellationToken::new();
                tracing::info!(job = %self.id, "resuming");
                self.spawn();
                Ok(())
            }
            other => Err(AgentError::InvalidJobState(format!(
                "job {} cannot resume from {}",
                self.id, other
            ))),
        }
    }

    /// 等到本轮运行结束（completed / paused / failed）；尚未启动的 job 立即返回 Pending
    pub async fn wait(&self) -> JobStatus {
        if self.status() == JobStatus::Pending {
            return JobStatus::Pending;
        }
        let mut rx = self.status_rx.clone();
        let status = match rx.wait_for(|s| s.is_finished()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    /// 该 objective 在任务记忆中的最新结果
    pub fn result(&self) -> Option<TaskResult> {
        self.runner.memory.get_task(&self.objective)
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn spawn(&self) {
        self.status_tx.send_replace(JobStatus::Running);

        let id = self.id.clone();
        let objective = self.objective.clone();
        let variables = self.variables.clone();
        let runner = self.runner.clone();
        let status_tx = self.status_tx.clone();
        let token = self.current_token();

        tokio::spawn(async move {
            tracing::info!(job = %id, objective = %objective, "job running");
            let status = match runner.run(&objective, &variables, Some(token)).await {
                Ok(_) => JobStatus::Completed,
                Err(e) if matches!(e.root(), AgentError::Cancelled(_)) => JobStatus::Paused,
                Err(e) => {
                    tracing::warn!(job = %id, error = %e, "job failed");
                    JobStatus::Failed
                }
            };
            tracing::info!(job = %id, %status, "job finished");
            status_tx.send_replace(status);
        });
    }
}
