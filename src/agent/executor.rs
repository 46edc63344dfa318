//! AgentExecutor：按计划依次运行 flow，串接步骤输出，记录任务结果
//!
//! 每一步之前检查取消令牌；任一步失败即终止（fail-fast），失败步骤不写入 StepResult。
//! 每次步骤状态变化都把当前 TaskResult 写入 TaskMemory。

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::Utc;
use regex::{Captures, Regex};
use tokio_util::sync::CancellationToken;

use crate::agent::memory::TaskMemory;
use crate::agent::types::{
    elapsed_ms, ExecutionPlan, ExecutionStep, StepResult, TaskResult, TaskStatus,
};
use crate::core::{AgentError, Registry, Result};
use crate::flow::Context;

/// 取消时写入 TaskResult.error 的固定值
pub const CANCELLED: &str = "cancelled";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{(previous_output|objective|step_(\d+)_output)\}\}")
            .expect("placeholder regex is valid")
    })
}

/// 替换 {{previous_output}} / {{step_N_output}}（从 1 计）/ {{objective}}；无法解析的保持原样
pub fn substitute_placeholders(template: &str, objective: &str, outputs: &[String]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            let resolved = match &caps[1] {
                "objective" => Some(objective),
                "previous_output" => outputs.last().map(String::as_str),
                _ => caps[2]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| outputs.get(i))
                    .map(String::as_str),
            };
            resolved.unwrap_or(&caps[0]).to_string()
        })
        .into_owned()
}

pub struct AgentExecutor {
    registry: Arc<Registry>,
    memory: Arc<TaskMemory>,
    cancel: Option<CancellationToken>,
}

impl AgentExecutor {
    pub fn new(registry: Arc<Registry>, memory: Arc<TaskMemory>) -> Self {
        Self {
            registry,
            memory,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn memory(&self) -> &Arc<TaskMemory> {
        &self.memory
    }

    pub async fn execute(&self, plan: &ExecutionPlan) -> Result<TaskResult> {
        let mut task = TaskResult::start(plan.objective.clone());
        self.memory.store_task(&task);

        let steps = plan.sorted_steps();
        tracing::info!(objective = %plan.objective, steps = steps.len(), "task start");

        for (i, step) in steps.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                tracing::warn!(objective = %plan.objective, index = i + 1, "task cancelled");
                task.finish(TaskStatus::Failed, Some(CANCELLED.to_string()));
                self.memory.store_task(&task);
                return Err(AgentError::Cancelled(plan.objective.clone()));
            }

            match self.run_step(i + 1, step, &plan.objective, &task).await {
                Ok(result) => {
                    task.steps.push(result);
                    self.memory.store_task(&task);
                }
                Err(e) => {
                    let err = AgentError::PlanStepFailed {
                        objective: plan.objective.clone(),
                        index: i + 1,
                        flow: step.flow.clone(),
                        source: Box::new(e),
                    };
                    tracing::warn!(objective = %plan.objective, error = %err, "task failed");
                    task.finish(TaskStatus::Failed, Some(err.to_string()));
                    self.memory.store_task(&task);
                    return Err(err);
                }
            }
        }

        task.finish(TaskStatus::Completed, None);
        self.memory.store_task(&task);
        tracing::info!(
            objective = %plan.objective,
            duration_ms = task.duration_ms,
            "task completed"
        );
        Ok(task)
    }

    async fn run_step(
        &self,
        index: usize,
        step: &ExecutionStep,
        objective: &str,
        task: &TaskResult,
    ) -> Result<StepResult> {
        let outputs: Vec<String> = task.steps.iter().map(|s| s.output.clone()).collect();
        let input = substitute_placeholders(&step.input, objective, &outputs);
        let handle = self.registry.flow(&step.flow)?;

        let started_at = Utc::now();
        let started = Instant::now();
        tracing::debug!(index, flow = %step.flow, "plan step start");

        let ctx = Context::new(input.clone()).with_variables(step.variables.clone());
        let out = {
            let mut flow = handle.lock().await;
            flow.run(ctx).await?
        };

        let ended_at = Utc::now();
        tracing::info!(
            index,
            flow = %step.flow,
            duration_ms = started.elapsed().as_millis() as u64,
            "plan step done"
        );
        Ok(StepResult {
            index,
            flow: step.flow.clone(),
            description: step.description.clone(),
            input,
            variables: out.variables,
            output: out.text,
            think: out.think,
            status: TaskStatus::Completed,
            started_at,
            ended_at,
            duration_ms: elapsed_ms(started_at, ended_at),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::executors::Executor;
    use crate::flow::{Flow, Step};

    struct Suffix(&'static str);

    #[async_trait]
    impl Executor for Suffix {
        fn name(&self) -> &str {
            "suffix"
        }

        async fn run(&self, mut ctx: Context, _step: &Step) -> Result<Context> {
            ctx.text.push_str(self.0);
            Ok(ctx)
        }
    }

    struct Boom;

    #[async_trait]
    impl Executor for Boom {
        fn name(&self) -> &str {
            "boom"
        }

        async fn run(&self, _ctx: Context, _step: &Step) -> Result<Context> {
            Err(AgentError::ExecutorFailed("boom".into()))
        }
    }

    struct Counter(Arc<AtomicUsize>);

    #[async_trait]
    impl Executor for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        async fn run(&self, ctx: Context, _step: &Step) -> Result<Context> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ctx)
        }
    }

    fn flow_with(name: &str, executor: impl Executor + 'static) -> Flow {
        let mut flow = Flow::new(name);
        flow.add_step(Step::new(executor));
        flow
    }

    #[test]
    fn test_substitute_placeholders() {
        let outputs = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            substitute_placeholders("{{step_1_output}} then {{previous_output}}", "o", &outputs),
            "a then b"
        );
        assert_eq!(substitute_placeholders("do {{objective}}", "it", &[]), "do it");
        assert_eq!(
            substitute_placeholders("{{step_3_output}} {{step_0_output}} {{previous_output}} {{other}}", "o", &[]),
            "{{step_3_output}} {{step_0_output}} {{previous_output}} {{other}}"
        );
    }

    #[tokio::test]
    async fn test_outputs_chain_between_steps() {
        let registry = Arc::new(Registry::new());
        registry.register_flow(flow_with("one", Suffix("+1")));
        registry.register_flow(flow_with("two", Suffix("+2")));

        let plan = ExecutionPlan::new(
            "start",
            vec![
                ExecutionStep::new("one", "{{objective}}", 0),
                ExecutionStep::new("two", "{{previous_output}}", 1),
                ExecutionStep::new("one", "{{step_1_output}}|{{step_2_output}}", 2),
            ],
        );
        let memory = Arc::new(TaskMemory::new());
        let task = AgentExecutor::new(registry, memory.clone())
            .execute(&plan)
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        let outputs: Vec<&str> = task.steps.iter().map(|s| s.output.as_str()).collect();
        assert_eq!(outputs, vec!["start+1", "start+1+2", "start+1|start+1+2+1"]);
        assert_eq!(task.steps[2].index, 3);
        assert_eq!(memory.get_task("start").unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_fail_fast() {
        let c_runs = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(Registry::new());
        registry.register_flow(flow_with("A", Suffix("ok")));
        registry.register_flow(flow_with("B", Boom));
        registry.register_flow(flow_with("C", Counter(c_runs.clone())));

        let plan = ExecutionPlan::new(
            "abc",
            vec![
                ExecutionStep::new("A", "x", 0),
                ExecutionStep::new("B", "{{previous_output}}", 1),
                ExecutionStep::new("C", "{{previous_output}}", 2),
            ],
        );
        let memory = Arc::new(TaskMemory::new());
        let err = AgentExecutor::new(registry, memory.clone())
            .execute(&plan)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::PlanStepFailed { index: 2, .. }));
        assert_eq!(c_runs.load(Ordering::SeqCst), 0);

        let task = memory.get_task("abc").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.steps.len(), 1);
        assert_eq!(task.steps[0].flow, "A");
        assert_eq!(task.steps[0].status, TaskStatus::Completed);
        assert!(task.error.is_some());
        assert!(task.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_flow_is_fatal() {
        let registry = Arc::new(Registry::new());
        let plan = ExecutionPlan::new("o", vec![ExecutionStep::new("ghost", "x", 0)]);
        let err = AgentExecutor::new(registry, Arc::new(TaskMemory::new()))
            .execute(&plan)
            .await
            .unwrap_err();
        assert!(matches!(err.root(), AgentError::FlowNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let registry = Arc::new(Registry::new());
        registry.register_flow(flow_with("A", Suffix("ok")));
        let token = CancellationToken::new();
        token.cancel();

        let memory = Arc::new(TaskMemory::new());
        let plan = ExecutionPlan::new("o", vec![ExecutionStep::new("A", "x", 0)]);
        let err = AgentExecutor::new(registry, memory.clone())
            .with_cancellation(token)
            .execute(&plan)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Cancelled(_)));
        let task = memory.get_task("o").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some(CANCELLED));
        assert!(task.steps.is_empty());
    }
}
