//! Agent 层：规划（Planner）、按计划执行 flow（AgentExecutor）、任务记忆（TaskMemory）、后台 Job
//!
//! Agent 持有角色 / 背景、可用 flow 名、LLM 客户端与共享的 Registry / TaskMemory；
//! `execute` 在当前任务中同步跑完，`start_job` 返回可 stop / resume 的 Job。

pub mod executor;
pub mod job;
pub mod memory;
pub mod planner;
pub mod types;

use std::sync::Arc;

use crate::config::{AgentSection, PlannerMode};
use crate::core::{AgentError, Registry, Result};
use crate::flow::{Context, Variables};
use crate::llm::LlmClient;

pub use executor::{substitute_placeholders, AgentExecutor, CANCELLED};
pub use job::{Job, JobStatus};
pub use memory::TaskMemory;
pub use planner::{build_prompt, parse_plan_output, simple_plan, Planner, PREVIOUS_OUTPUT};
pub use types::{ExecutionPlan, ExecutionStep, StepResult, TaskResult, TaskStatus};

use job::TaskRunner;

pub struct Agent {
    name: String,
    role: String,
    background: String,
    flows: Vec<String>,
    client: Option<Arc<dyn LlmClient>>,
    planner_mode: PlannerMode,
    registry: Arc<Registry>,
    memory: Arc<TaskMemory>,
}

impl Agent {
    pub fn new(name: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            name: name.into(),
            role: String::new(),
            background: String::new(),
            flows: Vec::new(),
            client: None,
            planner_mode: PlannerMode::default(),
            registry,
            memory: Arc::new(TaskMemory::new()),
        }
    }

    /// 按 [agent] 段构建；flows 为空时使用注册表里的全部 flow，客户端按名查找（找不到则留空）
    pub fn from_config(section: &AgentSection, registry: Arc<Registry>) -> Self {
        let flows = if section.flows.is_empty() {
            registry.flow_names()
        } else {
            section.flows.clone()
        };
        let client = registry.client(&section.client).ok();
        let mut agent = Self::new(section.name.clone(), registry)
            .role(section.role.clone())
            .background(section.background.clone())
            .flows(flows)
            .planner_mode(section.planner);
        agent.client = client;
        agent
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    pub fn flow(mut self, name: impl Into<String>) -> Self {
        self.flows.push(name.into());
        self
    }

    pub fn flows(mut self, names: Vec<String>) -> Self {
        self.flows = names;
        self
    }

    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn planner_mode(mut self, mode: PlannerMode) -> Self {
        self.planner_mode = mode;
        self
    }

    /// 多个 Agent 共享同一份任务记忆
    pub fn memory(mut self, memory: Arc<TaskMemory>) -> Self {
        self.memory = memory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flow_names(&self) -> &[String] {
        &self.flows
    }

    pub fn task_memory(&self) -> &Arc<TaskMemory> {
        &self.memory
    }

    pub fn task_history(&self) -> Vec<TaskResult> {
        self.memory.get_task_history()
    }

    fn planner(&self) -> Planner {
        match (&self.client, self.planner_mode) {
            (Some(client), PlannerMode::Llm) => Planner::with_llm(client.clone())
                .role(self.role.clone())
                .background(self.background.clone()),
            _ => Planner::simple(),
        }
    }

    fn runner(&self) -> TaskRunner {
        TaskRunner {
            registry: self.registry.clone(),
            memory: self.memory.clone(),
            planner: self.planner(),
            flows: self.flows.clone(),
        }
    }

    /// 创建 Job（尚未启动）；ctx.text 为 objective，ctx.variables 作为每个 plan step 的默认变量
    pub fn start_job(&self, ctx: Context) -> Result<Job> {
        if self.flows.is_empty() {
            return Err(AgentError::ConfigError(format!(
                "agent '{}' has no flows",
                self.name
            )));
        }
        if self.client.is_none() {
            return Err(AgentError::ClientNotFound(format!(
                "agent '{}' has no LLM client",
                self.name
            )));
        }
        self.registry.flow_infos(&self.flows)?;

        let job = Job::new(ctx.text, ctx.variables, Arc::new(self.runner()));
        tracing::info!(agent = %self.name, job = %job.id(), "job created");
        Ok(job)
    }

    /// 规划并执行 objective，直到完成或失败
    pub async fn execute(&self, objective: &str) -> Result<TaskResult> {
        tracing::info!(agent = %self.name, objective, "execute");
        self.runner().run(objective, &Variables::new(), None).await
    }
}
