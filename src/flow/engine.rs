//! Flow：有序 step 列表 + 跨多次运行保留的 flow 级变量
//!
//! run 时注入 flow 绑定、合并 flow 变量（调用方传入的优先），按声明顺序执行 step；
//! 每个 step 之后把上下文变量同步回 flow，并抽取输出首尾的 <think> 段。任一 step 失败即终止整个 run。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::{AgentError, Result};
use crate::flow::{extract_think, Context, FlowBinding, FlowBuilder, Step, Variables};
use crate::llm::LlmClient;

pub struct Flow {
    name: String,
    description: String,
    steps: Vec<Step>,
    client: Option<Arc<dyn LlmClient>>,
    variables: Variables,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            client: None,
            variables: Variables::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn client(&self) -> Option<Arc<dyn LlmClient>> {
        self.client.clone()
    }

    pub fn set_client(&mut self, client: Arc<dyn LlmClient>) {
        self.client = Some(client);
    }

    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// flow 级变量（跨运行累积）
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    /// 依次执行所有 step，返回最后一个 step 的上下文（无 step 时返回初始上下文）
    pub async fn run(&mut self, ctx: Context) -> Result<Context> {
        let mut ctx = ctx;
        ctx.flow = Some(FlowBinding {
            name: self.name.clone(),
            client: self.client.clone(),
        });
        ctx.merge_missing_variables(&self.variables);

        let started = Instant::now();
        tracing::info!(flow = %self.name, steps = self.steps.len(), "flow start");

        for (index, step) in self.steps.iter_mut().enumerate() {
            let step_name = step.name().to_string();
            ctx = step.run(ctx).await.map_err(|e| {
                tracing::warn!(flow = %self.name, step = %step_name, index, error = %e, "step failed");
                AgentError::StepFailed {
                    flow: self.name.clone(),
                    index,
                    step: step_name.clone(),
                    source: Box::new(e),
                }
            })?;

            for (k, v) in &ctx.variables {
                self.variables.insert(k.clone(), v.clone());
            }

            let (text, think) = extract_think(&ctx.text);
            if let Some(think) = think {
                ctx.text = text;
                ctx.think = think;
            }

            tracing::debug!(
                flow = %self.name,
                step = %step_name,
                runs = step.run_times(),
                "step done"
            );
        }

        tracing::info!(
            flow = %self.name,
            duration_ms = started.elapsed().as_millis() as u64,
            "flow done"
        );
        Ok(ctx)
    }
}
