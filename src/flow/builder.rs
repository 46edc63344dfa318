//! Flow 构建器
//!
//! 提供流畅的 API 构建 Flow，也可以从配置里的 FlowDefinition 按注册表解析执行器 / 校验器 / 客户端。

use std::sync::Arc;

use serde_json::Value;

use crate::config::{default_client_name, FlowDefinition};
use crate::core::{AgentError, Registry, Result};
use crate::flow::{Flow, Step, Variables};
use crate::llm::LlmClient;

/// Flow 构建器
pub struct FlowBuilder {
    name: String,
    description: String,
    client: Option<Arc<dyn LlmClient>>,
    variables: Variables,
    steps: Vec<Step>,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            client: None,
            variables: Variables::new(),
            steps: Vec::new(),
        }
    }

    /// 设置描述（规划时展示给 LLM）
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// 设置默认 LLM 客户端
    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// 设置初始 flow 变量
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// 追加 step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// 从配置定义构建：客户端按名解析（未指定时尝试 "default"），执行器 / 校验器按类型由注册表创建
    pub fn from_definition(def: &FlowDefinition, registry: &Registry) -> Result<Self> {
        let mut builder = Self::new(def.name.clone()).description(def.description.clone());

        match &def.client {
            Some(name) => builder = builder.client(registry.client(name)?),
            None => {
                if let Ok(client) = registry.client(&default_client_name()) {
                    builder = builder.client(client);
                }
            }
        }

        for (k, v) in &def.variables {
            builder = builder.variable(k.clone(), v.clone());
        }

        for (i, step_def) in def.steps.iter().enumerate() {
            let executor = registry.create_executor(&step_def.executor, &step_def.params)?;
            let mut step = Step::from_boxed(executor)
                .max_retry_times(step_def.max_retry_times)
                .immutable(step_def.immutable);
            step = match &step_def.name {
                Some(name) => step.named(name.clone()),
                None => step.named(format!("{}#{}", step_def.executor, i + 1)),
            };
            if let Some(v) = &step_def.validator {
                step = step.with_boxed_validator(registry.create_validator(&v.kind, &v.params)?);
            }
            builder = builder.step(step);
        }

        Ok(builder)
    }

    /// 构建 flow：名称不能为空；每个 step 的执行器 / 校验器在此 init
    pub fn build(self) -> Result<Flow> {
        if self.name.trim().is_empty() {
            return Err(AgentError::ConfigError("flow name is required".to_string()));
        }

        let mut flow = Flow::new(self.name);
        flow.set_description(self.description);
        if let Some(client) = self.client {
            flow.set_client(client);
        }
        for (k, v) in self.variables {
            flow.set_variable(k, v);
        }
        for mut step in self.steps {
            step.init()?;
            flow.add_step(step);
        }
        Ok(flow)
    }
}

/// 按配置定义直接构建 flow
pub fn build_flow(def: &FlowDefinition, registry: &Registry) -> Result<Flow> {
    FlowBuilder::from_definition(def, registry)?.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::parse_flow_definitions;
    use crate::executors::DelayExecutor;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_build_simple_flow() {
        let flow = FlowBuilder::new("wait")
            .description("Wait a little")
            .variable("k", 1)
            .step(Step::new(DelayExecutor::from_millis(1)))
            .build()
            .expect("Failed to build flow");

        assert_eq!(flow.name(), "wait");
        assert_eq!(flow.description(), "Wait a little");
        assert_eq!(flow.steps().len(), 1);
        assert_eq!(flow.variables()["k"], json!(1));
    }

    #[test]
    fn test_build_without_name_fails() {
        let result = FlowBuilder::new("  ").build();
        assert!(matches!(result, Err(AgentError::ConfigError(_))));
    }

    #[test]
    fn test_from_definition() {
        let defs = parse_flow_definitions(
            r#"
[[flows]]
name = "classify"
description = "Classify input"

[[flows.steps]]
executor = "llm"
params = { prompt = "Classify: {{text}}", json = true }
validator = { kind = "json" }
max_retry_times = 1

[[flows.steps]]
name = "remember"
executor = "set_variable"
params = { from_text = "label" }
"#,
        )
        .unwrap();

        let registry = Registry::with_builtins();
        registry.register_client("default", Arc::new(MockLlmClient::new()));

        let flow = build_flow(&defs[0], &registry).unwrap();

        assert!(flow.client().is_some());
        assert_eq!(flow.steps().len(), 2);
        assert_eq!(flow.steps()[0].name(), "llm#1");
        assert_eq!(flow.steps()[0].max_retries(), 1);
        assert_eq!(flow.steps()[1].name(), "remember");
    }

    #[test]
    fn test_from_definition_unknown_executor() {
        let defs = parse_flow_definitions(
            r#"
[[flows]]
name = "bad"

[[flows.steps]]
executor = "teleport"
"#,
        )
        .unwrap();

        let registry = Registry::with_builtins();
        let err = FlowBuilder::from_definition(&defs[0], &registry).err().unwrap();
        assert!(matches!(err, AgentError::ExecutorNotFound(name) if name == "teleport"));
    }
}
