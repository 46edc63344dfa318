//! LLM 执行器：渲染 system / prompt 模板后调用客户端，回复写入 text
//!
//! 客户端优先用执行器自己配置的（按名从注册表取），否则用所在 flow 的默认客户端。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{AgentError, Registry, Result};
use crate::executors::{parse_params, Executor};
use crate::flow::{render, Context, Step};
use crate::llm::{ChatOptions, LlmClient, Message};

#[derive(Debug, Deserialize)]
struct LlmParams {
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    system: Option<String>,
    #[serde(default = "default_prompt")]
    prompt: String,
    #[serde(default)]
    json: bool,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    output_variable: Option<String>,
}

fn default_prompt() -> String {
    "{{text}}".to_string()
}

pub struct LlmExecutor {
    client: Option<Arc<dyn LlmClient>>,
    system: Option<String>,
    prompt: String,
    options: ChatOptions,
    output_variable: Option<String>,
}

impl Default for LlmExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmExecutor {
    /// 默认 prompt 为 `{{text}}`，使用 flow 的客户端
    pub fn new() -> Self {
        Self {
            client: None,
            system: None,
            prompt: default_prompt(),
            options: ChatOptions::default(),
            output_variable: None,
        }
    }

    pub fn from_params(registry: &Registry, params: &Value) -> Result<Self> {
        let p: LlmParams = parse_params("llm", params)?;
        let client = p.client.as_deref().map(|name| registry.client(name)).transpose()?;
        Ok(Self {
            client,
            system: p.system,
            prompt: p.prompt,
            options: ChatOptions {
                json_format: p.json,
                temperature: p.temperature,
                max_tokens: p.max_tokens,
            },
            output_variable: p.output_variable,
        })
    }

    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn system(mut self, template: impl Into<String>) -> Self {
        self.system = Some(template.into());
        self
    }

    pub fn prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt = template.into();
        self
    }

    pub fn options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// 回复同时写入该变量
    pub fn output_variable(mut self, name: impl Into<String>) -> Self {
        self.output_variable = Some(name.into());
        self
    }

    fn build_messages(&self, ctx: &Context) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(Message::system(render(system, ctx)));
        }
        messages.push(Message::user(render(&self.prompt, ctx)).with_images(ctx.image_refs.clone()));
        messages
    }
}

#[async_trait]
impl Executor for LlmExecutor {
    fn name(&self) -> &str {
        "llm"
    }

    fn init(&mut self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(AgentError::ConfigError("llm executor prompt is empty".to_string()));
        }
        Ok(())
    }

    async fn run(&self, mut ctx: Context, step: &Step) -> Result<Context> {
        let client = self
            .client
            .clone()
            .or_else(|| ctx.flow_client())
            .ok_or_else(|| {
                AgentError::ClientNotFound(format!(
                    "no client for step '{}' in flow '{}'",
                    step.name(),
                    ctx.flow_name()
                ))
            })?;

        let messages = self.build_messages(&ctx);
        let (content, info) = client
            .chat(&messages, &self.options)
            .await
            .map_err(AgentError::LlmError)?;

        tracing::info!(
            flow = %ctx.flow_name(),
            step = %step.name(),
            model = %info.model,
            prompt_tokens = info.prompt_tokens,
            completion_tokens = info.completion_tokens,
            "llm step completed"
        );

        if let Some(var) = &self.output_variable {
            ctx.set_variable(var.clone(), content.clone());
        }
        ctx.text = content;
        Ok(ctx)
    }
}
