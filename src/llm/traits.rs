//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient::chat：输入有序消息与少量选项，
//! 返回回复文本与 ResponseInfo（模型、token、结束原因）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::Message;

/// 单次 chat 调用选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// 要求模型输出 JSON（response_format = json_object）
    #[serde(default)]
    pub json_format: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Self::default()
        }
    }
}

/// chat 调用的附带信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub finish_reason: Option<String>,
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式 chat
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<(String, ResponseInfo), String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
