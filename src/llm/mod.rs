//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{ChatOptions, LlmClient, ResponseInfo};

use crate::config::LlmSection;

/// 按 [llm] 段与环境变量选择后端：provider = mock 时直接用 Mock；
/// 有 DeepSeek Key（或 provider = deepseek 且仅有 OpenAI Key）走 DeepSeek；有 OpenAI Key 走 OpenAI；否则 Mock
pub fn create_llm_from_config(llm: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (provider = mock)");
        return Arc::new(MockLlmClient::new());
    }

    let timeout = Duration::from_secs(llm.timeouts.request);
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)).with_timeout(timeout))
    } else if use_openai {
        let model = llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(
            OpenAiClient::new(
                llm.base_url.as_deref(),
                &model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            )
            .with_timeout(timeout),
        )
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}
