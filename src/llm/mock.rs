//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复；预设用完后回显最后一条 User 消息。记录调用次数与最近一次的消息 / 选项。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatOptions, LlmClient, Message, ResponseInfo, Role};

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(Vec<Message>, ChatOptions)>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::default();
        for r in responses {
            client.push_response(r);
        }
        client
    }

    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Ok(response.into()));
        }
    }

    /// 下一次调用返回错误
    pub fn push_error(&self, error: impl Into<String>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(Err(error.into()));
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 最近一次调用的消息与选项
    pub fn last_call(&self) -> Option<(Vec<Message>, ChatOptions)> {
        self.calls.lock().ok().and_then(|c| c.last().cloned())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<(String, ResponseInfo), String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((messages.to_vec(), options.clone()));
        }

        let scripted = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        let content = match scripted {
            Some(r) => r?,
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| matches!(m.role, Role::User))
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                format!("Echo from Mock: {}", last_user)
            }
        };

        let info = ResponseInfo {
            model: "mock".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            finish_reason: Some("stop".to_string()),
        };
        Ok((content, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockLlmClient::with_responses(["first"]);
        let msgs = vec![Message::user("hello")];
        let (a, _) = mock.chat(&msgs, &ChatOptions::default()).await.unwrap();
        let (b, info) = mock.chat(&msgs, &ChatOptions::json()).await.unwrap();
        assert_eq!(a, "first");
        assert_eq!(b, "Echo from Mock: hello");
        assert_eq!(info.model, "mock");
        assert_eq!(mock.call_count(), 2);
        assert!(mock.last_call().unwrap().1.json_format);
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let mock = MockLlmClient::new();
        mock.push_error("boom");
        let err = mock.chat(&[], &ChatOptions::default()).await.unwrap_err();
        assert_eq!(err, "boom");
    }
}
