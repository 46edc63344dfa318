//! 执行器：Step 实际要做的事（LLM 调用、Shell 命令、变量赋值、条件分发、延时）
//!
//! 所有执行器实现 Executor trait；Step 只依赖 init / run，不关心内部细节，原样传播返回的错误。

pub mod command;
pub mod conditional;
pub mod delay;
pub mod llm;
pub mod set_variable;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::{AgentError, Result};
use crate::flow::{Context, Step};

pub use command::CommandExecutor;
pub use conditional::{Condition, ConditionalExecutor};
pub use delay::DelayExecutor;
pub use llm::LlmExecutor;
pub use set_variable::SetVariableExecutor;

/// 执行器 trait
#[async_trait]
pub trait Executor: Send + Sync {
    /// 执行器类型名（用于日志与注册表）
    fn name(&self) -> &str;

    /// 构建 flow 时调用一次，可做参数校验
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// 执行一次：消费上下文，返回新的上下文
    async fn run(&self, ctx: Context, step: &Step) -> Result<Context>;
}

/// 解析执行器参数；params 为 null 时按空对象处理，让 serde 默认值生效
pub(crate) fn parse_params<T: DeserializeOwned>(kind: &str, params: &Value) -> Result<T> {
    let value = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(value)
        .map_err(|e| AgentError::ConfigError(format!("invalid params for '{}': {}", kind, e)))
}
