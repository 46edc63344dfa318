//! 统一错误类型
//!
//! 配置错误（缺 client / flow / executor）、执行错误（executor 失败、重试耗尽、计划步骤失败）、
//! 规划错误与 Job 状态错误都归入 AgentError；外层按需包装上下文（哪个 flow / step / objective）。

use thiserror::Error;

/// 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Executor not found: {0}")]
    ExecutorNotFound(String),

    #[error("Validator not found: {0}")]
    ValidatorNotFound(String),

    #[error("Executor failed: {0}")]
    ExecutorFailed(String),

    /// Shell 命令未通过白名单 / 禁止子串检查
    #[error("Command rejected: {0}")]
    CommandRejected(String),

    #[error("retry times exceeded: step '{step}' ran {runs} times")]
    RetryTimesExceeded { step: String, runs: u32 },

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Flow 内某个 step 失败（包装 flow 名与 step 序号）
    #[error("flow '{flow}' step {index} ({step}) failed: {source}")]
    StepFailed {
        flow: String,
        index: usize,
        step: String,
        #[source]
        source: Box<AgentError>,
    },

    /// 执行计划中某一步失败（包装 objective 与 flow 名）
    #[error("objective '{objective}' step {index} (flow '{flow}') failed: {source}")]
    PlanStepFailed {
        objective: String,
        index: usize,
        flow: String,
        #[source]
        source: Box<AgentError>,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid job state: {0}")]
    InvalidJobState(String),
}

impl AgentError {
    /// 剥掉 StepFailed / PlanStepFailed 包装，返回最内层错误
    pub fn root(&self) -> &AgentError {
        match self {
            AgentError::StepFailed { source, .. } | AgentError::PlanStepFailed { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    pub fn is_retry_exceeded(&self) -> bool {
        matches!(self.root(), AgentError::RetryTimesExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
