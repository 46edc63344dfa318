//! beeflow - LLM 工作流编排
//!
//! 模块划分：
//! - **agent**: 规划（Planner）、按计划执行 flow、任务记忆、后台 Job
//! - **config**: 应用配置加载（TOML + 环境变量）与 flow 定义
//! - **core**: 统一错误类型、名称注册表
//! - **executors**: 内置执行器（llm / command / set_variable / conditional / delay）
//! - **flow**: Context、Step 重试循环、Flow 引擎、模板渲染、think 抽取
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 日志初始化
//! - **validators**: 内置校验器（regex / json）

pub mod agent;
pub mod config;
pub mod core;
pub mod executors;
pub mod flow;
pub mod llm;
pub mod observability;
pub mod validators;

pub use agent::{Agent, Job, JobStatus, TaskResult, TaskStatus};
pub use core::{AgentError, Registry, Result};
pub use flow::{Context, Flow, FlowBuilder, Step};
