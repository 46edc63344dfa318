//! 核心层：统一错误类型与名称注册表

pub mod error;
pub mod registry;

pub use error::{AgentError, Result};
pub use registry::{ExecutorFactory, FlowHandle, FlowInfo, Registry, ValidatorFactory};
