//! Flow 引擎：上下文传递、step 重试 / 校验循环、不可变字段保护、think 段抽取

pub mod builder;
pub mod context;
pub mod engine;
pub mod step;
pub mod template;
pub mod think;

pub use builder::{build_flow, FlowBuilder};
pub use context::{Context, FlowBinding, Variables};
pub use engine::Flow;
pub use step::{Immutable, Step, DEFAULT_MAX_RETRY_TIMES};
pub use template::{render, value_to_text};
pub use think::extract_think;
