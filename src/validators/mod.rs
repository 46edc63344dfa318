//! 校验器：判断 step 的文本输出是否可接受，不通过则触发重试

pub mod json;
pub mod regex;

use crate::core::Result;
use crate::flow::Step;

pub use self::json::JsonValidator;
pub use self::regex::RegexValidator;

/// 校验器 trait：只回答是否通过，不解释原因
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn validate(&self, output: &str, step: &Step) -> bool;
}
