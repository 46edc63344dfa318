//! 正则校验器：输出必须匹配给定模式

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{AgentError, Result};
use crate::flow::Step;
use crate::validators::Validator;

#[derive(Debug, Deserialize)]
struct RegexParams {
    pattern: String,
}

#[derive(Debug, Clone)]
pub struct RegexValidator {
    pattern: Regex,
}

impl RegexValidator {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| AgentError::ConfigError(format!("invalid regex '{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }

    pub fn from_params(params: &Value) -> Result<Self> {
        let p: RegexParams = serde_json::from_value(params.clone())
            .map_err(|e| AgentError::ConfigError(format!("invalid params for 'regex': {}", e)))?;
        Self::new(&p.pattern)
    }
}

impl Validator for RegexValidator {
    fn name(&self) -> &str {
        "regex"
    }

    fn validate(&self, output: &str, _step: &Step) -> bool {
        self.pattern.is_match(output)
    }
}
