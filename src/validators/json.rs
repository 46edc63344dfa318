//! JSON 校验器：输出（去掉首尾 think 段与 ```json 代码块包裹后）必须是合法 JSON

use crate::flow::{extract_think, Step};
use crate::validators::Validator;

/// 去掉 ```json ... ``` 或 ``` ... ``` 包裹，返回内部文本
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.rfind("```")
        .map(|end| rest[..end].trim())
        .unwrap_or(rest.trim())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValidator;

impl Validator for JsonValidator {
    fn name(&self) -> &str {
        "json"
    }

    fn validate(&self, output: &str, _step: &Step) -> bool {
        let (text, _) = extract_think(output);
        serde_json::from_str::<serde_json::Value>(strip_code_fence(&text)).is_ok()
    }
}
