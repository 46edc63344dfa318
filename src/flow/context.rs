//! Flow 运行上下文
//!
//! 在 step 之间按值传递：text（输入/输出通道）、memory（任意结构化载荷，供模板渲染）、
//! variables（string -> JSON 值）、image_refs（多模态图片）、think（从 <think> 段抽出的推理内容），
//! 以及当前所在 flow 的绑定（名称 + 默认 LLM 客户端）。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::llm::LlmClient;

/// 变量表：值为 JSON（string / number / bool / array / object 等带标签的联合类型）
pub type Variables = HashMap<String, Value>;

/// 当前运行中的 flow：名称与默认客户端，由 Flow::run 注入
#[derive(Clone)]
pub struct FlowBinding {
    pub name: String,
    pub client: Option<Arc<dyn LlmClient>>,
}

impl fmt::Debug for FlowBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowBinding")
            .field("name", &self.name)
            .field("client", &self.client.as_ref().map(|_| "<dyn LlmClient>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    pub text: String,
    pub memory: Value,
    pub variables: Variables,
    pub image_refs: Vec<String>,
    pub think: String,
    pub flow: Option<FlowBinding>,
}

impl Context {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_memory(mut self, memory: Value) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.image_refs = images;
        self
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// 字符串变量；不存在或类型不符时返回默认值
    pub fn get_variable_string(&self, key: &str, default: &str) -> String {
        self.variables
            .get(key)
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_variable_i64(&self, key: &str, default: i64) -> i64 {
        self.variables
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    pub fn get_variable_f64(&self, key: &str, default: f64) -> f64 {
        self.variables
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    pub fn get_variable_bool(&self, key: &str, default: bool) -> bool {
        self.variables
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// 当前 flow 名（未绑定时为空串）
    pub fn flow_name(&self) -> &str {
        self.flow.as_ref().map(|f| f.name.as_str()).unwrap_or("")
    }

    /// 当前 flow 的默认客户端
    pub fn flow_client(&self) -> Option<Arc<dyn LlmClient>> {
        self.flow.as_ref().and_then(|f| f.client.clone())
    }

    /// 合并变量，已存在的 key 保留原值
    pub(crate) fn merge_missing_variables(&mut self, variables: &Variables) {
        for (k, v) in variables {
            self.variables.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}
