//! 变量赋值执行器：把渲染后的值写入 variables，可选地把当前 text 存入某个变量

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::{AgentError, Result};
use crate::executors::{parse_params, Executor};
use crate::flow::{render, Context, Step};

#[derive(Debug, Default, Deserialize)]
struct SetVariableParams {
    #[serde(default)]
    assign: Map<String, Value>,
    #[serde(default)]
    from_text: Option<String>,
}

#[derive(Debug, Default)]
pub struct SetVariableExecutor {
    assignments: Vec<(String, Value)>,
    from_text: Option<String>,
}

impl SetVariableExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &Value) -> Result<Self> {
        let p: SetVariableParams = parse_params("set_variable", params)?;
        Ok(Self {
            assignments: p.assign.into_iter().collect(),
            from_text: p.from_text,
        })
    }

    /// 字符串值会先按上下文渲染
    pub fn assign(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((key.into(), value.into()));
        self
    }

    /// 把执行时的 text 存入该变量
    pub fn from_text(mut self, key: impl Into<String>) -> Self {
        self.from_text = Some(key.into());
        self
    }
}

#[async_trait]
impl Executor for SetVariableExecutor {
    fn name(&self) -> &str {
        "set_variable"
    }

    fn init(&mut self) -> Result<()> {
        if self.assignments.is_empty() && self.from_text.is_none() {
            return Err(AgentError::ConfigError(
                "set_variable executor has nothing to assign".to_string(),
            ));
        }
        Ok(())
    }

    async fn run(&self, mut ctx: Context, _step: &Step) -> Result<Context> {
        let rendered: Vec<(String, Value)> = self
            .assignments
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => Value::String(render(s, &ctx)),
                    other => other.clone(),
                };
                (k.clone(), value)
            })
            .collect();
        for (k, v) in rendered {
            ctx.set_variable(k, v);
        }
        if let Some(key) = &self.from_text {
            let text = ctx.text.clone();
            ctx.set_variable(key.clone(), text);
        }
        Ok(ctx)
    }
}
