//! 条件分发执行器：按变量取值或 text 内容选择 then / else 子执行器
//!
//! 未配置 else 且条件不成立时，上下文原样通过。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{AgentError, Registry, Result};
use crate::executors::{parse_params, Executor};
use crate::flow::{Context, Step};

/// 分支条件
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// variables[variable] == value
    VariableEquals { variable: String, value: Value },
    /// text 包含子串
    TextContains(String),
}

impl Condition {
    pub fn evaluate(&self, ctx: &Context) -> bool {
        match self {
            Condition::VariableEquals { variable, value } => {
                ctx.get_variable(variable) == Some(value)
            }
            Condition::TextContains(needle) => ctx.text.contains(needle.as_str()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BranchParams {
    executor: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ConditionalParams {
    #[serde(default)]
    variable: Option<String>,
    #[serde(default)]
    equals: Value,
    #[serde(default)]
    text_contains: Option<String>,
    then: BranchParams,
    #[serde(default, rename = "else")]
    otherwise: Option<BranchParams>,
}

pub struct ConditionalExecutor {
    condition: Condition,
    then_branch: Box<dyn Executor>,
    else_branch: Option<Box<dyn Executor>>,
}

impl ConditionalExecutor {
    pub fn new(condition: Condition, then_branch: impl Executor + 'static) -> Self {
        Self {
            condition,
            then_branch: Box::new(then_branch),
            else_branch: None,
        }
    }

    pub fn otherwise(mut self, else_branch: impl Executor + 'static) -> Self {
        self.else_branch = Some(Box::new(else_branch));
        self
    }

    /// 子执行器按类型由注册表创建
    pub fn from_params(registry: &Registry, params: &Value) -> Result<Self> {
        let p: ConditionalParams = parse_params("conditional", params)?;
        let condition = match (p.variable, p.text_contains) {
            (Some(variable), _) => Condition::VariableEquals {
                variable,
                value: p.equals,
            },
            (None, Some(needle)) => Condition::TextContains(needle),
            (None, None) => {
                return Err(AgentError::ConfigError(
                    "conditional executor needs 'variable' or 'text_contains'".to_string(),
                ))
            }
        };
        let then_branch = registry.create_executor(&p.then.executor, &p.then.params)?;
        let else_branch = p
            .otherwise
            .map(|b| registry.create_executor(&b.executor, &b.params))
            .transpose()?;
        Ok(Self {
            condition,
            then_branch,
            else_branch,
        })
    }
}

#[async_trait]
impl Executor for ConditionalExecutor {
    fn name(&self) -> &str {
        "conditional"
    }

    fn init(&mut self) -> Result<()> {
        self.then_branch.init()?;
        if let Some(e) = self.else_branch.as_mut() {
            e.init()?;
        }
        Ok(())
    }

    async fn run(&self, ctx: Context, step: &Step) -> Result<Context> {
        let matched = self.condition.evaluate(&ctx);
        tracing::debug!(step = %step.name(), matched, "conditional dispatch");
        match (matched, &self.else_branch) {
            (true, _) => self.then_branch.run(ctx, step).await,
            (false, Some(e)) => e.run(ctx, step).await,
            (false, None) => Ok(ctx),
        }
    }
}
