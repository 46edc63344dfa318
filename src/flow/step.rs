//! Step：一个执行器 + 可选校验器的重试单元
//!
//! 执行前对标记为不可变的字段做快照，执行后用快照覆盖回去；校验失败时用新上下文重跑，
//! 直到 run_times > max_retry_times + 1 返回 RetryTimesExceeded。执行器报错不重试，直接返回。

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::core::{AgentError, Result};
use crate::executors::Executor;
use crate::flow::{Context, Variables};
use crate::validators::Validator;

pub const DEFAULT_MAX_RETRY_TIMES: u32 = 3;

/// 不可变标记：置位的字段在 step 执行后恢复为执行前的值
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Immutable {
    #[serde(default)]
    pub variables: bool,
    #[serde(default)]
    pub text: bool,
    #[serde(default)]
    pub memory: bool,
}

impl Immutable {
    pub fn all() -> Self {
        Self {
            variables: true,
            text: true,
            memory: true,
        }
    }
}

/// 执行前快照
struct Snapshot {
    variables: Option<Variables>,
    text: Option<String>,
    memory: Option<Value>,
}

impl Snapshot {
    fn take(ctx: &Context, flags: Immutable) -> Self {
        Self {
            variables: flags.variables.then(|| ctx.variables.clone()),
            text: flags.text.then(|| ctx.text.clone()),
            memory: flags.memory.then(|| ctx.memory.clone()),
        }
    }

    fn restore(self, ctx: &mut Context) {
        if let Some(v) = self.variables {
            ctx.variables = v;
        }
        if let Some(t) = self.text {
            ctx.text = t;
        }
        if let Some(m) = self.memory {
            ctx.memory = m;
        }
    }
}

pub struct Step {
    name: String,
    executor: Box<dyn Executor>,
    validator: Option<Box<dyn Validator>>,
    run_times: u32,
    max_retry_times: u32,
    immutable: Immutable,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("executor", &self.executor.name())
            .field("validator", &self.validator.as_ref().map(|v| v.name().to_string()))
            .field("run_times", &self.run_times)
            .field("max_retry_times", &self.max_retry_times)
            .field("immutable", &self.immutable)
            .finish()
    }
}

impl Step {
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self::from_boxed(Box::new(executor))
    }

    pub fn from_boxed(executor: Box<dyn Executor>) -> Self {
        Self {
            name: executor.name().to_string(),
            executor,
            validator: None,
            run_times: 0,
            max_retry_times: DEFAULT_MAX_RETRY_TIMES,
            immutable: Immutable::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_validator(self, validator: impl Validator + 'static) -> Self {
        self.with_boxed_validator(Box::new(validator))
    }

    pub fn with_boxed_validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn max_retry_times(mut self, times: u32) -> Self {
        self.max_retry_times = times;
        self
    }

    pub fn immutable(mut self, flags: Immutable) -> Self {
        self.immutable = flags;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 最近一次 run 中执行器被调用的次数
    pub fn run_times(&self) -> u32 {
        self.run_times
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retry_times
    }

    pub fn immutable_flags(&self) -> Immutable {
        self.immutable
    }

    /// 初始化执行器与校验器（构建 flow 时调用）
    pub fn init(&mut self) -> Result<()> {
        self.executor.init()?;
        if let Some(v) = self.validator.as_mut() {
            v.init()?;
        }
        Ok(())
    }

    /// 执行本 step；校验失败时用上一次的输出作为下一次的输入
    pub async fn run(&mut self, ctx: Context) -> Result<Context> {
        self.run_times = 0;
        let mut ctx = ctx;
        loop {
            self.run_times += 1;
            let snapshot = Snapshot::take(&ctx, self.immutable);

            tracing::debug!(step = %self.name, attempt = self.run_times, "step run");
            let mut output = self.executor.run(ctx, self).await?;
            snapshot.restore(&mut output);

            let Some(validator) = self.validator.as_ref() else {
                return Ok(output);
            };
            if validator.validate(&output.text, self) {
                return Ok(output);
            }

            tracing::warn!(
                step = %self.name,
                validator = validator.name(),
                attempt = self.run_times,
                "step output rejected by validator"
            );
            if self.run_times > self.max_retry_times + 1 {
                return Err(AgentError::RetryTimesExceeded {
                    step: self.name.clone(),
                    runs: self.run_times,
                });
            }
            ctx = output;
        }
    }
}
