//! 延时执行器：sleep 指定毫秒，上下文原样返回

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::Result;
use crate::executors::{parse_params, Executor};
use crate::flow::{Context, Step};

#[derive(Debug, Deserialize)]
struct DelayParams {
    millis: u64,
}

#[derive(Debug, Clone)]
pub struct DelayExecutor {
    duration: Duration,
}

impl DelayExecutor {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn from_params(params: &Value) -> Result<Self> {
        let p: DelayParams = parse_params("delay", params)?;
        Ok(Self::from_millis(p.millis))
    }
}

#[async_trait]
impl Executor for DelayExecutor {
    fn name(&self) -> &str {
        "delay"
    }

    async fn run(&self, ctx: Context, step: &Step) -> Result<Context> {
        tracing::debug!(step = %step.name(), millis = self.duration.as_millis() as u64, "delay");
        tokio::time::sleep(self.duration).await;
        Ok(ctx)
    }
}
