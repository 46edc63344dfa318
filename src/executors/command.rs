//! Shell 命令执行器：白名单命令，禁止危险操作
//!
//! 命令模板先用上下文渲染；仅允许白名单内的命令名（首词），禁止 rm -rf、wget、chmod 777 等子串；
//! 通过 sh -c / cmd /C 执行，带超时，stdout 写入 text。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::core::{AgentError, Result};
use crate::executors::{parse_params, Executor};
use crate::flow::{render, Context, Step};

/// 禁止的命令/子串（即使白名单中有同名，也不允许带这些参数）
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "rm -r",
    "wget ",
    "curl | sh",
    "chmod 777",
    "chmod +s",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    ":(){ :|:& };:", // fork bomb
];

#[derive(Debug, Deserialize)]
struct CommandParams {
    command: String,
    #[serde(default = "default_allowed_commands")]
    allowed_commands: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default)]
    output_variable: Option<String>,
}

fn default_allowed_commands() -> Vec<String> {
    ["echo", "ls", "grep", "cat", "head", "tail", "wc", "find", "date"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    30
}

pub struct CommandExecutor {
    command: String,
    allowed_commands: HashSet<String>,
    timeout_secs: u64,
    output_variable: Option<String>,
}

impl CommandExecutor {
    /// 使用默认白名单
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_allowlist(command, default_allowed_commands(), default_timeout_secs())
    }

    pub fn with_allowlist(
        command: impl Into<String>,
        allowed_commands: Vec<String>,
        timeout_secs: u64,
    ) -> Self {
        let allowed_commands = allowed_commands
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            command: command.into(),
            allowed_commands,
            timeout_secs,
            output_variable: None,
        }
    }

    pub fn from_params(params: &Value) -> Result<Self> {
        let p: CommandParams = parse_params("command", params)?;
        let mut exec = Self::with_allowlist(p.command, p.allowed_commands, p.timeout_secs);
        exec.output_variable = p.output_variable;
        Ok(exec)
    }

    pub fn output_variable(mut self, name: impl Into<String>) -> Self {
        self.output_variable = Some(name.into());
        self
    }

    /// 解析命令：只取第一个 token 作为命令名
    fn command_name<'a>(&self, raw: &'a str) -> &'a str {
        raw.split_whitespace().next().unwrap_or("")
    }

    fn is_allowed(&self, raw: &str) -> Result<()> {
        let raw_lower = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTR {
            if raw_lower.contains(forbidden) {
                return Err(AgentError::CommandRejected(format!(
                    "forbidden pattern: {}",
                    forbidden
                )));
            }
        }
        let name = self.command_name(&raw_lower);
        if name.is_empty() {
            return Err(AgentError::CommandRejected("empty command".to_string()));
        }
        if self.allowed_commands.contains(name) {
            return Ok(());
        }
        Err(AgentError::CommandRejected(format!(
            "command '{}' not in allowlist",
            name
        )))
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    fn name(&self) -> &str {
        "command"
    }

    fn init(&mut self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(AgentError::ConfigError("command executor has no command".to_string()));
        }
        Ok(())
    }

    async fn run(&self, mut ctx: Context, step: &Step) -> Result<Context> {
        let command = render(&self.command, &ctx);
        let command = command.trim();
        self.is_allowed(command)?;

        tracing::info!(step = %step.name(), command = %command, "command execute");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| {
                AgentError::ExecutorFailed(format!(
                    "command timed out after {}s",
                    self.timeout_secs
                ))
            })?
            .map_err(|e| AgentError::ExecutorFailed(format!("execution failed: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(AgentError::ExecutorFailed(format!(
                "exit {:?}\nstderr: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(step = %step.name(), stderr = %stderr.trim(), "command stderr");
        }

        if let Some(var) = &self.output_variable {
            ctx.set_variable(var.clone(), stdout.clone());
        }
        ctx.text = stdout;
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allowlist_and_forbidden() {
        let exec = CommandExecutor::new("echo hi");
        assert!(exec.is_allowed("echo hi").is_ok());
        assert!(exec.is_allowed("ECHO hi").is_ok());
        assert!(matches!(
            exec.is_allowed("curl http://x"),
            Err(AgentError::CommandRejected(_))
        ));
        assert!(matches!(
            exec.is_allowed("ls; rm -rf /"),
            Err(AgentError::CommandRejected(_))
        ));
        assert!(matches!(exec.is_allowed("   "), Err(AgentError::CommandRejected(_))));
    }

    #[test]
    fn test_from_params_requires_command() {
        assert!(CommandExecutor::from_params(&json!({})).is_err());
        let exec = CommandExecutor::from_params(&json!({
            "command": "date",
            "allowed_commands": ["date"],
            "timeout_secs": 5
        }))
        .unwrap();
        assert_eq!(exec.timeout_secs, 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_rendered_command() {
        let mut step = Step::new(CommandExecutor::new("echo {{greeting}}").output_variable("out"));
        let ctx = Context::new("").with_variable("greeting", "hello");
        let out = step.run(ctx).await.unwrap();
        assert_eq!(out.text, "hello");
        assert_eq!(out.variables["out"], json!("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rejected_command_fails_step() {
        let mut step = Step::new(CommandExecutor::new("{{text}}"));
        let err = step.run(Context::new("wget http://evil")).await.unwrap_err();
        assert!(matches!(err, AgentError::CommandRejected(_)));
    }
}
