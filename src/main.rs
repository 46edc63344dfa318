//! beeflow 命令行入口
//!
//! 加载配置、构建注册表与 Agent，规划并执行 objective，打印每一步输出与最终状态。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use beeflow::agent::{Agent, TaskStatus};
use beeflow::config::load_config;
use beeflow::core::Registry;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "beeflow")]
#[command(version)]
#[command(about = "Plan an objective into flows and run them.", long_about = None)]
struct Args {
    /// 额外的配置文件（覆盖 config/default.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 要完成的目标
    #[arg(required = true)]
    objective: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    beeflow::observability::init();

    let args = Args::parse();
    let objective = args.objective.join(" ");
    let cfg = load_config(args.config).context("Failed to load config")?;
    let registry = Arc::new(Registry::from_config(&cfg).context("Failed to build registry")?);
    let agent = Agent::from_config(&cfg.agent, registry);

    let result = agent.execute(&objective).await;

    if let Some(task) = agent.task_memory().get_task(&objective) {
        for step in &task.steps {
            println!("[{}] {} ({} ms)", step.index, step.flow, step.duration_ms);
            println!("{}", step.output);
            println!();
        }
        println!("status: {}", task.status);
        if task.status != TaskStatus::Completed {
            if let Some(err) = &task.error {
                eprintln!("error: {}", err);
            }
        }
    }

    result.context("Task failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_config_and_objective() {
        let args = Args::try_parse_from(["beeflow", "-c", "local.toml", "write", "docs"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("local.toml")));
        assert_eq!(args.objective.join(" "), "write docs");
    }

    #[test]
    fn test_args_require_objective() {
        assert!(Args::try_parse_from(["beeflow"]).is_err());
        assert!(Args::try_parse_from(["beeflow", "--config", "local.toml"]).is_err());
    }
}
