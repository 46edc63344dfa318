//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEEFLOW__*` 覆盖（双下划线表示嵌套，如 `BEEFLOW__LLM__PROVIDER=openai`）。
//! 除 [app] / [llm] / [agent] 外，`[[flows]]` 描述可按名构建的 flow（step 引用注册表里的执行器 / 校验器类型）。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::core::{AgentError, Result};
use crate::flow::{Immutable, DEFAULT_MAX_RETRY_TIMES};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub flows: Vec<FlowDefinition>,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 额外的 flow 定义文件（每个文件顶层为若干 [[flows]]）
    #[serde(default)]
    pub flow_files: Vec<PathBuf>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmModelSection,
    #[serde(default)]
    pub openai: LlmModelSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmModelSection::default(),
            openai: LlmModelSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmModelSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// 规划方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    /// 有客户端时让 LLM 规划，失败回退枚举
    #[default]
    Llm,
    /// 直接按声明顺序枚举全部 flow
    Simple,
}

/// [agent] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub background: String,
    /// 可用 flow 名（按声明顺序）；为空时使用全部 [[flows]]
    #[serde(default)]
    pub flows: Vec<String>,
    #[serde(default)]
    pub planner: PlannerMode,
    /// 使用的客户端名，默认 "default"
    #[serde(default = "default_client_name")]
    pub client: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            role: String::new(),
            background: String::new(),
            flows: Vec::new(),
            planner: PlannerMode::default(),
            client: default_client_name(),
        }
    }
}

fn default_agent_name() -> String {
    "beeflow".to_string()
}

pub fn default_client_name() -> String {
    "default".to_string()
}

/// [[flows]]：一个可按名查找的 flow
#[derive(Debug, Clone, Deserialize)]
pub struct FlowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// flow 默认客户端名；未设置时使用 "default"（若已注册）
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

/// [[flows.steps]]
#[derive(Debug, Clone, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub name: Option<String>,
    /// 执行器类型（llm / command / set_variable / conditional / delay 或自定义注册的名称）
    pub executor: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub validator: Option<ValidatorDefinition>,
    #[serde(default = "default_max_retry_times")]
    pub max_retry_times: u32,
    #[serde(default)]
    pub immutable: Immutable,
}

fn default_max_retry_times() -> u32 {
    DEFAULT_MAX_RETRY_TIMES
}

/// 校验器定义：kind 为 regex / json 或自定义注册的名称
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorDefinition {
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

/// 单独的 flow 文件（flows/*.toml）：顶层为若干 [[flows]]
#[derive(Debug, Deserialize)]
struct FlowFile {
    #[serde(default)]
    flows: Vec<FlowDefinition>,
}

/// 从 config 目录加载配置，环境变量 BEEFLOW__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEEFLOW__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> std::result::Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEEFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 读取单独的 flow 定义文件
pub fn load_flow_file(path: impl AsRef<Path>) -> Result<Vec<FlowDefinition>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AgentError::ConfigError(format!("{}: {}", path.display(), e)))?;
    parse_flow_definitions(&raw)
}

/// 解析 TOML 文本中的 [[flows]]
pub fn parse_flow_definitions(raw: &str) -> Result<Vec<FlowDefinition>> {
    let file: FlowFile =
        toml::from_str(raw).map_err(|e| AgentError::ConfigError(e.to_string()))?;
    Ok(file.flows)
}
