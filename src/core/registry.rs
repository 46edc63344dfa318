//! 名称注册表
//!
//! flow / LLM 客户端 / 执行器工厂 / 校验器工厂按名注册与查找；四张表放在同一把读写锁后面。
//! 显式创建并以 Arc 传给 Agent / AgentExecutor，不使用全局单例。

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{default_client_name, load_flow_file, AppConfig, FlowDefinition};
use crate::core::{AgentError, Result};
use crate::executors::{
    CommandExecutor, ConditionalExecutor, DelayExecutor, Executor, LlmExecutor,
    SetVariableExecutor,
};
use crate::flow::{build_flow, Flow};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::validators::{JsonValidator, RegexValidator, Validator};

/// 注册表中的 flow：同一实例被多个 job 共享时在此互斥
pub type FlowHandle = Arc<Mutex<Flow>>;

/// 执行器工厂：按 params 创建执行器，可回查注册表（如条件分发的子执行器、按名取客户端）
pub type ExecutorFactory =
    Arc<dyn Fn(&Registry, &Value) -> Result<Box<dyn Executor>> + Send + Sync>;

pub type ValidatorFactory = Arc<dyn Fn(&Value) -> Result<Box<dyn Validator>> + Send + Sync>;

/// 规划时展示的 flow 摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowInfo {
    pub name: String,
    pub description: String,
}

impl FlowInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

struct FlowEntry {
    handle: FlowHandle,
    description: String,
}

#[derive(Default)]
struct Tables {
    flows: HashMap<String, FlowEntry>,
    /// 注册顺序，flow_infos 按此输出
    flow_order: Vec<String>,
    clients: HashMap<String, Arc<dyn LlmClient>>,
    executors: HashMap<String, ExecutorFactory>,
    validators: HashMap<String, ValidatorFactory>,
}

#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预注册内置执行器（llm / command / set_variable / conditional / delay）与校验器（regex / json）
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_executor("llm", |reg, params| {
            Ok(Box::new(LlmExecutor::from_params(reg, params)?) as Box<dyn Executor>)
        });
        registry.register_executor("command", |_, params| {
            Ok(Box::new(CommandExecutor::from_params(params)?) as Box<dyn Executor>)
        });
        registry.register_executor("set_variable", |_, params| {
            Ok(Box::new(SetVariableExecutor::from_params(params)?) as Box<dyn Executor>)
        });
        registry.register_executor("conditional", |reg, params| {
            Ok(Box::new(ConditionalExecutor::from_params(reg, params)?) as Box<dyn Executor>)
        });
        registry.register_executor("delay", |_, params| {
            Ok(Box::new(DelayExecutor::from_params(params)?) as Box<dyn Executor>)
        });
        registry.register_validator("regex", |params| {
            Ok(Box::new(RegexValidator::from_params(params)?) as Box<dyn Validator>)
        });
        registry.register_validator("json", |_| {
            Ok(Box::new(JsonValidator) as Box<dyn Validator>)
        });
        registry
    }

    /// 按配置构建：内置工厂 + 默认客户端（名为 "default"）+ [[flows]] 与 flow_files 中的全部 flow
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let registry = Self::with_builtins();
        registry.register_client(default_client_name(), create_llm_from_config(&cfg.llm));

        let mut defs: Vec<FlowDefinition> = cfg.flows.clone();
        for path in &cfg.app.flow_files {
            defs.extend(load_flow_file(path)?);
        }
        for def in &defs {
            let flow = build_flow(def, &registry)?;
            tracing::info!(flow = %def.name, steps = def.steps.len(), "flow registered");
            registry.register_flow(flow);
        }
        Ok(registry)
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 注册 flow（同名覆盖），返回共享句柄
    pub fn register_flow(&self, flow: Flow) -> FlowHandle {
        let name = flow.name().to_string();
        let description = flow.description().to_string();
        let handle = Arc::new(Mutex::new(flow));
        let mut tables = self.write();
        if !tables.flows.contains_key(&name) {
            tables.flow_order.push(name.clone());
        }
        tables.flows.insert(
            name,
            FlowEntry {
                handle: handle.clone(),
                description,
            },
        );
        handle
    }

    pub fn flow(&self, name: &str) -> Result<FlowHandle> {
        self.read()
            .flows
            .get(name)
            .map(|e| e.handle.clone())
            .ok_or_else(|| AgentError::FlowNotFound(name.to_string()))
    }

    pub fn has_flow(&self, name: &str) -> bool {
        self.read().flows.contains_key(name)
    }

    /// 按注册顺序的 flow 名
    pub fn flow_names(&self) -> Vec<String> {
        self.read().flow_order.clone()
    }

    /// 按给定顺序取 flow 摘要；任一不存在即报错
    pub fn flow_infos(&self, names: &[String]) -> Result<Vec<FlowInfo>> {
        let tables = self.read();
        names
            .iter()
            .map(|name| {
                tables
                    .flows
                    .get(name)
                    .map(|e| FlowInfo::new(name.clone(), e.description.clone()))
                    .ok_or_else(|| AgentError::FlowNotFound(name.clone()))
            })
            .collect()
    }

    pub fn register_client(&self, name: impl Into<String>, client: Arc<dyn LlmClient>) {
        self.write().clients.insert(name.into(), client);
    }

    pub fn client(&self, name: &str) -> Result<Arc<dyn LlmClient>> {
        self.read()
            .clients
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::ClientNotFound(name.to_string()))
    }

    pub fn register_executor<F>(&self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Registry, &Value) -> Result<Box<dyn Executor>> + Send + Sync + 'static,
    {
        self.write().executors.insert(kind.into(), Arc::new(factory));
    }

    /// 按类型创建执行器；工厂在锁外调用，允许工厂递归查询注册表
    pub fn create_executor(&self, kind: &str, params: &Value) -> Result<Box<dyn Executor>> {
        let factory = self
            .read()
            .executors
            .get(kind)
            .cloned()
            .ok_or_else(|| AgentError::ExecutorNotFound(kind.to_string()))?;
        factory(self, params)
    }

    pub fn register_validator<F>(&self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Validator>> + Send + Sync + 'static,
    {
        self.write().validators.insert(kind.into(), Arc::new(factory));
    }

    pub fn create_validator(&self, kind: &str, params: &Value) -> Result<Box<dyn Validator>> {
        let factory = self
            .read()
            .validators
            .get(kind)
            .cloned()
            .ok_or_else(|| AgentError::ValidatorNotFound(kind.to_string()))?;
        factory(params)
    }

    pub fn executor_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.read().executors.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}
