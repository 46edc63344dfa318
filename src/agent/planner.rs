//! Planner：把 objective 拆成按序调用的 flow 列表
//!
//! 无 LLM 时按声明顺序枚举全部 flow；有 LLM 时以 JSON 模式请求计划，
//! 依次尝试：整段 JSON 数组 → 含 steps（或任意数组字段）的对象 → 首个 [...] 子串 → 去括号后按逗号切分。
//! 未知 flow 名丢弃；解析不出任何有效步骤或 LLM 调用失败时回退到枚举。

use std::sync::Arc;

use serde_json::Value;

use crate::agent::types::{ExecutionPlan, ExecutionStep};
use crate::core::{AgentError, FlowInfo, Result};
use crate::flow::extract_think;
use crate::llm::{ChatOptions, LlmClient, Message};
use crate::validators::json::strip_code_fence;

/// 后续步骤默认以上一步输出为输入
pub const PREVIOUS_OUTPUT: &str = "{{previous_output}}";

pub struct Planner {
    llm: Option<Arc<dyn LlmClient>>,
    role: String,
    background: String,
}

impl Planner {
    /// 枚举式规划
    pub fn simple() -> Self {
        Self {
            llm: None,
            role: String::new(),
            background: String::new(),
        }
    }

    pub fn with_llm(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm: Some(llm),
            ..Self::simple()
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    pub async fn plan(&self, objective: &str, flows: &[FlowInfo]) -> Result<ExecutionPlan> {
        let Some(llm) = self.llm.as_ref() else {
            return simple_plan(objective, flows);
        };
        if flows.is_empty() {
            return simple_plan(objective, flows);
        }

        let messages = [
            Message::system(self.system_prompt()),
            Message::user(build_prompt(objective, flows)),
        ];
        let raw = match llm.chat(&messages, &ChatOptions::json()).await {
            Ok((raw, info)) => {
                tracing::debug!(model = %info.model, "planner response received");
                raw
            }
            Err(e) => {
                tracing::warn!(objective, error = %e, "planner LLM call failed, falling back to simple plan");
                return simple_plan(objective, flows);
            }
        };

        let steps = parse_plan_output(&raw, objective, flows);
        if steps.is_empty() {
            tracing::warn!(objective, "planner output had no usable flows, falling back to simple plan");
            return simple_plan(objective, flows);
        }
        tracing::info!(objective, steps = steps.len(), "plan generated by LLM");
        Ok(ExecutionPlan::new(objective, steps))
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::from("You are a planning assistant that splits an objective into calls to named flows.");
        if !self.role.is_empty() {
            prompt.push_str(&format!("\nAgent role: {}", self.role));
        }
        if !self.background.is_empty() {
            prompt.push_str(&format!("\nBackground: {}", self.background));
        }
        prompt
    }
}

/// 每个可用 flow 一步，按声明顺序；首步输入为 objective
pub fn simple_plan(objective: &str, flows: &[FlowInfo]) -> Result<ExecutionPlan> {
    if flows.is_empty() {
        return Err(AgentError::InvalidPlan("no flows available".to_string()));
    }
    let steps = flows
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let input = if i == 0 { objective } else { PREVIOUS_OUTPUT };
            ExecutionStep::new(f.name.clone(), input, i).with_description(f.description.clone())
        })
        .collect();
    Ok(ExecutionPlan::new(objective, steps))
}

pub fn build_prompt(objective: &str, flows: &[FlowInfo]) -> String {
    let flow_list = flows
        .iter()
        .map(|f| {
            if f.description.is_empty() {
                format!("- {}", f.name)
            } else {
                format!("- {}: {}", f.name, f.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Objective: {objective}

Available flows:
{flow_list}

Choose the flows needed to reach the objective, in execution order. A flow may appear more than once.
Reply with JSON only, in this shape:
{{"steps": [{{"flow": "<flow name>", "input": "<optional input>", "description": "<why>"}}]}}
An input may use {{{{objective}}}}, {{{{previous_output}}}} or {{{{step_N_output}}}}. Omit it to use the previous step's output."#
    )
}

/// 解析 LLM 的计划输出，只保留已知 flow
pub fn parse_plan_output(raw: &str, objective: &str, flows: &[FlowInfo]) -> Vec<ExecutionStep> {
    let entries = parse_entries(&clean_output(raw));
    let mut steps = Vec::new();
    for entry in entries {
        let Some(info) = flows.iter().find(|f| f.name == entry.flow) else {
            tracing::debug!(flow = %entry.flow, "planner named an unknown flow, dropped");
            continue;
        };
        let order = steps.len();
        let input = match entry.input {
            Some(input) if !input.trim().is_empty() => input,
            _ if order == 0 => objective.to_string(),
            _ => PREVIOUS_OUTPUT.to_string(),
        };
        let description = entry.description.unwrap_or_else(|| info.description.clone());
        steps.push(ExecutionStep::new(info.name.clone(), input, order).with_description(description));
    }
    steps
}

#[derive(Debug, PartialEq)]
struct PlanEntry {
    flow: String,
    input: Option<String>,
    description: Option<String>,
}

/// 去掉 think 段与 ``` 代码块包裹
fn clean_output(raw: &str) -> String {
    let (text, _) = extract_think(raw);
    match text.find("```") {
        Some(start) => strip_code_fence(&text[start..]).to_string(),
        None => text.trim().to_string(),
    }
}

fn parse_entries(text: &str) -> Vec<PlanEntry> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        let entries = entries_from_value(&value);
        if !entries.is_empty() {
            return entries;
        }
    }

    // 每个 [ 起尝试读出一个完整 JSON 值，后面的文字不影响
    for (i, _) in text.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            let entries = entries_from_value(&value);
            if !entries.is_empty() {
                return entries;
            }
        }
    }

    let Some(start) = text.find('[') else {
        return split_names(text);
    };
    let body = &text[start + 1..];
    let body = body.find(']').map(|end| &body[..end]).unwrap_or(body);
    split_names(body)
}

fn entries_from_value(value: &Value) -> Vec<PlanEntry> {
    match value {
        Value::Array(items) => items.iter().filter_map(entry_from_item).collect(),
        Value::Object(map) => {
            if let Some(steps @ Value::Array(_)) = map.get("steps") {
                return entries_from_value(steps);
            }
            map.values()
                .find(|v| v.is_array())
                .map(entries_from_value)
                .unwrap_or_default()
        }
        _ => Vec::new(),
    }
}

fn entry_from_item(item: &Value) -> Option<PlanEntry> {
    match item {
        Value::String(name) => Some(PlanEntry {
            flow: name.trim().to_string(),
            input: None,
            description: None,
        }),
        Value::Object(map) => {
            let flow = map
                .get("flow")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str)?;
            let text_field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
            Some(PlanEntry {
                flow: flow.trim().to_string(),
                input: text_field("input"),
                description: text_field("description"),
            })
        }
        _ => None,
    }
}

fn split_names(body: &str) -> Vec<PlanEntry> {
    body.split(',')
        .map(|s| s.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`').trim())
        .filter(|s| !s.is_empty())
        .map(|s| PlanEntry {
            flow: s.to_string(),
            input: None,
            description: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn flows() -> Vec<FlowInfo> {
        vec![
            FlowInfo::new("research", "Collect facts"),
            FlowInfo::new("write", "Write the article"),
            FlowInfo::new("review", "Proofread"),
        ]
    }

    fn names(steps: &[ExecutionStep]) -> Vec<&str> {
        steps.iter().map(|s| s.flow.as_str()).collect()
    }

    #[test]
    fn test_simple_plan() {
        let plan = simple_plan("goal", &flows()).unwrap();
        assert_eq!(names(&plan.steps), vec!["research", "write", "review"]);
        assert!(plan.steps.iter().all(|s| s.retryable));
        assert_eq!(plan.steps[0].input, "goal");
        assert_eq!(plan.steps[1].input, PREVIOUS_OUTPUT);
        assert!(simple_plan("goal", &[]).is_err());
    }

    #[test]
    fn test_parse_string_array() {
        let steps = parse_plan_output(r#"["write", "review"]"#, "goal", &flows());
        assert_eq!(names(&steps), vec!["write", "review"]);
        assert_eq!(steps[0].input, "goal");
        assert_eq!(steps[1].input, PREVIOUS_OUTPUT);
        assert_eq!(steps[1].order, 1);
    }

    #[test]
    fn test_parse_object_with_steps() {
        let raw = r#"{"steps": [{"flow": "research", "input": "facts about {{objective}}"}, {"name": "write", "description": "draft it"}]}"#;
        let steps = parse_plan_output(raw, "goal", &flows());
        assert_eq!(names(&steps), vec!["research", "write"]);
        assert_eq!(steps[0].input, "facts about {{objective}}");
        assert_eq!(steps[1].description, "draft it");
        assert_eq!(steps[0].description, "Collect facts");
    }

    #[test]
    fn test_parse_object_with_any_array_field() {
        let steps = parse_plan_output(r#"{"plan": ["review"]}"#, "goal", &flows());
        assert_eq!(names(&steps), vec!["review"]);
    }

    #[test]
    fn test_parse_fenced_with_think() {
        let raw = "<think>pick two</think>\nHere you go:\n```json\n[\"research\", \"write\"]\n```";
        let steps = parse_plan_output(raw, "goal", &flows());
        assert_eq!(names(&steps), vec!["research", "write"]);
    }

    #[test]
    fn test_parse_embedded_array() {
        let steps = parse_plan_output("I suggest [\"write\"] only.", "goal", &flows());
        assert_eq!(names(&steps), vec!["write"]);
    }

    #[test]
    fn test_parse_comma_split() {
        let steps = parse_plan_output("[research, 'write', unknown]", "goal", &flows());
        assert_eq!(names(&steps), vec!["research", "write"]);
    }

    #[test]
    fn test_parse_first_array_ignores_later_brackets() {
        let steps = parse_plan_output(
            "Plan: [\"write\"]. (flows shown as [name])",
            "goal",
            &flows(),
        );
        assert_eq!(names(&steps), vec!["write"]);
    }

    #[tokio::test]
    async fn test_embedded_plan_is_authoritative() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "Use [\"review\"] then stop. Other options: [research, write]",
        ]));
        let plan = Planner::with_llm(llm).plan("goal", &flows()).await.unwrap();
        assert_eq!(names(&plan.steps), vec!["review"]);
    }

    #[test]
    fn test_unknown_names_dropped() {
        assert!(parse_plan_output(r#"["nope"]"#, "goal", &flows()).is_empty());
        assert!(parse_plan_output("", "goal", &flows()).is_empty());
    }

    #[tokio::test]
    async fn test_fallback_on_unusable_output() {
        for reply in ["", "no idea", r#"{"steps": []}"#, r#"["ghost"]"#] {
            let llm = Arc::new(MockLlmClient::with_responses([reply]));
            let plan = Planner::with_llm(llm).plan("goal", &flows()).await.unwrap();
            assert_eq!(plan.steps.len(), 3);
            assert!(plan.steps.iter().all(|s| s.retryable));
        }
    }

    #[tokio::test]
    async fn test_fallback_on_llm_error() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_error("503");
        let plan = Planner::with_llm(llm).plan("goal", &flows()).await.unwrap();
        assert_eq!(names(&plan.steps), vec!["research", "write", "review"]);
    }

    #[tokio::test]
    async fn test_llm_plan_uses_json_option() {
        let llm = Arc::new(MockLlmClient::with_responses([r#"["review"]"#]));
        let planner = Planner::with_llm(llm.clone()).role("editor");
        let plan = planner.plan("goal", &flows()).await.unwrap();
        assert_eq!(names(&plan.steps), vec!["review"]);

        let (messages, options) = llm.last_call().unwrap();
        assert!(options.json_format);
        assert!(messages[0].content.contains("editor"));
        assert!(messages[1].content.contains("- write: Write the article"));
    }
}
