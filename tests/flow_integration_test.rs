//! Flow 集成测试：从 TOML 定义构建 flow，经 Mock LLM 跑完重试 / 校验 / 变量 / 条件分发

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use beeflow::config::parse_flow_definitions;
    use beeflow::core::{AgentError, Registry};
    use beeflow::flow::{build_flow, Context};
    use beeflow::llm::MockLlmClient;
    use serde_json::json;

    const FLOWS: &str = r#"
[[flows]]
name = "extract"
description = "Extract JSON"

[[flows.steps]]
executor = "llm"
params = { prompt = "Extract: {{text}}", json = true }
validator = { kind = "json" }
max_retry_times = 1

[[flows.steps]]
executor = "set_variable"
params = { from_text = "extracted", assign = { done = true } }
immutable = { text = true }

[[flows]]
name = "strict"

[[flows.steps]]
executor = "llm"
validator = { kind = "regex", params = { pattern = "^OK$" } }
max_retry_times = 0

[[flows]]
name = "route"
variables = { mode = "short" }

[[flows.steps]]
executor = "conditional"
params = { variable = "mode", equals = "short", then = { executor = "set_variable", params = { assign = { limit = 10 } } }, else = { executor = "set_variable", params = { assign = { limit = 100 } } } }
"#;

    fn registry_with(client: Arc<MockLlmClient>) -> Registry {
        let registry = Registry::with_builtins();
        registry.register_client("default", client);
        for def in parse_flow_definitions(FLOWS).unwrap() {
            registry.register_flow(build_flow(&def, &registry).unwrap());
        }
        registry
    }

    #[tokio::test]
    async fn test_validator_retry_then_accept() {
        let llm = Arc::new(MockLlmClient::with_responses([
            "sorry, no json here",
            "<think>try harder</think>```json\n{\"name\": \"bee\"}\n```",
        ]));
        let registry = registry_with(llm.clone());

        let handle = registry.flow("extract").unwrap();
        let out = handle.lock().await.run(Context::new("bee")).await.unwrap();

        assert_eq!(llm.call_count(), 2);
        assert_eq!(out.think, "try harder");
        assert_eq!(out.text, "```json\n{\"name\": \"bee\"}\n```");
        assert_eq!(out.variables["done"], json!(true));
        assert!(out.variables.contains_key("extracted"));
    }

    #[tokio::test]
    async fn test_retry_exhausted_surfaces_step_context() {
        let llm = Arc::new(MockLlmClient::with_responses(["nope", "still nope", "OK"]));
        let registry = registry_with(llm.clone());

        let handle = registry.flow("strict").unwrap();
        let err = handle
            .lock()
            .await
            .run(Context::new("say OK"))
            .await
            .unwrap_err();

        assert!(err.is_retry_exceeded());
        assert!(matches!(err, AgentError::StepFailed { ref flow, index: 0, .. } if flow == "strict"));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_conditional_uses_flow_variables() {
        let registry = registry_with(Arc::new(MockLlmClient::new()));
        let handle = registry.flow("route").unwrap();

        let out = handle.lock().await.run(Context::new("")).await.unwrap();
        assert_eq!(out.variables["limit"], json!(10));

        let out = handle
            .lock()
            .await
            .run(Context::new("").with_variable("mode", "long"))
            .await
            .unwrap();
        assert_eq!(out.variables["limit"], json!(100));
        assert_eq!(handle.lock().await.variables()["mode"], json!("long"));
    }

    #[tokio::test]
    async fn test_llm_step_without_client_fails() {
        let registry = Registry::with_builtins();
        let defs = parse_flow_definitions(FLOWS).unwrap();
        let mut flow = build_flow(&defs[1], &registry).unwrap();
        let err = flow.run(Context::new("x")).await.unwrap_err();
        assert!(matches!(err.root(), AgentError::ClientNotFound(_)));
    }
}
