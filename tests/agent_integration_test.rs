//! Agent 集成测试：规划 → 执行 → 任务记忆，以及 Job 的 stop / resume

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use beeflow::agent::{Agent, JobStatus, TaskStatus, CANCELLED};
    use beeflow::config::PlannerMode;
    use beeflow::core::Registry;
    use beeflow::executors::{DelayExecutor, LlmExecutor, SetVariableExecutor};
    use beeflow::flow::{Context, Flow, Step};
    use beeflow::llm::MockLlmClient;

    fn registry(llm: Arc<MockLlmClient>) -> Arc<Registry> {
        let registry = Arc::new(Registry::with_builtins());
        registry.register_client("default", llm.clone());

        registry.register_flow(
            Flow::builder("slow")
                .description("Waits, then passes the text on")
                .step(Step::new(DelayExecutor::from_millis(150)))
                .build()
                .unwrap(),
        );
        registry.register_flow(
            Flow::builder("shout")
                .description("Upper-cases via the LLM")
                .client(llm)
                .step(Step::new(LlmExecutor::new().prompt("SHOUT {{text}} in {{lang}}")))
                .build()
                .unwrap(),
        );
        registry.register_flow(
            Flow::builder("tag")
                .step(Step::new(SetVariableExecutor::new().assign("tagged", true)))
                .build()
                .unwrap(),
        );
        registry
    }

    #[tokio::test]
    async fn test_llm_plan_with_inputs_and_placeholders() {
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"steps": [{"flow": "tag"}, {"flow": "shout", "input": "{{objective}}!"}]}"#,
            "HELLO!",
        ]));
        let agent = Agent::new("t", registry(llm.clone()))
            .flows(vec!["slow".into(), "shout".into(), "tag".into()])
            .client(llm.clone());

        let task = agent.execute("hello").await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.steps.len(), 2);
        assert_eq!(task.steps[0].flow, "tag");
        assert_eq!(task.steps[1].input, "hello!");
        assert_eq!(task.final_output(), "HELLO!");

        let (messages, _) = llm.last_call().unwrap();
        assert_eq!(messages[0].content, "SHOUT hello! in {{lang}}");
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let llm = Arc::new(MockLlmClient::new());
        let agent = Agent::new("t", registry(llm.clone()))
            .flows(vec!["tag".into(), "shout".into()])
            .client(llm)
            .planner_mode(PlannerMode::Simple);

        let job = agent
            .start_job(Context::new("hi").with_variable("lang", "en"))
            .unwrap();
        assert_eq!(job.status(), JobStatus::Pending);

        job.execute().unwrap();
        assert!(job.execute().is_err());
        assert_eq!(job.wait().await, JobStatus::Completed);

        let task = job.result().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.final_output(), "Echo from Mock: SHOUT hi in en");
    }

    #[tokio::test]
    async fn test_job_stop_then_resume() {
        let llm = Arc::new(MockLlmClient::new());
        let agent = Agent::new("t", registry(llm.clone()))
            .flows(vec!["slow".into(), "tag".into()])
            .client(llm)
            .planner_mode(PlannerMode::Simple);

        let job = agent.start_job(Context::new("work")).unwrap();
        assert!(job.stop().is_err());
        assert!(job.resume().is_err());

        job.execute().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        job.stop().unwrap();
        assert_eq!(job.wait().await, JobStatus::Paused);

        let paused = job.result().unwrap();
        assert_eq!(paused.status, TaskStatus::Failed);
        assert_eq!(paused.error.as_deref(), Some(CANCELLED));
        assert_eq!(paused.steps.len(), 1);

        job.resume().unwrap();
        assert_eq!(job.wait().await, JobStatus::Completed);
        let done = job.result().unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.steps.len(), 2);
        assert_eq!(agent.task_history().len(), 1);
    }
}
