pub mod context;
pub mod error;
pub mod executor;
pub mod storage;
pub mod storage_postgres;
pub mod task;
pub mod workflow;

// Re-export commonly used types
pub use context::{Context, WorkflowState};
pub use error::{FlowError, Phase, Result};
pub use executor::{DEFAULT_CHECKPOINT_TTL, ExecutionResult, ExecutionStatus, WorkflowExecutor};
pub use storage::{Checkpoint, CheckpointStore, InMemoryCheckpointStore, Position};
pub use storage_postgres::PostgresCheckpointStore;
pub use task::Step;
pub use workflow::{Workflow, WorkflowBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct Greeting {
        name: String,
        greeting: Option<String>,
        shout: Option<String>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    struct GreetingUpdate {
        name: Option<String>,
        greeting: Option<String>,
        shout: Option<String>,
    }

    impl WorkflowState for Greeting {
        type Update = GreetingUpdate;

        fn merge(&self, update: GreetingUpdate) -> Self {
            Greeting {
                name: update.name.unwrap_or_else(|| self.name.clone()),
                greeting: update.greeting.or_else(|| self.greeting.clone()),
                shout: update.shout.or_else(|| self.shout.clone()),
            }
        }
    }

    struct HelloStep;

    #[async_trait]
    impl Step<Greeting> for HelloStep {
        fn id(&self) -> &str {
            "hello"
        }

        async fn run(&self, state: &Greeting) -> Result<GreetingUpdate> {
            Ok(GreetingUpdate {
                greeting: Some(format!("Hello, {}", state.name)),
                ..Default::default()
            })
        }
    }

    struct ShoutStep;

    #[async_trait]
    impl Step<Greeting> for ShoutStep {
        fn id(&self) -> &str {
            "shout"
        }

        async fn run(&self, state: &Greeting) -> Result<GreetingUpdate> {
            let greeting = state.greeting.clone().ok_or_else(|| {
                FlowError::TaskExecutionFailed("greeting not found in state".into())
            })?;
            Ok(GreetingUpdate {
                shout: Some(format!("{} !!!", greeting.to_uppercase())),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_pause_correct_resume() {
        let workflow = WorkflowBuilder::new("greeting")
            .add_step(Arc::new(HelloStep))
            .add_step(Arc::new(ShoutStep))
            .interrupt_after("hello")
            .build()
            .unwrap();
        let executor = WorkflowExecutor::new(
            Arc::new(workflow),
            Arc::new(InMemoryCheckpointStore::new()),
        );

        let paused = executor
            .start(Greeting {
                name: "Batman".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paused.state.greeting.as_deref(), Some("Hello, Batman"));

        let done = executor
            .resume(
                &paused.session_id,
                GreetingUpdate {
                    greeting: Some("Hi, Robin".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(done.is_completed());
        assert_eq!(done.state.shout.as_deref(), Some("HI, ROBIN !!!"));
        assert_eq!(done.state.name, "Batman");
    }
}
