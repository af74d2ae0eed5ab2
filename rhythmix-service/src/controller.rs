use rhythmix_flow::{ExecutionStatus, FlowError, WorkflowExecutor};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::models::{ScoredSong, SongAttributes};
use crate::state::{SongState, SongStateUpdate};

/// A session paused for review of the predicted attributes
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSession {
    pub session_id: String,
    pub paused_state: SongState,
}

/// A finished session
#[derive(Debug, Clone, Serialize)]
pub struct CompletedSession {
    pub session_id: String,
    pub similar_songs: Vec<ScoredSong>,
    pub final_attributes: SongAttributes,
    pub llm_response: String,
}

/// Entry point for callers: opens sessions and resumes them with a
/// reviewer's correction. Only translates; the executor does the work.
#[derive(Clone)]
pub struct SessionController {
    executor: Arc<WorkflowExecutor<SongState>>,
}

/// Turn a caller-supplied JSON mapping into a typed correction
pub fn parse_correction(correction: Value) -> rhythmix_flow::Result<SongStateUpdate> {
    match correction {
        Value::Null => Ok(SongStateUpdate::default()),
        Value::Object(_) => serde_json::from_value(correction)
            .map_err(|e| FlowError::Validation(format!("invalid correction: {}", e))),
        other => Err(FlowError::Validation(format!(
            "correction must be a JSON object, got {}",
            other
        ))),
    }
}

impl SessionController {
    pub fn new(executor: Arc<WorkflowExecutor<SongState>>) -> Self {
        Self { executor }
    }

    pub async fn create_session(&self, query: &str) -> rhythmix_flow::Result<CreatedSession> {
        if query.trim().is_empty() {
            return Err(FlowError::Validation("query must not be empty".into()));
        }

        let result = self.executor.start(SongState::new(query)).await?;
        match result.status {
            ExecutionStatus::WaitingForInput { .. } => {
                info!(session_id = %result.session_id, "Attributes ready for review");
                Ok(CreatedSession {
                    session_id: result.session_id,
                    paused_state: result.state,
                })
            }
            ExecutionStatus::Completed => Err(FlowError::InvalidWorkflow(
                "recommendation workflow finished without pausing for review".into(),
            )),
        }
    }

    pub async fn resume_session(
        &self,
        session_id: &str,
        correction: Value,
    ) -> rhythmix_flow::Result<CompletedSession> {
        let correction = parse_correction(correction)?;
        let result = self.executor.resume(session_id, correction).await?;

        if !result.is_completed() {
            return Err(FlowError::InvalidWorkflow(format!(
                "session {} paused again: {:?}",
                session_id, result.status
            )));
        }

        let state = result.state;
        let final_attributes = state.attributes().ok_or_else(|| {
            FlowError::InvalidWorkflow(format!(
                "completed session {} lacks attributes: {}",
                session_id,
                state.missing_attributes().join(", ")
            ))
        })?;

        Ok(CompletedSession {
            session_id: result.session_id,
            similar_songs: state.similar_songs.unwrap_or_default(),
            final_attributes,
            llm_response: state.llm_response.unwrap_or_default(),
        })
    }
}
