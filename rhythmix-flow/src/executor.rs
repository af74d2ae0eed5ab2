//! WorkflowExecutor – runs a [`Workflow`] phase by phase, persisting a checkpoint at each
//! interrupt and resuming from it on a later call, possibly from another process.
//!
//! A session's life has two shapes of call:
//! * [`WorkflowExecutor::start`] runs from the first step up to (and including) the first
//!   interrupt step, writes a checkpoint and hands the paused state back.
//! * [`WorkflowExecutor::resume`] loads that checkpoint, merges the caller's correction, runs
//!   up to the next interrupt or the end, and commits with a revision-checked store operation.
//!
//! Nothing is written to the store until a phase has run all of its steps, so a failed or
//! cancelled phase leaves no visible change. Two racing resumes of one session can both run
//! their steps, but only the first to commit wins; the other gets [`FlowError::SessionBusy`].
//! A checkpoint that expires while its resume is running fails the commit with
//! [`FlowError::SessionNotFound`].

use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    context::{Context, WorkflowState},
    error::{FlowError, Phase, Result},
    storage::{Checkpoint, CheckpointStore, Position},
    workflow::Workflow,
};

/// How long a paused session stays resumable
pub const DEFAULT_CHECKPOINT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Paused after `after`; call resume to continue
    WaitingForInput { after: String },
    /// Every step ran; the checkpoint is gone
    Completed,
}

/// Outcome of one phase
#[derive(Debug, Clone)]
pub struct ExecutionResult<S> {
    pub session_id: String,
    pub status: ExecutionStatus,
    pub state: S,
}

impl<S> ExecutionResult<S> {
    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

/// Marks a session as having a phase in flight in this process.
struct InFlight<'a> {
    sessions: &'a DashMap<String, ()>,
    session_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.sessions.remove(&self.session_id);
    }
}

pub struct WorkflowExecutor<S: WorkflowState> {
    workflow: Arc<Workflow<S>>,
    store: Arc<dyn CheckpointStore>,
    ttl: Duration,
    in_flight: DashMap<String, ()>,
}

impl<S: WorkflowState> WorkflowExecutor<S> {
    pub fn new(workflow: Arc<Workflow<S>>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            workflow,
            store,
            ttl: DEFAULT_CHECKPOINT_TTL,
            in_flight: DashMap::new(),
        }
    }

    /// Override how long checkpoints written by this executor stay live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn workflow(&self) -> &Workflow<S> {
        &self.workflow
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a new session and run it up to its first interrupt.
    ///
    /// On failure no checkpoint exists and the session id is never reused.
    pub async fn start(&self, initial: S) -> Result<ExecutionResult<S>> {
        let session_id = Uuid::new_v4().to_string();
        let _in_flight = self.claim(&session_id)?;

        info!(
            session_id = %session_id,
            workflow = %self.workflow.id(),
            "Starting session"
        );

        let mut context = Context::new(initial);
        let stop = self
            .run_steps(Phase::Start, &session_id, 0, &mut context)
            .await?;

        let Some(index) = stop else {
            info!(session_id = %session_id, "Session completed without interrupt");
            return Ok(ExecutionResult {
                session_id,
                status: ExecutionStatus::Completed,
                state: context.into_inner(),
            });
        };

        let after = self.step_name(index);
        let state = serde_json::to_value(context.state())?;
        self.store
            .put(
                &session_id,
                self.workflow.id(),
                Position::AtInterrupt {
                    step: after.clone(),
                },
                state,
                self.ttl,
            )
            .await?;

        info!(session_id = %session_id, after = %after, "Session paused");
        Ok(ExecutionResult {
            session_id,
            status: ExecutionStatus::WaitingForInput { after },
            state: context.into_inner(),
        })
    }

    /// Continue a paused session after merging `correction` into its state.
    pub async fn resume(
        &self,
        session_id: &str,
        correction: S::Update,
    ) -> Result<ExecutionResult<S>> {
        let _in_flight = self.claim(session_id)?;

        let checkpoint = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;

        let Position::AtInterrupt { step: paused_after } = &checkpoint.position else {
            return Err(FlowError::SessionNotFound(session_id.to_string()));
        };
        if checkpoint.workflow_id != self.workflow.id() {
            return Err(FlowError::InvalidCheckpoint(format!(
                "session {} belongs to workflow '{}', not '{}'",
                session_id,
                checkpoint.workflow_id,
                self.workflow.id()
            )));
        }
        let paused_index = self.workflow.step_index(paused_after).ok_or_else(|| {
            FlowError::InvalidCheckpoint(format!(
                "session {} paused at unknown step '{}'",
                session_id, paused_after
            ))
        })?;

        let state: S = serde_json::from_value(checkpoint.state.clone())?;
        let mut context = Context::new(state);
        context.merge(correction)?;

        info!(
            session_id = %session_id,
            after = %paused_after,
            "Resuming session"
        );

        let stop = self
            .run_steps(Phase::Resume, session_id, paused_index + 1, &mut context)
            .await?;

        match stop {
            Some(index) => {
                let after = self.step_name(index);
                let state = serde_json::to_value(context.state())?;
                let swapped = self
                    .store
                    .compare_and_swap(
                        session_id,
                        checkpoint.revision,
                        Position::AtInterrupt {
                            step: after.clone(),
                        },
                        state,
                        self.ttl,
                    )
                    .await?;
                if swapped.is_none() {
                    return Err(self.failed_commit(&checkpoint).await);
                }

                info!(session_id = %session_id, after = %after, "Session paused");
                Ok(ExecutionResult {
                    session_id: session_id.to_string(),
                    status: ExecutionStatus::WaitingForInput { after },
                    state: context.into_inner(),
                })
            }
            None => {
                let deleted = self
                    .store
                    .compare_and_delete(session_id, checkpoint.revision)
                    .await?;
                if deleted.is_none() {
                    return Err(self.failed_commit(&checkpoint).await);
                }

                info!(session_id = %session_id, "Session completed");
                Ok(ExecutionResult {
                    session_id: session_id.to_string(),
                    status: ExecutionStatus::Completed,
                    state: context.into_inner(),
                })
            }
        }
    }

    /// Run steps from `from` until an interrupt step completes or the chain ends.
    /// Returns the index of the interrupt step, if one stopped the run.
    async fn run_steps(
        &self,
        phase: Phase,
        session_id: &str,
        from: usize,
        context: &mut Context<S>,
    ) -> Result<Option<usize>> {
        for (index, step) in self.workflow.steps().iter().enumerate().skip(from) {
            debug!(session_id = %session_id, step = %step.id(), %phase, "Running step");

            let update = step.run(context.state()).await.map_err(|e| {
                warn!(
                    session_id = %session_id,
                    step = %step.id(),
                    %phase,
                    error = %e,
                    "Step failed"
                );
                attribute_failure(phase, step.id(), e)
            })?;
            context.merge(update)?;

            if self.workflow.is_interrupt(index) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn claim(&self, session_id: &str) -> Result<InFlight<'_>> {
        match self.in_flight.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(FlowError::SessionBusy(session_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlight {
                    sessions: &self.in_flight,
                    session_id: session_id.to_string(),
                })
            }
        }
    }

    /// Explain why a revision-checked commit against `loaded` found nothing to replace.
    /// A checkpoint still live under another revision, or one removed by a competing
    /// resume, means the race was lost; one that ran out its TTL is gone for good.
    async fn failed_commit(&self, loaded: &Checkpoint) -> FlowError {
        let session_id = &loaded.session_id;
        let current = match self.store.get(session_id).await {
            Ok(current) => current,
            Err(e) => return e,
        };

        if current.is_none() && loaded.is_expired_at(Utc::now()) {
            warn!(session_id = %session_id, "Checkpoint expired during resume");
            return FlowError::SessionNotFound(session_id.clone());
        }
        warn!(session_id = %session_id, "Checkpoint changed underneath resume");
        FlowError::SessionBusy(session_id.clone())
    }

    fn step_name(&self, index: usize) -> String {
        self.workflow.steps()[index].id().to_string()
    }
}

/// Tag task failures with where they happened; everything else passes through.
fn attribute_failure(phase: Phase, step: &str, error: FlowError) -> FlowError {
    match error {
        FlowError::TaskExecutionFailed(message) => FlowError::StepExecution {
            phase,
            step: step.to_string(),
            message,
        },
        FlowError::Other(err) => FlowError::StepExecution {
            phase,
            step: step.to_string(),
            message: format!("{err:#}"),
        },
        other => other,
    }
}
