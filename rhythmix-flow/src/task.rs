use async_trait::async_trait;

use crate::{context::WorkflowState, error::Result};

/// Core trait that all pipeline steps implement.
///
/// A step reads the current state and returns a partial update; it never
/// mutates the state itself. The executor validates and merges the update.
#[async_trait]
pub trait Step<S: WorkflowState>: Send + Sync {
    /// Unique name of this step within its workflow
    fn id(&self) -> &str;

    /// Compute this step's contribution from the given state
    async fn run(&self, state: &S) -> Result<S::Update>;
}
