use async_trait::async_trait;
use rhythmix_flow::{FlowError, Step};
use tracing::info;

use crate::state::{SongState, SongStateUpdate};

pub const EXTRACT_ATTRIBUTE_VECTOR: &str = "extract_attribute_vector";

/// Lays the twelve attributes out as the index's query vector. No I/O.
pub struct ExtractAttributeVectorTask;

#[async_trait]
impl Step<SongState> for ExtractAttributeVectorTask {
    fn id(&self) -> &str {
        EXTRACT_ATTRIBUTE_VECTOR
    }

    async fn run(&self, state: &SongState) -> rhythmix_flow::Result<SongStateUpdate> {
        let attributes = state.attributes().ok_or_else(|| {
            FlowError::TaskExecutionFailed(format!(
                "attributes not found in state: {}",
                state.missing_attributes().join(", ")
            ))
        })?;

        let query_vector = attributes.to_vector();
        info!(dimension = query_vector.len(), "Query vector extracted");

        Ok(SongStateUpdate {
            query_vector: Some(query_vector),
            ..Default::default()
        })
    }
}
