use rhythmix_flow::{CheckpointStore, Workflow, WorkflowBuilder, WorkflowExecutor};
use std::sync::Arc;
use std::time::Duration;

use crate::genres::GenreCatalog;
use crate::index::SongIndex;
use crate::llm::LanguageModel;
use crate::state::SongState;
use crate::tasks::{
    ExtractAttributeVectorTask, FormatResponseTask, PredictAttributesTask, SimilaritySearchTask,
    PREDICT_ATTRIBUTES,
};

pub const RECOMMENDATION_WORKFLOW: &str = "song_recommendation";

/// predict → (pause for review) → extract → search → format
pub fn build_recommendation_workflow(
    model: Arc<dyn LanguageModel>,
    index: Arc<dyn SongIndex>,
    genres: GenreCatalog,
) -> rhythmix_flow::Result<Workflow<SongState>> {
    WorkflowBuilder::new(RECOMMENDATION_WORKFLOW)
        .add_step(Arc::new(PredictAttributesTask::new(model.clone(), genres)))
        .add_step(Arc::new(ExtractAttributeVectorTask))
        .add_step(Arc::new(SimilaritySearchTask::new(index)))
        .add_step(Arc::new(FormatResponseTask::new(model)))
        .interrupt_after(PREDICT_ATTRIBUTES)
        .build()
}

pub fn create_executor(
    workflow: Workflow<SongState>,
    store: Arc<dyn CheckpointStore>,
    checkpoint_ttl: Duration,
) -> WorkflowExecutor<SongState> {
    WorkflowExecutor::new(Arc::new(workflow), store).with_ttl(checkpoint_ttl)
}
