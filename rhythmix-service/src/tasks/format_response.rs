use async_trait::async_trait;
use rhythmix_flow::{FlowError, Step};
use std::sync::Arc;
use tracing::info;

use super::prompts::{format_prompt, FORMAT_PREAMBLE};
use crate::llm::LanguageModel;
use crate::state::{SongState, SongStateUpdate};

pub const FORMAT_RESPONSE: &str = "format_response";

/// Returned verbatim when there is nothing to recommend
pub const NO_SONGS_FOUND: &str = "No songs found. Please try again.";

/// Step rendering the recommended songs as Markdown via the language model
pub struct FormatResponseTask {
    model: Arc<dyn LanguageModel>,
}

impl FormatResponseTask {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step<SongState> for FormatResponseTask {
    fn id(&self) -> &str {
        FORMAT_RESPONSE
    }

    async fn run(&self, state: &SongState) -> rhythmix_flow::Result<SongStateUpdate> {
        info!("Starting response formatting task");

        let songs = state.similar_songs.as_ref().ok_or_else(|| {
            FlowError::TaskExecutionFailed("similar_songs not found in state".into())
        })?;

        if songs.is_empty() {
            info!("No songs to format");
            return Ok(SongStateUpdate {
                llm_response: Some(NO_SONGS_FOUND.to_string()),
                ..Default::default()
            });
        }

        let songs_json = serde_json::to_string_pretty(songs)?;
        let formatted = self
            .model
            .complete(FORMAT_PREAMBLE, &format_prompt(&songs_json))
            .await
            .map_err(|e| FlowError::TaskExecutionFailed(format!("{e:#}")))?;

        Ok(SongStateUpdate {
            llm_response: Some(formatted.trim().to_string()),
            ..Default::default()
        })
    }
}
