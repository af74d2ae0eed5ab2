use async_trait::async_trait;
use rhythmix_flow::{FlowError, Step};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::prompts::{attribute_prompt, ATTRIBUTE_PREAMBLE};
use super::utils::strip_code_fence;
use crate::genres::GenreCatalog;
use crate::llm::LanguageModel;
use crate::models::SongAttributes;
use crate::state::{SongState, SongStateUpdate};

pub const PREDICT_ATTRIBUTES: &str = "predict_attributes";

/// What the model must answer with. Numeric ranges are checked when the
/// update is merged; types and the genre label are checked here.
#[derive(Debug, Deserialize)]
struct PredictedAttributes {
    #[serde(default)]
    track_name: Option<String>,
    genre: String,
    #[serde(default)]
    artists: Vec<String>,
    #[serde(flatten)]
    attributes: SongAttributes,
}

/// Step asking the language model to infer genre, artists and audio
/// attributes from the user's description
pub struct PredictAttributesTask {
    model: Arc<dyn LanguageModel>,
    genres: GenreCatalog,
}

impl PredictAttributesTask {
    pub fn new(model: Arc<dyn LanguageModel>, genres: GenreCatalog) -> Self {
        Self { model, genres }
    }

    fn parse(&self, raw: &str) -> rhythmix_flow::Result<SongStateUpdate> {
        let predicted: PredictedAttributes = serde_json::from_str(strip_code_fence(raw))
            .map_err(|e| {
                FlowError::Validation(format!(
                    "could not parse predicted attributes: {}. Raw response: {}",
                    e, raw
                ))
            })?;

        let genre = predicted.genre.trim().to_string();
        if !self.genres.contains(&genre) {
            return Err(FlowError::Validation(format!(
                "predicted genre '{}' is not a known genre",
                genre
            )));
        }

        let track_name = predicted
            .track_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let artists = predicted
            .artists
            .into_iter()
            .map(|artist| artist.trim().to_string())
            .filter(|artist| !artist.is_empty())
            .collect();

        Ok(SongStateUpdate {
            track_name,
            genre: Some(genre),
            artists_list: Some(artists),
            ..SongStateUpdate::from_attributes(&predicted.attributes)
        })
    }
}

#[async_trait]
impl Step<SongState> for PredictAttributesTask {
    fn id(&self) -> &str {
        PREDICT_ATTRIBUTES
    }

    async fn run(&self, state: &SongState) -> rhythmix_flow::Result<SongStateUpdate> {
        info!("Starting attribute prediction task");

        if state.user_query.trim().is_empty() {
            return Err(FlowError::TaskExecutionFailed(
                "user_query is empty".into(),
            ));
        }

        let prompt = attribute_prompt(&state.user_query, self.genres.labels());
        let raw = self
            .model
            .complete(ATTRIBUTE_PREAMBLE, &prompt)
            .await
            .map_err(|e| FlowError::TaskExecutionFailed(format!("{e:#}")))?;

        let update = self.parse(&raw)?;
        info!(
            genre = ?update.genre,
            track_name = ?update.track_name,
            "Attributes predicted"
        );
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{calm_acoustic_attributes, calm_acoustic_prediction, StubModel};
    use serde_json::json;

    fn task(model: StubModel) -> (Arc<StubModel>, PredictAttributesTask) {
        let model = Arc::new(model);
        let task = PredictAttributesTask::new(model.clone(), GenreCatalog::builtin());
        (model, task)
    }

    #[tokio::test]
    async fn parses_prediction_into_update() {
        let (model, task) = task(StubModel::new(calm_acoustic_prediction(), ""));

        let update = task
            .run(&SongState::new("a calm acoustic song"))
            .await
            .unwrap();

        assert_eq!(update.genre.as_deref(), Some("acoustic"));
        assert_eq!(update.artists_list, Some(vec![]));
        assert_eq!(update.track_name, None);
        assert_eq!(update.danceability, Some(0.3));
        assert_eq!(
            update,
            SongStateUpdate {
                genre: Some("acoustic".into()),
                artists_list: Some(vec![]),
                ..SongStateUpdate::from_attributes(&calm_acoustic_attributes())
            }
        );

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ATTRIBUTE_PREAMBLE);
        assert!(calls[0].1.contains("a calm acoustic song"));
    }

    #[tokio::test]
    async fn accepts_fenced_json_and_normalises_names() {
        let mut prediction: serde_json::Value =
            serde_json::from_str(&calm_acoustic_prediction()).unwrap();
        prediction["track_name"] = json!("  Holocene ");
        prediction["artists"] = json!(["Bon Iver", " "]);
        let fenced = format!("```json\n{prediction}\n```");
        let (_, task) = task(StubModel::new(fenced, ""));

        let update = task.run(&SongState::new("holocene")).await.unwrap();

        assert_eq!(update.track_name.as_deref(), Some("Holocene"));
        assert_eq!(update.artists_list, Some(vec!["Bon Iver".to_string()]));
    }

    #[tokio::test]
    async fn unknown_genre_is_a_validation_error() {
        let mut prediction: serde_json::Value =
            serde_json::from_str(&calm_acoustic_prediction()).unwrap();
        prediction["genre"] = json!("space-shanty");
        let (_, task) = task(StubModel::new(prediction.to_string(), ""));

        let err = task.run(&SongState::new("q")).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(msg) if msg.contains("space-shanty")));
    }

    #[tokio::test]
    async fn malformed_output_is_a_validation_error() {
        let (_, task) = task(StubModel::new("I think it's folk-ish?", ""));
        let err = task.run(&SongState::new("q")).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));

        let (_, task) = task_with_key(4.5);
        let err = task.run(&SongState::new("q")).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));
    }

    fn task_with_key(key: f64) -> (Arc<StubModel>, PredictAttributesTask) {
        let mut prediction: serde_json::Value =
            serde_json::from_str(&calm_acoustic_prediction()).unwrap();
        prediction["key"] = json!(key);
        task(StubModel::new(prediction.to_string(), ""))
    }

    #[tokio::test]
    async fn model_failure_is_a_task_failure() {
        let (_, task) = task(StubModel::failing());
        let err = task.run(&SongState::new("q")).await.unwrap_err();
        assert!(matches!(err, FlowError::TaskExecutionFailed(_)));
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_calling_model() {
        let (model, task) = task(StubModel::new(calm_acoustic_prediction(), ""));
        assert!(task.run(&SongState::new("   ")).await.is_err());
        assert!(model.calls().is_empty());
    }
}
