//! Stand-ins for the language model and song index used across unit tests.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::index::{SongFilter, SongIndex};
use crate::llm::LanguageModel;
use crate::models::{ScoredSong, SongAttributes};
use crate::tasks::prompts::ATTRIBUTE_PREAMBLE;

pub fn calm_acoustic_attributes() -> SongAttributes {
    SongAttributes {
        danceability: 0.3,
        energy: 0.25,
        key: 2,
        loudness: -14.0,
        mode: 1,
        speechiness: 0.04,
        acousticness: 0.85,
        instrumentalness: 0.1,
        liveness: 0.11,
        valence: 0.35,
        tempo: 78.0,
        time_signature: 4,
    }
}

/// Model output for "a calm acoustic song"
pub fn calm_acoustic_prediction() -> String {
    json!({
        "track_name": null,
        "genre": "acoustic",
        "artists": [],
        "danceability": 0.3,
        "energy": 0.25,
        "key": 2,
        "loudness": -14.0,
        "mode": 1,
        "speechiness": 0.04,
        "acousticness": 0.85,
        "instrumentalness": 0.1,
        "liveness": 0.11,
        "valence": 0.35,
        "tempo": 78,
        "time_signature": 4
    })
    .to_string()
}

pub fn song(name: &str, score: f64) -> ScoredSong {
    ScoredSong {
        track_name: name.to_string(),
        track_artist: "Jack Johnson".to_string(),
        track_genre: "acoustic".to_string(),
        track_link: format!("https://open.spotify.com/track/{}", name.replace(' ', "-")),
        score,
    }
}

/// Answers attribute prompts with `prediction` and everything else with
/// `formatted`, recording each call.
pub struct StubModel {
    prediction: String,
    formatted: String,
    fail: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubModel {
    pub fn new(prediction: impl Into<String>, formatted: impl Into<String>) -> Self {
        Self {
            prediction: prediction.into(),
            formatted: formatted.into(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("", "")
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, preamble: &str, prompt: &str) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((preamble.to_string(), prompt.to_string()));
        if self.fail {
            anyhow::bail!("model unavailable");
        }
        if preamble == ATTRIBUTE_PREAMBLE {
            Ok(self.prediction.clone())
        } else {
            Ok(self.formatted.clone())
        }
    }
}

/// Returns the same hits for every filter, recording the filters it saw.
/// A gated index holds each query until the gate is notified.
pub struct StubIndex {
    hits: Vec<ScoredSong>,
    fail: bool,
    gate: Option<Arc<Notify>>,
    queries: Mutex<Vec<SongFilter>>,
}

impl StubIndex {
    pub fn new(hits: Vec<ScoredSong>) -> Self {
        Self {
            hits,
            fail: false,
            gate: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(hits: Vec<ScoredSong>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(hits)
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn queries(&self) -> Vec<SongFilter> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SongIndex for StubIndex {
    async fn query(
        &self,
        _vector: &[f64],
        filter: &SongFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredSong>> {
        self.queries.lock().unwrap().push(filter.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            anyhow::bail!("index unavailable");
        }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}
