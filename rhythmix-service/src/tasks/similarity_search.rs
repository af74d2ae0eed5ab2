use async_trait::async_trait;
use rhythmix_flow::{FlowError, Step};
use std::sync::Arc;
use tracing::{info, warn};

use crate::index::{SongFilter, SongIndex};
use crate::models::{ScoredSong, ATTRIBUTE_COUNT};
use crate::state::{SongState, SongStateUpdate};

pub const SIMILARITY_SEARCH: &str = "similarity_search";

/// Maximum number of songs recommended per session
pub const SEARCH_LIMIT: usize = 5;

const NOT_AVAILABLE: &str = "N/A";

/// Step querying the song index with the attribute vector, narrowed by the
/// most specific thing the user asked for
pub struct SimilaritySearchTask {
    index: Arc<dyn SongIndex>,
}

impl SimilaritySearchTask {
    pub fn new(index: Arc<dyn SongIndex>) -> Self {
        Self { index }
    }
}

/// Track name beats artists beats genre
pub fn select_filter(state: &SongState) -> Option<SongFilter> {
    if let Some(name) = state.track_name.as_ref().filter(|name| !name.trim().is_empty()) {
        return Some(SongFilter::TrackName(name.clone()));
    }
    if let Some(artists) = state.artists_list.as_ref().filter(|artists| !artists.is_empty()) {
        return Some(SongFilter::AnyArtist(artists.clone()));
    }
    state.genre.clone().map(SongFilter::Genre)
}

/// Stand-in result echoing a requested track the index does not hold
fn requested_track(track_name: &str, state: &SongState) -> ScoredSong {
    let track_artist = match state.artists_list.as_deref() {
        Some(artists) if !artists.is_empty() => artists.join(", "),
        _ => NOT_AVAILABLE.to_string(),
    };
    ScoredSong {
        track_name: track_name.to_string(),
        track_artist,
        track_genre: state
            .genre
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        track_link: NOT_AVAILABLE.to_string(),
        score: 1.0,
    }
}

#[async_trait]
impl Step<SongState> for SimilaritySearchTask {
    fn id(&self) -> &str {
        SIMILARITY_SEARCH
    }

    async fn run(&self, state: &SongState) -> rhythmix_flow::Result<SongStateUpdate> {
        info!("Starting similarity search task");

        let vector = state.query_vector.as_ref().ok_or_else(|| {
            FlowError::TaskExecutionFailed("query_vector not found in state".into())
        })?;
        if vector.len() != ATTRIBUTE_COUNT {
            return Err(FlowError::TaskExecutionFailed(format!(
                "query_vector has {} dimensions, expected {}",
                vector.len(),
                ATTRIBUTE_COUNT
            )));
        }

        let filter = select_filter(state).ok_or_else(|| {
            FlowError::TaskExecutionFailed(
                "none of track_name, artists_list or genre found in state".into(),
            )
        })?;
        info!(filter = ?filter, "Searching song index");

        let mut songs = self
            .index
            .query(vector, &filter, SEARCH_LIMIT)
            .await
            .map_err(|e| FlowError::TaskExecutionFailed(format!("{e:#}")))?;
        songs.truncate(SEARCH_LIMIT);

        // Only a missed track name is echoed back; artist and genre misses
        // come back empty.
        if songs.is_empty() {
            if let SongFilter::TrackName(name) = &filter {
                warn!(track_name = %name, "Requested track not in index, echoing request");
                songs.push(requested_track(name, state));
            }
        }

        info!("Similarity search returned {} songs", songs.len());
        Ok(SongStateUpdate {
            similar_songs: Some(songs),
            ..Default::default()
        })
    }
}
