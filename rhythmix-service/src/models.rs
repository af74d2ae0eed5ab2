use serde::{Deserialize, Serialize};

use crate::state::SongState;

/// Number of numeric audio attributes, and so the query vector's dimension
pub const ATTRIBUTE_COUNT: usize = 12;

/// Order in which attributes are laid out in a query vector. The song index
/// was built with the same order.
pub const ATTRIBUTE_ORDER: [&str; ATTRIBUTE_COUNT] = [
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "time_signature",
];

/// The twelve numeric audio attributes of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongAttributes {
    pub danceability: f64,
    pub energy: f64,
    pub key: i32,
    pub loudness: f64,
    pub mode: i32,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub time_signature: i32,
}

impl SongAttributes {
    /// Flatten into a query vector following [`ATTRIBUTE_ORDER`]
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.danceability,
            self.energy,
            f64::from(self.key),
            self.loudness,
            f64::from(self.mode),
            self.speechiness,
            self.acousticness,
            self.instrumentalness,
            self.liveness,
            self.valence,
            self.tempo,
            f64::from(self.time_signature),
        ]
    }
}

/// A search hit from the song index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSong {
    pub track_name: String,
    pub track_artist: String,
    pub track_genre: String,
    pub track_link: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct PredictAttributesParams {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct SongRecommenderParams {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct PredictAttributesResponse {
    pub session_id: String,
    pub data: SongState,
}

#[derive(Debug, Serialize)]
pub struct SongRecommenderResponse {
    pub similar_songs: Vec<ScoredSong>,
    pub attributes: SongAttributes,
    pub llm_response: String,
}
