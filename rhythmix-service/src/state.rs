use rhythmix_flow::{FlowError, WorkflowState};
use serde::{Deserialize, Serialize};

use crate::models::{ScoredSong, SongAttributes};

/// Everything one recommendation session knows, filled in step by step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongState {
    pub user_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artists_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danceability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speechiness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acousticness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumentalness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_vector: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar_songs: Option<Vec<ScoredSong>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_response: Option<String>,
}

/// Partial update to a [`SongState`]: set fields overwrite, unset fields are
/// left alone. Also the shape of a reviewer's correction, so unknown keys are
/// refused rather than silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SongStateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danceability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speechiness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acousticness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrumentalness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_vector: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_songs: Option<Vec<ScoredSong>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_response: Option<String>,
}

impl SongState {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Default::default()
        }
    }

    /// The twelve attributes, once every one of them is known
    pub fn attributes(&self) -> Option<SongAttributes> {
        Some(SongAttributes {
            danceability: self.danceability?,
            energy: self.energy?,
            key: self.key?,
            loudness: self.loudness?,
            mode: self.mode?,
            speechiness: self.speechiness?,
            acousticness: self.acousticness?,
            instrumentalness: self.instrumentalness?,
            liveness: self.liveness?,
            valence: self.valence?,
            tempo: self.tempo?,
            time_signature: self.time_signature?,
        })
    }

    /// Names of attributes not yet set
    pub fn missing_attributes(&self) -> Vec<&'static str> {
        let present = [
            self.danceability.is_some(),
            self.energy.is_some(),
            self.key.is_some(),
            self.loudness.is_some(),
            self.mode.is_some(),
            self.speechiness.is_some(),
            self.acousticness.is_some(),
            self.instrumentalness.is_some(),
            self.liveness.is_some(),
            self.valence.is_some(),
            self.tempo.is_some(),
            self.time_signature.is_some(),
        ];
        crate::models::ATTRIBUTE_ORDER
            .iter()
            .zip(present)
            .filter(|(_, set)| !set)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl SongStateUpdate {
    /// Update carrying a complete attribute set
    pub fn from_attributes(attributes: &SongAttributes) -> Self {
        Self {
            danceability: Some(attributes.danceability),
            energy: Some(attributes.energy),
            key: Some(attributes.key),
            loudness: Some(attributes.loudness),
            mode: Some(attributes.mode),
            speechiness: Some(attributes.speechiness),
            acousticness: Some(attributes.acousticness),
            instrumentalness: Some(attributes.instrumentalness),
            liveness: Some(attributes.liveness),
            valence: Some(attributes.valence),
            tempo: Some(attributes.tempo),
            time_signature: Some(attributes.time_signature),
            ..Default::default()
        }
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if let Some(value) = value {
        *slot = Some(value);
    }
}

fn check_unit_interval(name: &str, value: Option<f64>) -> rhythmix_flow::Result<()> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(FlowError::Validation(format!(
            "{name} should be between 0 and 1, got {v}"
        ))),
        _ => Ok(()),
    }
}

impl WorkflowState for SongState {
    type Update = SongStateUpdate;

    fn merge(&self, update: SongStateUpdate) -> Self {
        let mut next = self.clone();
        if let Some(user_query) = update.user_query {
            next.user_query = user_query;
        }
        overwrite(&mut next.track_name, update.track_name);
        overwrite(&mut next.genre, update.genre);
        overwrite(&mut next.artists_list, update.artists_list);
        overwrite(&mut next.danceability, update.danceability);
        overwrite(&mut next.energy, update.energy);
        overwrite(&mut next.key, update.key);
        overwrite(&mut next.loudness, update.loudness);
        overwrite(&mut next.mode, update.mode);
        overwrite(&mut next.speechiness, update.speechiness);
        overwrite(&mut next.acousticness, update.acousticness);
        overwrite(&mut next.instrumentalness, update.instrumentalness);
        overwrite(&mut next.liveness, update.liveness);
        overwrite(&mut next.valence, update.valence);
        overwrite(&mut next.tempo, update.tempo);
        overwrite(&mut next.time_signature, update.time_signature);
        overwrite(&mut next.query_vector, update.query_vector);
        overwrite(&mut next.similar_songs, update.similar_songs);
        overwrite(&mut next.llm_response, update.llm_response);
        next
    }

    fn validate_update(update: &SongStateUpdate) -> rhythmix_flow::Result<()> {
        check_unit_interval("danceability", update.danceability)?;
        check_unit_interval("energy", update.energy)?;
        check_unit_interval("speechiness", update.speechiness)?;
        check_unit_interval("acousticness", update.acousticness)?;
        check_unit_interval("instrumentalness", update.instrumentalness)?;
        check_unit_interval("liveness", update.liveness)?;
        check_unit_interval("valence", update.valence)?;

        if let Some(key) = update.key {
            if !(0..=11).contains(&key) {
                return Err(FlowError::Validation(format!(
                    "key should be between 0 and 11, got {key}"
                )));
            }
        }
        if let Some(mode) = update.mode {
            if mode != 0 && mode != 1 {
                return Err(FlowError::Validation(format!(
                    "mode should be 0 or 1, got {mode}"
                )));
            }
        }
        if let Some(tempo) = update.tempo {
            if tempo.is_nan() || tempo < 0.0 {
                return Err(FlowError::Validation(format!(
                    "tempo should be non-negative, got {tempo}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::calm_acoustic_attributes;
    use serde_json::json;

    fn predicted() -> SongState {
        SongState::new("a calm acoustic song").merge(SongStateUpdate {
            genre: Some("acoustic".into()),
            artists_list: Some(vec![]),
            ..SongStateUpdate::from_attributes(&calm_acoustic_attributes())
        })
    }

    #[test]
    fn merge_is_keywise() {
        let state = predicted();
        let corrected = state.merge(SongStateUpdate {
            danceability: Some(0.9),
            ..Default::default()
        });

        assert_eq!(corrected.danceability, Some(0.9));
        let mut expected = calm_acoustic_attributes();
        expected.danceability = 0.9;
        assert_eq!(corrected.attributes(), Some(expected));
        assert_eq!(corrected.genre.as_deref(), Some("acoustic"));
        assert_eq!(corrected.user_query, "a calm acoustic song");
    }

    #[test]
    fn attributes_require_every_field() {
        let mut state = predicted();
        assert!(state.missing_attributes().is_empty());

        state.tempo = None;
        state.key = None;
        assert_eq!(state.attributes(), None);
        assert_eq!(state.missing_attributes(), vec!["key", "tempo"]);
    }

    #[test]
    fn vector_follows_documented_order() {
        let vector = calm_acoustic_attributes().to_vector();
        assert_eq!(vector.len(), crate::models::ATTRIBUTE_COUNT);
        assert_eq!(vector[0], 0.3);
        assert_eq!(vector[2], 2.0);
        assert_eq!(vector[4], 1.0);
        assert_eq!(vector[10], 78.0);
        assert_eq!(vector[11], 4.0);
    }

    #[test]
    fn range_checks() {
        let ok = SongStateUpdate::from_attributes(&calm_acoustic_attributes());
        assert!(SongState::validate_update(&ok).is_ok());

        let cases = [
            SongStateUpdate {
                valence: Some(1.2),
                ..Default::default()
            },
            SongStateUpdate {
                energy: Some(-0.1),
                ..Default::default()
            },
            SongStateUpdate {
                key: Some(12),
                ..Default::default()
            },
            SongStateUpdate {
                mode: Some(2),
                ..Default::default()
            },
            SongStateUpdate {
                tempo: Some(-1.0),
                ..Default::default()
            },
        ];
        for case in cases {
            assert!(
                matches!(SongState::validate_update(&case), Err(FlowError::Validation(_))),
                "{case:?} should be rejected"
            );
        }
    }

    #[test]
    fn boundaries_are_inclusive() {
        let update = SongStateUpdate {
            danceability: Some(0.0),
            liveness: Some(1.0),
            key: Some(11),
            mode: Some(0),
            tempo: Some(0.0),
            loudness: Some(-60.0),
            ..Default::default()
        };
        assert!(SongState::validate_update(&update).is_ok());
    }

    #[test]
    fn corrections_reject_unknown_and_mistyped_keys() {
        assert!(serde_json::from_value::<SongStateUpdate>(json!({"dancability": 0.5})).is_err());
        assert!(serde_json::from_value::<SongStateUpdate>(json!({"key": 4.5})).is_err());

        let update: SongStateUpdate =
            serde_json::from_value(json!({"danceability": 0.9, "key": 7})).unwrap();
        assert_eq!(update.danceability, Some(0.9));
        assert_eq!(update.key, Some(7));
        assert_eq!(update.energy, None);
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let value = serde_json::to_value(SongState::new("q")).unwrap();
        assert_eq!(value, json!({"user_query": "q"}));
    }
}
