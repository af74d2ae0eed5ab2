/// System prompt for attribute prediction
pub const ATTRIBUTE_PREAMBLE: &str = r#"You are a music analyst.
You turn free-text song descriptions into Spotify-style audio features.
You always answer with a single JSON object and nothing else."#;

/// System prompt for turning search hits into a readable answer
pub const FORMAT_PREAMBLE: &str = r#"You are a music assistant that presents song recommendations as
clean Markdown. You only use the data you are given."#;

pub fn attribute_prompt(song_description: &str, genres: &[String]) -> String {
    let genres = genres.join(", ");
    format!(
        r#"
Describe the song below as a JSON object with exactly these keys:
  "track_name"       string or null; only if the description names a specific song
  "genre"            string; must be one of: {genres}
  "artists"          list of strings; artists named in the description, empty if none
  "danceability"     float 0..1; how suitable the track is for dancing
  "energy"           float 0..1; perceived intensity and activity
  "key"              integer 0..11; pitch class, 0 = C, 1 = C#/Db and so on
  "loudness"         float, decibels, typically -60..0
  "mode"             integer; 1 = major, 0 = minor
  "speechiness"      float 0..1; presence of spoken words
  "acousticness"     float 0..1; confidence the track is acoustic
  "instrumentalness" float 0..1; likelihood the track has no vocals
  "liveness"         float 0..1; presence of a live audience
  "valence"          float 0..1; musical positiveness
  "tempo"            float, beats per minute
  "time_signature"   integer; beats per bar, usually 3 to 7

Song description: {song_description}"#
    )
}

pub fn format_prompt(songs_json: &str) -> String {
    format!(
        r#"
Format each song in the JSON array below as a Markdown section. Do not use bullet points.
For every song write a bold title line followed by a table:

**Song Title: <track_name>**

| Attribute | Value |
|---|---|
| **Artist** | <track_artist> |
| **Genre** | <track_genre> |
| **Search Score** | <score> |
| **Spotify Link** | <track_link> |

Return only the Markdown.

Songs:
{songs_json}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_prompt_lists_genres_and_query() {
        let prompt = attribute_prompt("a calm acoustic song", &["acoustic".into(), "jazz".into()]);
        assert!(prompt.contains("acoustic, jazz"));
        assert!(prompt.contains("Song description: a calm acoustic song"));
    }
}
