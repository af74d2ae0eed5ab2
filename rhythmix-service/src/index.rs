use anyhow::Context as _;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::models::ScoredSong;

/// Structural restriction applied to a nearest-neighbour query
#[derive(Debug, Clone, PartialEq)]
pub enum SongFilter {
    /// Exact track-name match
    TrackName(String),
    /// Any of the listed artists
    AnyArtist(Vec<String>),
    /// Exact genre match
    Genre(String),
}

/// Nearest-neighbour search over songs' attribute vectors
#[async_trait]
pub trait SongIndex: Send + Sync {
    /// Best matches first, at most `limit` of them
    async fn query(
        &self,
        vector: &[f64],
        filter: &SongFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredSong>>;
}

/// SongIndex over a pgvector table:
///
/// ```sql
/// CREATE TABLE music_vectors (
///     track_name   TEXT,
///     track_artist TEXT,
///     track_genre  TEXT,
///     track_link   TEXT,
///     vector       vector(12)
/// );
/// ```
pub struct PgVectorSongIndex {
    pool: sqlx::PgPool,
}

impl PgVectorSongIndex {
    pub async fn connect(songs_database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(songs_database_url)
            .await
            .context("connecting to songs database")?;

        Ok(Self { pool })
    }
}

/// pgvector's text form, e.g. `[0.3,0.2,2]`
fn vector_literal(vector: &[f64]) -> String {
    let values = vector
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("[{values}]")
}

#[async_trait]
impl SongIndex for PgVectorSongIndex {
    async fn query(
        &self,
        vector: &[f64],
        filter: &SongFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredSong>> {
        let condition = match filter {
            SongFilter::TrackName(_) => "track_name = $2",
            SongFilter::AnyArtist(_) => "track_artist = ANY($2)",
            SongFilter::Genre(_) => "track_genre = $2",
        };
        // Cosine similarity, so 1.0 is an exact match
        let sql = format!(
            "SELECT track_name, track_artist, track_genre, track_link, \
                    1 - (vector <=> $1::vector) AS score \
             FROM music_vectors \
             WHERE {condition} \
             ORDER BY vector <=> $1::vector \
             LIMIT $3"
        );

        let query = sqlx::query_as::<_, (String, String, String, String, f64)>(&sql)
            .bind(vector_literal(vector));
        let query = match filter {
            SongFilter::TrackName(name) => query.bind(name.clone()),
            SongFilter::AnyArtist(artists) => query.bind(artists.clone()),
            SongFilter::Genre(genre) => query.bind(genre.clone()),
        };

        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .context("vector search query failed")?;

        info!("Retrieved {} results from vector search", rows.len());

        Ok(rows
            .into_iter()
            .map(
                |(track_name, track_artist, track_genre, track_link, score)| ScoredSong {
                    track_name,
                    track_artist,
                    track_genre,
                    track_link,
                    score,
                },
            )
            .collect())
    }
}
