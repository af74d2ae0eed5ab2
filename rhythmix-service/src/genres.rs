use anyhow::{bail, Context as _};
use std::path::Path;
use std::sync::Arc;

const BUILTIN_GENRES: &str = include_str!("../data/genres.txt");

/// The genre labels the song index knows about. Handed to the predict step
/// so the model picks a label the search can actually filter on.
#[derive(Debug, Clone)]
pub struct GenreCatalog {
    labels: Arc<Vec<String>>,
}

impl GenreCatalog {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = labels
            .into_iter()
            .map(Into::into)
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();
        labels.sort();
        labels.dedup();
        Self {
            labels: Arc::new(labels),
        }
    }

    /// One label per line; blank lines and `#` comments are skipped
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().filter(|line| !line.trim_start().starts_with('#')))
    }

    /// Labels of the public Spotify tracks dataset the index is built from
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_GENRES)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading genre list {}", path.display()))?;
        let catalog = Self::parse(&text);
        if catalog.is_empty() {
            bail!("genre list {} is empty", path.display());
        }
        Ok(catalog)
    }

    pub fn contains(&self, genre: &str) -> bool {
        self.labels.binary_search_by(|label| label.as_str().cmp(genre)).is_ok()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
