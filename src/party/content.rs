//! Content references and the catalog lookup seam.
//!
//! The coordinator never fetches metadata itself; it asks a `ContentCatalog` once at
//! creation time and stores whatever summary comes back.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{common::PartyError, configs::CatalogConfig};

/// What the party is watching: `movie:<id>` or `series:<seriesId>:<episodeId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentRef {
    Movie { id: String },
    Episode { series_id: String, episode_id: String },
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FromStr for ContentRef {
    type Err = PartyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || PartyError::InvalidContentRef(raw.to_string());
        let parts: Vec<&str> = raw.trim().split(':').collect();
        match parts.as_slice() {
            ["movie", id] if valid_segment(id) => Ok(Self::Movie { id: id.to_string() }),
            ["series", series, episode] if valid_segment(series) && valid_segment(episode) => {
                Ok(Self::Episode {
                    series_id: series.to_string(),
                    episode_id: episode.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie { id } => write!(f, "movie:{}", id),
            Self::Episode {
                series_id,
                episode_id,
            } => write!(f, "series:{}:{}", series_id, episode_id),
        }
    }
}

impl Serialize for ContentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// Pure metadata lookup. Implementations must not block.
pub trait ContentCatalog: Send + Sync {
    fn get(&self, content_ref: &ContentRef) -> Option<ContentSummary>;

    /// Whether refs without an entry should be refused.
    fn requires_known(&self) -> bool {
        false
    }
}

/// Parses `raw` and looks it up, refusing unknown content when the catalog is strict.
pub fn resolve_content(
    catalog: &dyn ContentCatalog,
    raw: &str,
) -> Result<(ContentRef, Option<ContentSummary>), PartyError> {
    let content_ref: ContentRef = raw.parse()?;
    let summary = catalog.get(&content_ref);
    if summary.is_none() && catalog.requires_known() {
        return Err(PartyError::UnknownContent(content_ref.to_string()));
    }
    Ok((content_ref, summary))
}

/// Catalog built from the `[catalog]` config section.
pub struct StaticCatalog {
    entries: HashMap<ContentRef, ContentSummary>,
    strict: bool,
}

impl StaticCatalog {
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mut entries = HashMap::new();
        for entry in &config.entries {
            match entry.content_ref.parse::<ContentRef>() {
                Ok(content_ref) => {
                    entries.insert(
                        content_ref,
                        ContentSummary {
                            title: entry.title.clone(),
                            poster: entry.poster.clone(),
                            duration_seconds: entry.duration_seconds,
                        },
                    );
                }
                Err(e) => tracing::warn!("Skipping catalog entry: {}", e),
            }
        }
        Self {
            entries,
            strict: config.strict,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContentCatalog for StaticCatalog {
    fn get(&self, content_ref: &ContentRef) -> Option<ContentSummary> {
        self.entries.get(content_ref).cloned()
    }

    fn requires_known(&self) -> bool {
        self.strict
    }
}
