use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CatalogConfig {
    /// Reject content references that have no entry below.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CatalogEntry {
    pub content_ref: String,
    pub title: String,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}
