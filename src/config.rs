//! Engine configuration.
//!
//! Every ranking and confidence weight used by the query pipeline lives
//! here rather than in the code that applies it. Values are read from an
//! optional `config.toml`; any key left out keeps its default.
//!
//! ```toml
//! [retrieval]
//! semantic_k = 8
//!
//! [store]
//! backend = "fallback"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Root configuration object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub confidence: ConfidenceConfig,
    pub generation: GenerationConfig,
}

/// Which backend the record store starts with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Try the vector backend, fall back to SQLite on failure.
    #[default]
    Auto,
    /// Skip the vector backend entirely.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendPreference,
    /// Chunks shorter than this (in characters, after trimming) are noise.
    pub min_content_chars: usize,
    /// Similarity assigned to keyword-only matches.
    pub keyword_similarity: f32,
    /// Dimension of the built-in hashing embedder.
    pub embedding_dimension: usize,
    /// Upper bound on how long the SQLite backend waits for a lock.
    pub busy_timeout_ms: u64,
    /// Maximum number of distinct sources reported by `stats`.
    pub sample_sources: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            min_content_chars: 10,
            keyword_similarity: 0.5,
            embedding_dimension: 384,
            busy_timeout_ms: 5_000,
            sample_sources: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub semantic_k: usize,
    pub min_similarity: f32,
    pub keyword_k: usize,
    /// Number of leading characters hashed to detect duplicate results.
    pub dedup_prefix_chars: usize,
    /// Score added per analysis keyword found in a result.
    pub keyword_bonus: f32,
    pub max_results: usize,
    pub default_max_context_length: usize,
    /// Store size below which `initialize` reindexes if documents exist.
    pub min_indexed_records: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_k: 5,
            min_similarity: 0.1,
            keyword_k: 3,
            dedup_prefix_chars: 200,
            keyword_bonus: 0.1,
            max_results: 6,
            default_max_context_length: 3000,
            min_indexed_records: 5,
        }
    }
}

/// Weights of `avg + count_weight * min(n / count_saturation, 1)
/// + diversity_weight * min(sources / source_saturation, 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub count_weight: f32,
    pub count_saturation: usize,
    pub diversity_weight: f32,
    pub source_saturation: usize,
    /// Confidence reported when nothing was retrieved.
    pub empty_floor: f32,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            count_weight: 0.2,
            count_saturation: 5,
            diversity_weight: 0.1,
            source_saturation: 3,
            empty_floor: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    /// Append the detected component/defect footer to answers.
    pub annotate_response: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            annotate_response: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load the configuration file at `path`, or defaults when it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
