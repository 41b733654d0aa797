//! Persistent record store over interchangeable backends.
//!
//! [`RecordStore`] owns one [`Backend`] chosen when it is opened: the redb
//! vector backend when it can be opened, the SQLite fallback otherwise. All
//! ranking and keyword matching happens here, so both backends answer the
//! same query with the same results.

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    chunking::Chunk,
    config::{BackendPreference, StoreConfig},
    embedding::{Embedder, cosine_similarity},
    error::{Error, Result},
    fallback_backend::FallbackBackend,
    text_util::{contains_words, normalize_words},
    vector_backend::VectorBackend,
};

/// A chunk ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub chunk: Chunk,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// A persisted chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Monotonic identifier assigned by the backend.
    pub id: u64,
    #[serde(flatten)]
    pub chunk: Chunk,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub record: Record,
    /// Similarity to the query, in `[0, 1]`.
    pub similarity: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_records: u64,
    pub backend_name: String,
    /// Distinct sources in insertion order.
    pub sample_sources: Vec<String>,
}

/// Storage operations a backend provides.
///
/// Record ids are assigned in insertion order; every method returning
/// records returns them in ascending id order.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Persist `records` atomically, returning how many were written.
    fn insert(&self, records: &[NewRecord]) -> Result<usize>;

    fn scan(&self) -> Result<Vec<Record>>;

    /// Fetch the records with the given ids. Unknown ids are ignored.
    fn get(&self, ids: &[u64]) -> Result<Vec<Record>>;

    fn clear(&self) -> Result<()>;

    fn count(&self) -> Result<u64>;

    /// Cheap read that fails when the storage is unreachable.
    fn ping(&self) -> Result<()>;

    /// `(id, similarity)` for every record whose embedding reaches
    /// `min_similarity` against `query`.
    fn nearest(
        &self,
        query: &[f32],
        min_similarity: f32,
    ) -> Result<Vec<(u64, f32)>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter_map(|record| {
                let embedding = record.embedding?;
                let similarity = cosine_similarity(query, &embedding);
                (similarity >= min_similarity).then_some((record.id, similarity))
            })
            .collect())
    }

    /// Records stored without an embedding.
    fn unembedded(&self) -> Result<Vec<Record>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|record| record.embedding.is_none())
            .collect())
    }

    /// Up to `limit` distinct sources, in insertion order.
    fn sources(&self, limit: usize) -> Result<Vec<String>> {
        let mut sources: Vec<String> = Vec::new();
        for record in self.scan()? {
            if sources.len() >= limit {
                break;
            }
            if !sources.contains(&record.chunk.source) {
                sources.push(record.chunk.source);
            }
        }
        Ok(sources)
    }
}

pub struct RecordStore {
    backend: Box<dyn Backend>,
    embedder: Box<dyn Embedder>,
    config: StoreConfig,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("backend", &self.backend.name())
            .field("embedder_available", &self.embedder.is_available())
            .finish()
    }
}

/// Lowercased, trimmed, non-empty keywords.
fn normalize_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

fn first_keyword_match<'k>(
    content: &str,
    keywords: &'k [String],
) -> Option<&'k String> {
    let content = normalize_words(content);
    keywords.iter().find(|k| {
        let needle = normalize_words(k);
        let needle = needle.trim();
        !needle.is_empty() && content.contains(needle)
    })
}

/// Descending similarity, ascending id on ties.
fn rank(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.record.id.cmp(&b.record.id))
    });
}

impl RecordStore {
    /// Open the store, trying the vector backend at `vector_path` first and
    /// the SQLite backend at `fallback_path` if that fails.
    pub fn open(
        vector_path: &Path,
        fallback_path: &Path,
        config: StoreConfig,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self> {
        let vector_error = match config.backend {
            BackendPreference::Auto => match VectorBackend::open(vector_path) {
                Ok(backend) => {
                    tracing::info!(
                        path = %vector_path.display(),
                        "using vector backend"
                    );
                    return Ok(Self::with_backend(
                        Box::new(backend),
                        embedder,
                        config,
                    ));
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "vector backend unavailable, falling back to sqlite"
                    );
                    e.to_string()
                }
            },
            BackendPreference::Fallback => {
                "disabled by configuration".to_string()
            }
        };

        match FallbackBackend::open(fallback_path, config.busy_timeout_ms) {
            Ok(backend) => {
                tracing::info!(
                    path = %fallback_path.display(),
                    "using fallback backend"
                );
                Ok(Self::with_backend(Box::new(backend), embedder, config))
            }
            Err(e) => {
                tracing::error!(error = %e, "fallback backend unavailable");
                Err(Error::BackendInit {
                    vector: vector_error,
                    fallback: e.to_string(),
                })
            }
        }
    }

    pub fn with_backend(
        backend: Box<dyn Backend>,
        embedder: Box<dyn Embedder>,
        config: StoreConfig,
    ) -> Self {
        Self {
            backend,
            embedder,
            config,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn embedder_available(&self) -> bool {
        self.embedder.is_available()
    }

    /// Embed and persist `chunks`.
    ///
    /// Chunks below the content threshold are skipped. A chunk whose
    /// embedding fails is stored without one. Returns `false` only when
    /// the backend write fails.
    pub fn add(&self, chunks: &[Chunk]) -> bool {
        let embed = self.embedder.is_available();
        let now = Utc::now();
        let mut records = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            if !chunk.is_valid(self.config.min_content_chars) {
                tracing::warn!(
                    source = %chunk.source,
                    section = %chunk.section,
                    "skipping chunk below content threshold"
                );
                continue;
            }
            let embedding = if embed {
                match self.embedder.embed(&chunk.content) {
                    Ok(vector) => Some(vector),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            source = %chunk.source,
                            "embedding failed, storing without vector"
                        );
                        None
                    }
                }
            } else {
                None
            };
            records.push(NewRecord {
                chunk: chunk.clone(),
                embedding,
                created_at: now,
            });
        }

        if records.is_empty() {
            return true;
        }

        match self.backend.insert(&records) {
            Ok(written) => {
                tracing::info!(
                    backend = self.backend.name(),
                    written,
                    skipped = chunks.len() - written,
                    "stored records"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to store records");
                false
            }
        }
    }

    /// Rank records by cosine similarity to `query`.
    ///
    /// Records without an embedding (every record, when the embedder is
    /// unavailable) match by keyword instead, with the configured keyword
    /// similarity. `min_similarity` is inclusive.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = if self.embedder.is_available() {
            match self.embedder.embed(query) {
                Ok(vector) => Some(vector),
                Err(e) => {
                    tracing::warn!(error = %e, "query embedding failed");
                    None
                }
            }
        } else {
            None
        };

        let words: Vec<String> = normalize_keywords(
            &query
                .split_whitespace()
                .filter(|w| w.chars().count() > 1)
                .collect::<Vec<_>>(),
        );

        let (mut results, keyword_pool) = match query_vector {
            Some(vector) => {
                let hits: HashMap<u64, f32> = self
                    .backend
                    .nearest(&vector, min_similarity)?
                    .into_iter()
                    .collect();
                let ids: Vec<u64> = hits.keys().copied().collect();
                let results = self
                    .backend
                    .get(&ids)?
                    .into_iter()
                    .filter_map(|record| {
                        let similarity = *hits.get(&record.id)?;
                        Some(SearchResult {
                            record,
                            similarity,
                            matched_keyword: None,
                        })
                    })
                    .collect();
                (results, self.backend.unembedded()?)
            }
            None => (Vec::new(), self.backend.scan()?),
        };

        let keyword_similarity = self.config.keyword_similarity;
        if keyword_similarity >= min_similarity {
            results.extend(keyword_pool.into_iter().filter_map(|record| {
                let keyword =
                    first_keyword_match(&record.chunk.content, &words)?.clone();
                Some(SearchResult {
                    record,
                    similarity: keyword_similarity,
                    matched_keyword: Some(keyword),
                })
            }));
        }

        rank(&mut results);
        results.truncate(k);
        tracing::debug!(query, hits = results.len(), "semantic search");
        Ok(results)
    }

    /// Records containing any of `keywords` (case-insensitive), in
    /// insertion order, each tagged with the first keyword it contains.
    pub fn search_by_keywords<S: AsRef<str>>(
        &self,
        keywords: &[S],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let keywords = normalize_keywords(keywords);
        if keywords.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let results: Vec<SearchResult> = self
            .backend
            .scan()?
            .into_iter()
            .filter_map(|record| {
                let keyword =
                    first_keyword_match(&record.chunk.content, &keywords)?
                        .clone();
                Some(SearchResult {
                    record,
                    similarity: self.config.keyword_similarity,
                    matched_keyword: Some(keyword),
                })
            })
            .take(k)
            .collect();
        tracing::debug!(?keywords, hits = results.len(), "keyword search");
        Ok(results)
    }

    pub fn clear(&self) -> bool {
        match self.backend.clear() {
            Ok(()) => {
                tracing::info!(backend = self.backend.name(), "cleared store");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to clear store");
                false
            }
        }
    }

    pub fn count(&self) -> Result<u64> {
        self.backend.count()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            total_records: self.backend.count()?,
            backend_name: self.backend.name().to_string(),
            sample_sources: self.backend.sources(self.config.sample_sources)?,
        })
    }

    pub fn is_healthy(&self) -> bool {
        match self.backend.ping() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "store health check failed");
                false
            }
        }
    }

    /// Whether `content` contains `keyword`, ignoring case, accents and
    /// punctuation. The tagger matches with the same rules.
    pub fn matches_keyword(content: &str, keyword: &str) -> bool {
        contains_words(content, keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::{HashingEmbedder, UnavailableEmbedder},
        tagger::{ComponentTag, DefectTag},
    };

    fn chunk(content: &str, source: &str) -> Chunk {
        Chunk::new(content, source, "Section")
    }

    fn open_both(tmp: &Path) -> Vec<RecordStore> {
        let vector = RecordStore::open(
            &tmp.join("records.redb"),
            &tmp.join("unused.sqlite"),
            StoreConfig::default(),
            Box::new(HashingEmbedder::new(384)),
        )
        .unwrap();
        let fallback = RecordStore::open(
            &tmp.join("unused.redb"),
            &tmp.join("records.sqlite"),
            StoreConfig {
                backend: BackendPreference::Fallback,
                ..StoreConfig::default()
            },
            Box::new(HashingEmbedder::new(384)),
        )
        .unwrap();
        vec![vector, fallback]
    }

    #[test]
    fn selection_prefers_vector_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let stores = open_both(tmp.path());
        assert_eq!(stores[0].backend_name(), "vector");
        assert_eq!(stores[1].backend_name(), "fallback");
        assert!(!tmp.path().join("unused.redb").exists());
    }

    #[test]
    fn selection_falls_back_when_vector_fails() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory where the redb file should be makes the open fail.
        let vector_path = tmp.path().join("records.redb");
        std::fs::create_dir(&vector_path).unwrap();

        let store = RecordStore::open(
            &vector_path,
            &tmp.path().join("records.sqlite"),
            StoreConfig::default(),
            Box::new(HashingEmbedder::new(64)),
        )
        .unwrap();
        assert_eq!(store.backend_name(), "fallback");
    }

    #[test]
    fn selection_fails_when_both_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let vector_path = tmp.path().join("records.redb");
        let fallback_path = tmp.path().join("records.sqlite");
        std::fs::create_dir(&vector_path).unwrap();
        std::fs::create_dir(&fallback_path).unwrap();

        let err = RecordStore::open(
            &vector_path,
            &fallback_path,
            StoreConfig::default(),
            Box::new(HashingEmbedder::new(64)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::BackendInit { .. }));
    }

    #[test]
    fn add_skips_short_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        for store in open_both(tmp.path()) {
            let ok = store.add(&[
                chunk("abc", "a.md"),
                chunk("Valid chunk content about corrosion.", "b.md"),
            ]);
            assert!(ok);
            assert_eq!(store.count().unwrap(), 1, "{}", store.backend_name());
        }
    }

    #[test]
    fn add_empty_is_success() {
        let tmp = tempfile::tempdir().unwrap();
        for store in open_both(tmp.path()) {
            assert!(store.add(&[]));
            assert_eq!(store.count().unwrap(), 0);
        }
    }

    #[test]
    fn exact_content_ranks_first_with_max_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        let text = "Caustic attack on the economiseur BT outlet header";
        for store in open_both(tmp.path()) {
            store.add(&[
                chunk("Creep rupture of superheater tubes after overheat", "x"),
                chunk(text, "y"),
            ]);
            let results = store.search(text, 5, 0.0).unwrap();
            assert_eq!(results[0].record.chunk.content, text);
            assert!(results[0].similarity > 0.999);
        }
    }

    #[test]
    fn min_similarity_is_inclusive_floor() {
        let tmp = tempfile::tempdir().unwrap();
        let text = "Caustic attack on the economiseur BT outlet header";
        for store in open_both(tmp.path()) {
            store.add(&[chunk(text, "y")]);
            let results = store.search(text, 5, 1.0).unwrap();
            // Exact match may be a hair below 1.0 after float rounding, so
            // compare against the similarity actually reported.
            let best = store.search(text, 1, 0.0).unwrap()[0].similarity;
            assert_eq!(
                store.search(text, 5, best).unwrap().len(),
                1,
                "{}",
                store.backend_name()
            );
            assert!(results.len() <= 1);
        }
    }

    #[test]
    fn unavailable_embedder_uses_keyword_matching() {
        let tmp = tempfile::tempdir().unwrap();
        let store = RecordStore::open(
            &tmp.path().join("records.redb"),
            &tmp.path().join("records.sqlite"),
            StoreConfig::default(),
            Box::new(UnavailableEmbedder),
        )
        .unwrap();
        store.add(&[
            chunk("Turbine lubrication schedule", "a"),
            chunk("Corrosion sous dépôt de l'économiseur", "b"),
        ]);

        let results = store.search("CORROSION economiseur", 5, 0.1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.chunk.source, "b");
        assert_eq!(results[0].similarity, 0.5);

        assert!(store.search("corrosion", 5, 0.6).unwrap().is_empty());
    }

    #[test]
    fn keyword_search_returns_only_matches_in_insertion_order() {
        let tmp = tempfile::tempdir().unwrap();
        for store in open_both(tmp.path()) {
            store.add(&[
                chunk("Fissure on the surchauffeur header weld", "a"),
                chunk("Nothing to see in this record", "b"),
                chunk("Corrosion and fissure together", "c"),
                chunk("CORROSION of the economiseur tubes", "d"),
            ]);
            let results = store
                .search_by_keywords(&["corrosion", "fissure"], 10)
                .unwrap();
            let sources: Vec<_> = results
                .iter()
                .map(|r| r.record.chunk.source.as_str())
                .collect();
            assert_eq!(sources, vec!["a", "c", "d"]);
            assert_eq!(results[0].matched_keyword.as_deref(), Some("fissure"));
            assert_eq!(results[1].matched_keyword.as_deref(), Some("corrosion"));
            assert!(results.iter().all(|r| r.similarity == 0.5));

            let limited =
                store.search_by_keywords(&["corrosion", "fissure"], 2).unwrap();
            assert_eq!(limited.len(), 2);
            assert!(store.search_by_keywords::<&str>(&[], 5).unwrap().is_empty());
        }
    }

    #[test]
    fn keyword_matching_agrees_with_tagger() {
        let tmp = tempfile::tempdir().unwrap();
        let content = "Percement observé sur l'éco-BT, coude 3";
        assert_eq!(
            crate::tagger::tag(content),
            (ComponentTag::EconomiseurBt, DefectTag::Percement)
        );

        let analysis = crate::tagger::analyze("percement eco bt");
        assert!(analysis.keywords.iter().any(|k| k == "eco bt"));
        for keyword in &analysis.keywords {
            assert!(RecordStore::matches_keyword(content, keyword), "{keyword}");
        }

        for store in open_both(tmp.path()) {
            store.add(&[chunk(content, "a"), chunk("Économiseur HT sans défaut", "b")]);
            let results = store.search_by_keywords(&["eco bt"], 5).unwrap();
            assert_eq!(results.len(), 1, "{}", store.backend_name());
            assert_eq!(results[0].record.chunk.source, "a");
            assert_eq!(results[0].matched_keyword.as_deref(), Some("eco bt"));
        }
    }

    #[test]
    fn clear_then_stats_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        for store in open_both(tmp.path()) {
            store.add(&[
                chunk("First record content", "a.md"),
                chunk("Second record content", "b.md"),
                chunk("Third record content", "a.md"),
            ]);
            let stats = store.stats().unwrap();
            assert_eq!(stats.total_records, 3);
            assert_eq!(stats.sample_sources, vec!["a.md", "b.md"]);

            assert!(store.clear());
            let stats = store.stats().unwrap();
            assert_eq!(stats.total_records, 0);
            assert!(stats.sample_sources.is_empty());

            store.add(&[chunk("After clear content", "c.md")]);
            assert_eq!(store.count().unwrap(), 1);
        }
    }

    #[test]
    fn health_check_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        for store in open_both(tmp.path()) {
            assert!(store.is_healthy());
            assert!(store.is_healthy());
        }
    }

    #[test]
    fn backends_agree_on_ranking() {
        let tmp = tempfile::tempdir().unwrap();
        let chunks = [
            chunk("economiseur BT corrosion causes localized wall thinning", "doc1"),
            chunk("surchauffeur HT overheating causes creep rupture", "doc2"),
            chunk("rechauffeur HT acid attack on outlet branches", "doc3"),
        ];
        let stores = open_both(tmp.path());
        for store in &stores {
            store.add(&chunks);
        }
        let ranked: Vec<Vec<String>> = stores
            .iter()
            .map(|store| {
                store
                    .search("corrosion economiseur", 5, 0.0)
                    .unwrap()
                    .into_iter()
                    .map(|r| r.record.chunk.source)
                    .collect()
            })
            .collect();
        assert_eq!(ranked[0], ranked[1]);
        assert_eq!(ranked[0][0], "doc1");
    }
}
