//! The retrieval service: one handle owning the store, the generator and
//! the configuration.

use std::{path::Path, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    config::EngineConfig,
    context,
    data_dir::DataDir,
    embedding::Embedder,
    error::{Error, Result},
    generation::Generator,
    ingestion,
    prompt,
    record_store::{RecordStore, StoreStats},
    search,
    tagger::{self, ComponentTag, DefectTag, QueryAnalysis},
    walker,
};

const APOLOGY: &str =
    "Désolé, une erreur s'est produite lors du traitement de la question. Veuillez réessayer.";

/// Answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub context: String,
    /// Sources of the results included in `context`, in order.
    pub sources: Vec<String>,
    pub detected_components: Vec<ComponentTag>,
    pub detected_defects: Vec<DefectTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
    /// Generation was skipped or the pipeline failed.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    fn failed(analysis: &QueryAnalysis, error: &Error) -> Self {
        Self {
            response: APOLOGY.to_string(),
            context: String::new(),
            sources: Vec::new(),
            detected_components: analysis.components.clone(),
            detected_defects: analysis.defects.clone(),
            confidence: None,
            timestamp: Utc::now(),
            degraded: true,
            error: Some(error.to_string()),
        }
    }
}

/// Outcome of a full rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub files: usize,
    pub failed_files: usize,
    pub chunks: usize,
    pub total_records: u64,
    pub seeded: bool,
    pub backend: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub initialized: bool,
    pub last_index_update: Option<DateTime<Utc>>,
    pub healthy: bool,
    /// `None` when the store could not be read.
    pub store: Option<StoreStats>,
    pub embedder_available: bool,
    pub components: Vec<ComponentTag>,
    pub defects: Vec<DefectTag>,
}

pub struct RetrievalService {
    store: RecordStore,
    generator: Box<dyn Generator>,
    config: EngineConfig,
    initialized: bool,
    last_index_update: Option<DateTime<Utc>>,
}

impl RetrievalService {
    pub fn new(
        store: RecordStore,
        generator: Box<dyn Generator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            initialized: false,
            last_index_update: None,
        }
    }

    /// Open the record store under `data_dir` and build the service.
    pub fn open(
        data_dir: &DataDir,
        config: EngineConfig,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
    ) -> Result<Self> {
        let store = RecordStore::open(
            &data_dir.vector_db(),
            &data_dir.fallback_db(),
            config.store.clone(),
            embedder,
        )?;
        Ok(Self::new(store, generator, config))
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bring the index up to date.
    ///
    /// Reindexes when `force_reindex` is set, when the store is empty, or
    /// when documents exist but the store holds fewer than
    /// `min_indexed_records` records. Failures are logged and the service
    /// stays usable; this always returns `true`.
    pub fn initialize(&mut self, documents_dir: &Path, force_reindex: bool) -> bool {
        let count = self.store.count().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "cannot count records");
            0
        });
        let has_documents = walker::discover_files(documents_dir)
            .map(|files| !files.is_empty())
            .unwrap_or(false);
        let needs_indexing = force_reindex
            || count == 0
            || (has_documents && count < self.config.retrieval.min_indexed_records);

        if needs_indexing {
            match self.reindex(documents_dir) {
                Ok(report) => tracing::info!(
                    records = report.total_records,
                    seeded = report.seeded,
                    "index rebuilt"
                ),
                Err(e) => tracing::warn!(
                    error = %e,
                    "reindex failed, continuing in degraded mode"
                ),
            }
        } else {
            tracing::info!(records = count, "index up to date");
        }

        self.initialized = true;
        true
    }

    /// Rebuild the index from `documents_dir`.
    pub fn reindex(&mut self, documents_dir: &Path) -> Result<IndexReport> {
        let collected = ingestion::collect_chunks(
            documents_dir,
            self.config.store.min_content_chars,
        );

        if !self.store.clear() {
            return Err(Error::StoreWrite("clear"));
        }
        if !self.store.add(&collected.chunks) {
            return Err(Error::StoreWrite("add"));
        }
        self.last_index_update = Some(Utc::now());

        Ok(IndexReport {
            files: collected.files,
            failed_files: collected.failed,
            chunks: collected.chunks.len(),
            total_records: self.store.count()?,
            seeded: collected.seeded,
            backend: self.store.backend_name().to_string(),
        })
    }

    /// Answer `question` with at most `max_context_length` characters of
    /// context (the configured default when `None`).
    pub fn query(
        &self,
        question: &str,
        max_context_length: Option<usize>,
    ) -> QueryResponse {
        self.query_with_deadline(question, max_context_length, None)
    }

    /// Like [`RetrievalService::query`], but when `deadline` has passed once
    /// the context is assembled, generation is skipped and the context is
    /// returned as a degraded answer.
    pub fn query_with_deadline(
        &self,
        question: &str,
        max_context_length: Option<usize>,
        deadline: Option<Instant>,
    ) -> QueryResponse {
        let analysis = tagger::analyze(question);
        tracing::info!(
            question,
            components = ?analysis.components,
            defects = ?analysis.defects,
            intent = ?analysis.intent,
            "query"
        );

        let max_context_length = max_context_length
            .unwrap_or(self.config.retrieval.default_max_context_length);
        match self.answer(question, &analysis, max_context_length, deadline) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "query failed");
                QueryResponse::failed(&analysis, &e)
            }
        }
    }

    fn answer(
        &self,
        question: &str,
        analysis: &QueryAnalysis,
        max_context_length: usize,
        deadline: Option<Instant>,
    ) -> Result<QueryResponse> {
        let ranked = search::hybrid_search(
            &self.store,
            question,
            analysis,
            &self.config.retrieval,
        )?;
        let window = context::build_context(&ranked, max_context_length);
        let confidence = context::confidence(&window.used, &self.config.confidence);

        let expired = deadline.is_some_and(|d| Instant::now() >= d);
        let response = if expired {
            tracing::warn!("deadline passed, skipping generation");
            window.text.clone()
        } else {
            let answer = self.generator.generate(
                &prompt::system_prompt(analysis.intent),
                question,
                &window.text,
                self.config.generation.temperature,
            )?;
            if self.config.generation.annotate_response {
                prompt::post_process(&answer, analysis)
            } else {
                answer
            }
        };

        Ok(QueryResponse {
            response,
            sources: window.sources(),
            context: window.text,
            detected_components: analysis.components.clone(),
            detected_defects: analysis.defects.clone(),
            confidence: Some(confidence),
            timestamp: Utc::now(),
            degraded: expired,
            error: None,
        })
    }

    pub fn status(&self) -> ServiceStatus {
        let store = match self.store.stats() {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read store stats");
                None
            }
        };
        ServiceStatus {
            initialized: self.initialized,
            last_index_update: self.last_index_update,
            healthy: self.store.is_healthy(),
            store,
            embedder_available: self.store.embedder_available(),
            components: ComponentTag::ALL.to_vec(),
            defects: DefectTag::ALL.to_vec(),
        }
    }
}
