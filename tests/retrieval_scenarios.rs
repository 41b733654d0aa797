//! End-to-end retrieval scenarios, run against both storage backends.

use std::path::Path;

use boilerkb::{
    Chunk,
    ComponentTag,
    EngineConfig,
    Error,
    RecordStore,
    RetrievalService,
    config::StoreConfig,
    context,
    embedding::{Embedder, HashingEmbedder, UnavailableEmbedder},
    fallback_backend::FallbackBackend,
    generation::OfflineGenerator,
    record_store::{Record, SearchResult},
    search::RankedResult,
    text_util::{ELLIPSIS, char_len},
    vector_backend::VectorBackend,
};
use chrono::Utc;
use proptest::prelude::*;

fn vector_store(dir: &Path, embedder: Box<dyn Embedder>) -> RecordStore {
    let backend = VectorBackend::open(&dir.join("records.redb")).unwrap();
    RecordStore::with_backend(Box::new(backend), embedder, StoreConfig::default())
}

fn fallback_store(embedder: Box<dyn Embedder>) -> RecordStore {
    let backend = FallbackBackend::open_in_memory().unwrap();
    RecordStore::with_backend(Box::new(backend), embedder, StoreConfig::default())
}

/// Run `check` once with each backend.
fn with_each_backend(check: impl Fn(RecordStore)) {
    with_each_backend_using(|| Box::new(HashingEmbedder::new(384)), check);
}

fn with_each_backend_using(
    embedder: impl Fn() -> Box<dyn Embedder>,
    check: impl Fn(RecordStore),
) {
    let tmp = tempfile::tempdir().unwrap();
    check(vector_store(tmp.path(), embedder()));
    check(fallback_store(embedder()));
}

/// Hashing embedder that refuses any text containing `FAIL`.
struct SelectiveEmbedder(HashingEmbedder);

impl Embedder for SelectiveEmbedder {
    fn embed(&self, text: &str) -> boilerkb::Result<Vec<f32>> {
        if text.contains("FAIL") {
            return Err(Error::EmbeddingUnavailable);
        }
        self.0.embed(text)
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }
}

fn service(store: RecordStore) -> RetrievalService {
    RetrievalService::new(
        store,
        Box::new(OfflineGenerator::default()),
        EngineConfig::default(),
    )
}

fn economiser_documents() -> Vec<Chunk> {
    vec![
        Chunk::new(
            "economiseur BT corrosion causes localized wall thinning",
            "doc1",
            "Corrosion",
        )
        .tagged(),
        Chunk::new(
            "surchauffeur HT overheating causes creep rupture",
            "doc2",
            "Fluage",
        )
        .tagged(),
    ]
}

#[test]
fn corrosion_question_ranks_matching_document_first() {
    with_each_backend(|store| {
        assert!(store.add(&economiser_documents()));
        let svc = service(store);

        let response = svc.query("corrosion economiseur", None);
        assert!(!response.degraded, "{}", svc.store().backend_name());
        assert_eq!(response.sources[0], "doc1");
        if let Some(doc2) = response.sources.iter().position(|s| s == "doc2") {
            assert!(doc2 > 0);
        }
        assert!(response.context.starts_with("[doc1 - Corrosion]\n"));
        assert!(
            response
                .detected_components
                .contains(&ComponentTag::EconomiseurBt)
        );
        assert!(response.confidence.unwrap() > 0.3);
    });
}

#[test]
fn exact_content_is_the_best_match() {
    with_each_backend(|store| {
        assert!(store.add(&economiser_documents()));
        let hits = store
            .search("surchauffeur HT overheating causes creep rupture", 5, 0.1)
            .unwrap();
        assert_eq!(hits[0].record.chunk.source, "doc2");
        assert!(hits[0].similarity > 0.99);
    });
}

#[test]
fn backends_return_the_same_sources_in_the_same_order() {
    let tmp = tempfile::tempdir().unwrap();
    let stores = [
        vector_store(tmp.path(), Box::new(HashingEmbedder::new(384))),
        fallback_store(Box::new(HashingEmbedder::new(384))),
    ];
    let sources: Vec<Vec<String>> = stores
        .iter()
        .map(|store| {
            assert!(store.add(&economiser_documents()));
            store
                .search("corrosion causes creep", 5, 0.0)
                .unwrap()
                .into_iter()
                .map(|r| r.record.chunk.source)
                .collect()
        })
        .collect();
    assert_eq!(sources[0], sources[1]);
    assert!(!sources[0].is_empty());
}

#[test]
fn health_check_is_idempotent() {
    with_each_backend(|store| {
        assert!(store.is_healthy());
        assert!(store.is_healthy());
        assert_eq!(store.count().unwrap(), 0);
    });
}

#[test]
fn empty_store_answers_with_floor_confidence() {
    with_each_backend(|store| {
        let svc = service(store);
        let response = svc.query("corrosion economiseur", None);
        assert!(response.sources.is_empty());
        assert_eq!(response.confidence, Some(0.3));
        assert!(response.error.is_none());
    });
}

#[test]
fn short_chunks_are_not_stored() {
    with_each_backend(|store| {
        let chunks = vec![
            Chunk::new("abc", "doc", "Section"),
            Chunk::new("Encrassement des tubes du réchauffeur.", "doc", "Section"),
        ];
        assert!(store.add(&chunks));
        assert_eq!(store.count().unwrap(), 1);
    });
}

#[test]
fn clear_empties_the_store() {
    with_each_backend(|store| {
        assert!(store.add(&economiser_documents()));
        assert_eq!(store.stats().unwrap().sample_sources, ["doc1", "doc2"]);

        assert!(store.clear());
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_records, 0);
        assert!(stats.sample_sources.is_empty());

        // Ids restart after a clear.
        assert!(store.add(&economiser_documents()[..1]));
        let hits = store.search_by_keywords(&["thinning"], 5).unwrap();
        assert_eq!(hits[0].record.id, 1);
    });
}

#[test]
fn keyword_search_is_case_and_accent_insensitive() {
    with_each_backend(|store| {
        assert!(store.add(&economiser_documents()));
        let hits = store.search_by_keywords(&["ECONOMISEUR"], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.chunk.source, "doc1");
        assert_eq!(hits[0].matched_keyword.as_deref(), Some("economiseur"));
    });
}

#[test]
fn chunk_without_embedding_is_kept_and_keyword_searchable() {
    with_each_backend_using(
        || Box::new(SelectiveEmbedder(HashingEmbedder::new(384))),
        |store| {
            let chunks = vec![
                Chunk::new(
                    "surchauffeur HT overheating causes creep rupture",
                    "good",
                    "Fluage",
                ),
                Chunk::new(
                    "FAIL corrosion under deposit in the economiseur",
                    "bad",
                    "Corrosion",
                ),
            ];
            assert!(store.add(&chunks));
            assert_eq!(store.count().unwrap(), 2, "{}", store.backend_name());

            let hits = store.search("corrosion", 5, 0.1).unwrap();
            let bad = hits
                .iter()
                .find(|r| r.record.chunk.source == "bad")
                .expect("unembedded record matched by keyword");
            assert_eq!(bad.similarity, 0.5);
            assert_eq!(bad.matched_keyword.as_deref(), Some("corrosion"));
            assert!(bad.record.embedding.is_none());

            let hits = store.search("overheating causes creep rupture", 5, 0.1).unwrap();
            assert_eq!(hits[0].record.chunk.source, "good");
            assert!(hits[0].matched_keyword.is_none());

            let hits = store.search_by_keywords(&["corrosion"], 5).unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].record.chunk.source, "bad");
        },
    );
}

#[test]
fn keyword_only_mode_still_answers() {
    let tmp = tempfile::tempdir().unwrap();
    for store in [
        vector_store(tmp.path(), Box::new(UnavailableEmbedder)),
        fallback_store(Box::new(UnavailableEmbedder)),
    ] {
        assert!(!store.embedder_available());
        assert!(store.add(&economiser_documents()));

        let hits = store.search("fluage surchauffeur", 5, 0.1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.chunk.source, "doc2");

        let svc = service(store);
        let response = svc.query("corrosion economiseur", None);
        assert_eq!(response.sources, ["doc1"]);
    }
}

#[test]
fn reindex_from_directory_replaces_previous_records() {
    let tmp = tempfile::tempdir().unwrap();
    let docs = tmp.path().join("documents");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(
        docs.join("amdec.md"),
        "# Économiseur BT\n\nPercement par érosion des coudes.\n\n\
         # Réchauffeur HT\n\nFatigue thermique des collecteurs.\n",
    )
    .unwrap();

    let mut svc = service(fallback_store(Box::new(HashingEmbedder::new(384))));
    assert!(svc.store().add(&economiser_documents()));

    let report = svc.reindex(&docs).unwrap();
    assert!(!report.seeded);
    assert_eq!(report.files, 1);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.total_records, 2);
    assert_eq!(report.backend, "fallback");
    assert_eq!(svc.store().stats().unwrap().sample_sources, ["amdec.md"]);
}

fn ranked(id: u64, content: &str) -> RankedResult {
    RankedResult {
        rank: id as usize,
        score: 0.5,
        result: SearchResult {
            record: Record {
                id,
                chunk: Chunk::new(content, format!("doc{id}"), "Section"),
                embedding: None,
                created_at: Utc::now(),
            },
            similarity: 0.5,
            matched_keyword: None,
        },
    }
}

proptest! {
    #[test]
    fn prop_keyword_hits_contain_the_keyword(
        contents in prop::collection::vec("[a-e]{2,4}( [a-e]{2,4}){2,6}", 1..12),
        keyword in "[a-e]{2,3}",
    ) {
        let store = fallback_store(Box::new(UnavailableEmbedder));
        let chunks: Vec<Chunk> = contents
            .iter()
            .map(|c| Chunk::new(c.as_str(), "prop", "Section"))
            .collect();
        prop_assert!(store.add(&chunks));

        let hits = store.search_by_keywords(&[keyword.as_str()], 100).unwrap();
        let expected = chunks
            .iter()
            .filter(|c| c.is_valid(10))
            .filter(|c| RecordStore::matches_keyword(&c.content, &keyword))
            .count();
        prop_assert_eq!(hits.len(), expected);
        for hit in &hits {
            prop_assert!(RecordStore::matches_keyword(&hit.record.chunk.content, &keyword));
        }
    }

    #[test]
    fn prop_context_never_exceeds_budget(
        contents in prop::collection::vec("[a-z ]{1,400}", 0..8),
        max_chars in 1usize..1500,
    ) {
        let results: Vec<RankedResult> = contents
            .iter()
            .enumerate()
            .map(|(i, c)| ranked(i as u64 + 1, c))
            .collect();

        let window = context::build_context(&results, max_chars);
        prop_assert!(char_len(&window.text) <= max_chars + char_len(ELLIPSIS));
        prop_assert_eq!(window.used.is_empty(), results.is_empty());
        prop_assert_eq!(window.sources().len(), window.used.len());
    }
}
