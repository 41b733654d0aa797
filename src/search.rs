//! Hybrid retrieval: semantic and keyword search merged, deduplicated and
//! re-ranked.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    config::RetrievalConfig,
    content_key::ContentKey,
    error::Result,
    record_store::{RecordStore, SearchResult},
    tagger::QueryAnalysis,
    text_util::extract_snippet,
};

/// A retrieved record with its final ranking score.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub rank: usize,
    /// Similarity plus the keyword bonus.
    pub score: f32,
    #[serde(flatten)]
    pub result: SearchResult,
}

/// Execute the hybrid pipeline.
///
/// 1. Semantic search (`semantic_k`, `min_similarity`)
/// 2. Keyword search on the analysis keywords, if any (`keyword_k`)
/// 3. Deduplicate on the content prefix
/// 4. Re-rank with the keyword bonus and keep `max_results`
pub fn hybrid_search(
    store: &RecordStore,
    question: &str,
    analysis: &QueryAnalysis,
    config: &RetrievalConfig,
) -> Result<Vec<RankedResult>> {
    let mut results =
        store.search(question, config.semantic_k, config.min_similarity)?;
    if !analysis.keywords.is_empty() {
        results.extend(
            store.search_by_keywords(&analysis.keywords, config.keyword_k)?,
        );
    }

    let merged = results.len();
    let unique = deduplicate(results, config.dedup_prefix_chars);
    let ranked = rerank(unique, &analysis.keywords, config);
    tracing::debug!(
        merged,
        returned = ranked.len(),
        "hybrid search complete"
    );
    Ok(ranked)
}

/// Collapse results whose content shares the same leading
/// `prefix_chars` characters. The higher-similarity duplicate survives, the
/// first one seen on ties; survivors keep first-seen order.
pub fn deduplicate(
    results: Vec<SearchResult>,
    prefix_chars: usize,
) -> Vec<SearchResult> {
    let mut slots: HashMap<u64, usize> = HashMap::new();
    let mut unique: Vec<SearchResult> = Vec::with_capacity(results.len());

    for result in results {
        let key = ContentKey::new(&result.record.chunk.content, prefix_chars);
        match slots.get(&key.numeric) {
            Some(&slot) => {
                if result.similarity > unique[slot].similarity {
                    unique[slot] = result;
                }
            }
            None => {
                slots.insert(key.numeric, unique.len());
                unique.push(result);
            }
        }
    }
    unique
}

/// Score each result as `similarity + keyword_bonus * hits`, where `hits`
/// counts the keywords found in its content, then sort (stable) and keep
/// the best `max_results`.
pub fn rerank(
    results: Vec<SearchResult>,
    keywords: &[String],
    config: &RetrievalConfig,
) -> Vec<RankedResult> {
    let mut scored: Vec<RankedResult> = results
        .into_iter()
        .map(|result| {
            let hits = keywords
                .iter()
                .filter(|k| {
                    RecordStore::matches_keyword(&result.record.chunk.content, k)
                })
                .count();
            RankedResult {
                rank: 0,
                score: result.similarity + config.keyword_bonus * hits as f32,
                result,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(config.max_results);
    for (i, r) in scored.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    scored
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &[RankedResult], query: &str) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for r in results {
        let chunk = &r.result.record.chunk;
        let key = ContentKey::new(&chunk.content, 200);
        println!(
            "{:>3}. [{:.3}] {} - {} {}",
            r.rank, r.score, chunk.source, chunk.section, key
        );
        if let Some(snippet) = extract_snippet(&chunk.content, query) {
            println!("     {snippet}");
        }
    }
    println!("\n{} result(s)", results.len());
}

#[derive(Serialize)]
struct JsonResults<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [RankedResult],
}

/// Format results as JSON output.
pub fn format_json(results: &[RankedResult], query: &str) -> Result<()> {
    let out = JsonResults {
        query,
        result_count: results.len(),
        results,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
