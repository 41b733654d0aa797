use std::path::Path;

use rayon::prelude::*;

use crate::{
    chunking::{self, Chunk},
    decode,
    seed,
    walker::{self, DiscoveredFile},
};

/// Chunks gathered from a document directory.
#[derive(Debug, Clone, Default)]
pub struct CollectedChunks {
    pub chunks: Vec<Chunk>,
    /// Files discovered under the directory.
    pub files: usize,
    /// Files that could not be decoded.
    pub failed: usize,
    /// Whether the built-in seed knowledge was used instead.
    pub seeded: bool,
}

fn extract_file(file: &DiscoveredFile, min_chars: usize) -> Option<Vec<Chunk>> {
    let source = file.source_name();
    match decode::decode_file(&file.absolute_path, &source) {
        Ok(document) => Some(
            chunking::extract(&document, min_chars)
                .into_iter()
                .map(Chunk::tagged)
                .collect(),
        ),
        Err(e) => {
            tracing::warn!(
                path = %file.relative_path.display(),
                error = %e,
                "skipping document"
            );
            None
        }
    }
}

/// Decode, extract and tag every document under `dir`.
///
/// Files are processed in parallel; chunk order follows the sorted file
/// order. A file that fails to decode is logged and skipped. When the
/// directory is missing, unreadable, or yields no chunk at all, the seed
/// knowledge base is returned instead.
pub fn collect_chunks(dir: &Path, min_chars: usize) -> CollectedChunks {
    let files = match walker::discover_files(dir) {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "cannot scan documents");
            Vec::new()
        }
    };

    let extracted: Vec<Option<Vec<Chunk>>> = files
        .par_iter()
        .map(|file| extract_file(file, min_chars))
        .collect();

    let failed = extracted.iter().filter(|e| e.is_none()).count();
    let chunks: Vec<Chunk> = extracted.into_iter().flatten().flatten().collect();

    if chunks.is_empty() {
        tracing::info!(
            files = files.len(),
            "no chunks extracted, using seed knowledge base"
        );
        return CollectedChunks {
            chunks: seed::seed_chunks(),
            files: files.len(),
            failed,
            seeded: true,
        };
    }

    tracing::info!(
        files = files.len(),
        failed,
        chunks = chunks.len(),
        "extracted documents"
    );
    CollectedChunks {
        chunks,
        files: files.len(),
        failed,
        seeded: false,
    }
}
