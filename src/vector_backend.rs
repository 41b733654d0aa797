use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};
use serde::{Deserialize, Serialize};

use crate::{
    chunking::Chunk,
    embedding::cosine_similarity,
    error::Result,
    record_store::{Backend, NewRecord, Record},
};

const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("embeddings");

/// Header size: 4 bytes embedding dimension.
const HEADER_SIZE: usize = 4;

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    #[serde(flatten)]
    chunk: Chunk,
    created_at: DateTime<Utc>,
}

/// Record backend on an embedded redb database.
///
/// Records are JSON-encoded in one table; embeddings live in a second table
/// under the same id so similarity scans never decode record bodies.
///
/// Binary format per embedding entry:
/// - 4 bytes: embedding dimension D (u32 LE)
/// - D * 4 bytes: f32 LE values
pub struct VectorBackend {
    db: Database,
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_SIZE + std::mem::size_of_val(vector));
    bytes.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    bytes.extend_from_slice(bytemuck::cast_slice(vector));
    bytes
}

/// Decode an embedding entry. Returns `None` when the entry is truncated or
/// its length disagrees with its header.
fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    let header: [u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
    let dimension = u32::from_le_bytes(header) as usize;
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != dimension * 4 {
        return None;
    }
    // The payload is not guaranteed to be 4-byte aligned, so copy instead
    // of casting in place.
    Some(bytemuck::pod_collect_to_vec(payload))
}

impl VectorBackend {
    /// Open or create the database at `path`.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use boilerkb::record_store::Backend;
    /// use boilerkb::vector_backend::VectorBackend;
    ///
    /// let backend = VectorBackend::open(&tmp.path().join("records.redb")).unwrap();
    /// assert_eq!(backend.count().unwrap(), 0);
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    fn decode_record(
        id: u64,
        body: &[u8],
        embedding: Option<&[u8]>,
    ) -> Result<Record> {
        let stored: StoredRecord = serde_json::from_slice(body)?;
        Ok(Record {
            id,
            chunk: stored.chunk,
            embedding: embedding.and_then(decode_embedding),
            created_at: stored.created_at,
        })
    }
}

impl Backend for VectorBackend {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn insert(&self, records: &[NewRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            let mut embeddings = txn.open_table(EMBEDDINGS)?;
            let mut next_id = table
                .last()?
                .map(|(key, _)| key.value() + 1)
                .unwrap_or(1);

            for record in records {
                let body = serde_json::to_vec(&StoredRecord {
                    chunk: record.chunk.clone(),
                    created_at: record.created_at,
                })?;
                table.insert(next_id, body.as_slice())?;
                if let Some(vector) = &record.embedding {
                    embeddings
                        .insert(next_id, encode_embedding(vector).as_slice())?;
                }
                next_id += 1;
            }
        }
        txn.commit()?;
        Ok(records.len())
    }

    fn scan(&self) -> Result<Vec<Record>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let embeddings = txn.open_table(EMBEDDINGS)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let id = key.value();
            let embedding = embeddings.get(id)?;
            records.push(Self::decode_record(
                id,
                value.value(),
                embedding.as_ref().map(|guard| guard.value()),
            )?);
        }
        Ok(records)
    }

    fn get(&self, ids: &[u64]) -> Result<Vec<Record>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let embeddings = txn.open_table(EMBEDDINGS)?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(body) = table.get(id)? else {
                continue;
            };
            let embedding = embeddings.get(id)?;
            records.push(Self::decode_record(
                id,
                body.value(),
                embedding.as_ref().map(|guard| guard.value()),
            )?);
        }
        Ok(records)
    }

    fn clear(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(RECORDS)?;
        txn.delete_table(EMBEDDINGS)?;
        txn.open_table(RECORDS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.commit()?;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        Ok(table.len()?)
    }

    fn ping(&self) -> Result<()> {
        let txn = self.db.begin_read()?;
        txn.open_table(RECORDS)?;
        Ok(())
    }

    fn nearest(
        &self,
        query: &[f32],
        min_similarity: f32,
    ) -> Result<Vec<(u64, f32)>> {
        let txn = self.db.begin_read()?;
        let embeddings = txn.open_table(EMBEDDINGS)?;

        let mut hits = Vec::new();
        for entry in embeddings.iter()? {
            let (key, value) = entry?;
            let Some(vector) = decode_embedding(value.value()) else {
                tracing::warn!(id = key.value(), "skipping corrupt embedding");
                continue;
            };
            let similarity = cosine_similarity(query, &vector);
            if similarity >= min_similarity {
                hits.push((key.value(), similarity));
            }
        }
        Ok(hits)
    }

    fn unembedded(&self) -> Result<Vec<Record>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        let embeddings = txn.open_table(EMBEDDINGS)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let id = key.value();
            if embeddings.get(id)?.is_none() {
                records.push(Self::decode_record(id, value.value(), None)?);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(content: &str, embedding: Option<Vec<f32>>) -> NewRecord {
        NewRecord {
            chunk: Chunk::new(content, "doc.md", "Intro"),
            embedding,
            created_at: Utc::now(),
        }
    }

    fn open_temp() -> (tempfile::TempDir, VectorBackend) {
        let tmp = tempfile::tempdir().unwrap();
        let backend = VectorBackend::open(&tmp.path().join("records.redb")).unwrap();
        (tmp, backend)
    }

    #[test]
    fn embedding_encoding_roundtrip() {
        let vector = vec![0.5f32, -1.25, 3.0];
        let bytes = encode_embedding(&vector);
        assert_eq!(bytes.len(), HEADER_SIZE + 12);
        assert_eq!(decode_embedding(&bytes), Some(vector));
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert_eq!(decode_embedding(&[1, 0]), None);
        let mut bytes = encode_embedding(&[1.0, 2.0]);
        bytes.pop();
        assert_eq!(decode_embedding(&bytes), None);
    }

    #[test]
    fn decode_handles_unaligned_payload() {
        let mut buf = vec![0u8];
        buf.extend(encode_embedding(&[1.0, 2.0, 3.0]));
        assert_eq!(decode_embedding(&buf[1..]), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn ids_are_monotonic_across_batches() {
        let (_tmp, backend) = open_temp();
        backend
            .insert(&[new_record("first content", None), new_record("second", None)])
            .unwrap();
        backend.insert(&[new_record("third content", None)]).unwrap();

        let ids: Vec<u64> = backend.scan().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn embeddings_are_stored_separately() {
        let (_tmp, backend) = open_temp();
        backend
            .insert(&[
                new_record("with vector", Some(vec![1.0, 0.0])),
                new_record("without vector", None),
            ])
            .unwrap();

        let records = backend.scan().unwrap();
        assert_eq!(records[0].embedding, Some(vec![1.0, 0.0]));
        assert_eq!(records[1].embedding, None);

        let unembedded = backend.unembedded().unwrap();
        assert_eq!(unembedded.len(), 1);
        assert_eq!(unembedded[0].chunk.content, "without vector");

        let hits = backend.nearest(&[1.0, 0.0], 0.5).unwrap();
        assert_eq!(hits, vec![(1, 1.0)]);
    }

    #[test]
    fn get_ignores_unknown_ids() {
        let (_tmp, backend) = open_temp();
        backend.insert(&[new_record("only record", None)]).unwrap();
        let records = backend.get(&[42, 1, 1]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1);
    }

    #[test]
    fn clear_empties_both_tables() {
        let (_tmp, backend) = open_temp();
        backend
            .insert(&[new_record("with vector", Some(vec![1.0]))])
            .unwrap();
        backend.clear().unwrap();
        assert_eq!(backend.count().unwrap(), 0);
        assert!(backend.nearest(&[1.0], 0.0).unwrap().is_empty());
    }

    #[test]
    fn reopen_preserves_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.redb");
        {
            let backend = VectorBackend::open(&path).unwrap();
            backend.insert(&[new_record("persisted content", None)]).unwrap();
        }
        let backend = VectorBackend::open(&path).unwrap();
        assert_eq!(backend.count().unwrap(), 1);
        assert_eq!(backend.scan().unwrap()[0].chunk.content, "persisted content");
    }
}
