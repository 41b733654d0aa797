use std::{path::Path, sync::Mutex, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};

use crate::{
    chunking::Chunk,
    error::{Error, Result},
    record_store::{Backend, NewRecord, Record},
    tagger::{ComponentTag, DefectTag},
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    section TEXT NOT NULL,
    component TEXT NOT NULL DEFAULT 'general',
    defect TEXT NOT NULL DEFAULT 'general',
    embedding BLOB,
    created_at TEXT NOT NULL
);
";

const COLUMNS: &str =
    "id, content, source, section, component, defect, embedding, created_at";

/// Record backend on a single SQLite table, searched by scanning.
///
/// Embeddings are stored as raw little-endian `f32` blobs.
pub struct FallbackBackend {
    conn: Mutex<Connection>,
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let component: String = row.get(4)?;
    let defect: String = row.get(5)?;
    let embedding: Option<Vec<u8>> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
        })?;

    Ok(Record {
        id: row.get::<_, i64>(0)? as u64,
        chunk: Chunk {
            content: row.get(1)?,
            source: row.get(2)?,
            section: row.get(3)?,
            component: ComponentTag::parse(&component),
            defect: DefectTag::parse(&defect),
        },
        embedding: embedding.and_then(|bytes| {
            (bytes.len() % 4 == 0).then(|| bytemuck::pod_collect_to_vec(&bytes))
        }),
        created_at,
    })
}

impl FallbackBackend {
    /// Open or create the SQLite database at `path`.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, busy_timeout_ms)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, 0)
    }

    fn init(conn: Connection, busy_timeout_ms: u64) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        f(&mut conn)
    }

    fn query_records(&self, sql: &str) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let records = stmt
                .query_map([], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }
}

impl Backend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn insert(&self, records: &[NewRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO documents
                     (content, source, section, component, defect, embedding, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for record in records {
                    let embedding: Option<&[u8]> = record
                        .embedding
                        .as_deref()
                        .map(bytemuck::cast_slice);
                    stmt.execute(params![
                        record.chunk.content,
                        record.chunk.source,
                        record.chunk.section,
                        record.chunk.component.as_str(),
                        record.chunk.defect.as_str(),
                        embedding,
                        record.created_at.to_rfc3339(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(records.len())
        })
    }

    fn scan(&self) -> Result<Vec<Record>> {
        self.query_records(&format!(
            "SELECT {COLUMNS} FROM documents ORDER BY id"
        ))
    }

    fn get(&self, ids: &[u64]) -> Result<Vec<Record>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM documents WHERE id = ?1"
            ))?;
            let mut records = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(record) = stmt
                    .query_row([id as i64], row_to_record)
                    .optional()?
                {
                    records.push(record);
                }
            }
            Ok(records)
        })
    }

    fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM documents", [])?;
            // Restart ids at 1, like a freshly created store.
            tx.execute(
                "DELETE FROM sqlite_sequence WHERE name = 'documents'",
                [],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents",
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn unembedded(&self) -> Result<Vec<Record>> {
        self.query_records(&format!(
            "SELECT {COLUMNS} FROM documents WHERE embedding IS NULL ORDER BY id"
        ))
    }

    fn sources(&self, limit: usize) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT source FROM documents
                 GROUP BY source ORDER BY MIN(id) LIMIT ?1",
            )?;
            let sources = stmt
                .query_map([limit as i64], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(sources)
        })
    }
}
