use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record store {0} failed")]
    StoreWrite(&'static str),

    #[error("storage lock poisoned")]
    LockPoisoned,

    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("could not extract {document}: {reason}")]
    Extraction { document: String, reason: String },

    #[error("embedding model unavailable")]
    EmbeddingUnavailable,

    #[error(
        "no storage backend available (vector: {vector}; fallback: {fallback})"
    )]
    BackendInit { vector: String, fallback: String },

    #[error("generation failed: {0}")]
    Generation(String),
}
