//! boilerkb - a retrieval-augmented knowledge engine for boiler maintenance.
//!
//! boilerkb turns maintenance documents (AMDEC sheets, procedures, notes)
//! into tagged chunks, stores them in a [redb](https://github.com/cberner/redb)
//! vector store with an SQLite fallback, and answers questions from a
//! hybrid semantic and keyword search over them.
//!
//! # Quick start
//!
//! ```no_run
//! use boilerkb::{DataDir, EngineConfig, RetrievalService};
//! use boilerkb::embedding::HashingEmbedder;
//! use boilerkb::generation::OfflineGenerator;
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config = EngineConfig::load(&data_dir.config_file()).unwrap();
//! let embedder = HashingEmbedder::new(config.store.embedding_dimension);
//! let mut service = RetrievalService::open(
//!     &data_dir,
//!     config,
//!     Box::new(embedder),
//!     Box::new(OfflineGenerator::default()),
//! )
//! .unwrap();
//!
//! service.initialize(&data_dir.documents_dir().unwrap(), false);
//! let answer = service.query("Comment traiter la corrosion de l'économiseur ?", None);
//! println!("{} (confidence: {:?})", answer.response, answer.confidence);
//! for source in &answer.sources {
//!     println!("  {source}");
//! }
//! ```

pub mod chunking;
pub mod config;
pub mod content_key;
pub mod context;
pub mod data_dir;
pub mod decode;
pub mod embedding;
pub mod error;
pub mod fallback_backend;
pub mod generation;
pub mod ingestion;
pub mod prompt;
pub mod record_store;
pub mod search;
pub mod seed;
pub mod service;
pub mod tagger;
pub mod text_util;
pub mod vector_backend;
pub mod walker;

pub use chunking::Chunk;
pub use config::EngineConfig;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use record_store::RecordStore;
pub use service::{QueryResponse, RetrievalService};
pub use tagger::{ComponentTag, DefectTag, Intent};
