//! Snowball Store - Sentence store backends and corpus indexing
//!
//! Implements `SentenceStore` over:
//! - an in-memory vector (tests, small corpora)
//! - JSONL shard files with an inverted index
//! - an Elasticsearch index
//!
//! and the indexer that turns extracted dumps into JSONL shards.

use std::sync::Arc;

use snowball_core::{Result, SentenceStore, StoreBackend, StoreConfig};
use tracing::info;

pub mod elasticsearch;
pub mod indexer;
pub mod jsonl;
pub mod memory;

pub use elasticsearch::ElasticsearchStore;
pub use indexer::{collect_inputs, IndexReport, Indexer};
pub use jsonl::JsonlSentenceStore;
pub use memory::MemorySentenceStore;

/// Open the store selected by the configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn SentenceStore>> {
    let store: Arc<dyn SentenceStore> = match config.backend {
        StoreBackend::Jsonl => Arc::new(JsonlSentenceStore::open(&config.jsonl_paths)?),
        StoreBackend::Elasticsearch => Arc::new(ElasticsearchStore::from_config(config)?),
    };
    info!("Using {} sentence store", store.name());
    Ok(store)
}
