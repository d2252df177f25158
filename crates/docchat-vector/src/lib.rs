//! Vector store backends, index rebuild and similarity retrieval.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use docchat_core::config::{VectorBackend, VectorSettings};
use docchat_core::traits::VectorStore;

pub mod indexer;
pub mod memory;
pub mod qdrant;
pub mod retriever;

pub use indexer::{IndexReport, Indexer};
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use retriever::{reduce_hits, Retriever};

/// Open the configured backend.
pub fn open_store(settings: &VectorSettings) -> Result<Arc<dyn VectorStore>> {
    match settings.backend {
        VectorBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        VectorBackend::Qdrant => {
            let url = settings.url.as_deref().ok_or_else(|| {
                docchat_core::Error::MissingSettings(vec!["QDRANT_URL (vector.url)".into()])
            })?;
            Ok(Arc::new(QdrantStore::new(
                url,
                settings.api_key.clone(),
                settings.timeout_secs.map(Duration::from_secs),
                settings.upsert_batch_size,
            )?))
        }
    }
}
