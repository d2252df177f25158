use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use docchat_core::traits::{Embedder, VectorStore};
use docchat_core::types::{Retrieval, ScoredPoint};

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        collection: impl Into<String>,
    ) -> Self {
        Self { store, embedder, collection: collection.into() }
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval> {
        let vector = self.embedder.embed_query(query)?;
        let hits = self.store.query(&self.collection, &vector, k).await?;
        let retrieval = reduce_hits(&hits);
        debug!(
            hits = hits.len(),
            max_score = retrieval.max_score,
            sources = retrieval.sources.len(),
            "retrieved"
        );
        Ok(retrieval)
    }
}

/// Join texts in hit order, keep distinct sources in first-seen order, and
/// take the best score (0.0 when there is none).
pub fn reduce_hits(hits: &[ScoredPoint]) -> Retrieval {
    let mut texts = Vec::with_capacity(hits.len());
    let mut sources: Vec<String> = Vec::new();
    let mut max_score = 0.0f32;
    for hit in hits {
        if let Some(payload) = &hit.payload {
            if let Some(text) = &payload.text { texts.push(text.as_str()); }
            if let Some(source) = &payload.source {
                if !sources.contains(source) { sources.push(source.clone()); }
            }
        }
        max_score = max_score.max(hit.score.unwrap_or(0.0));
    }
    Retrieval { context: texts.join("\n"), sources, max_score }
}
