use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use docchat_core::chunker::{chunk_text, ChunkingConfig};
use docchat_core::traits::{Embedder, VectorStore};
use docchat_core::types::{ChunkPayload, Document, Point};

/// Outcome of one full rebuild of the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub files: usize,
    pub chunks: usize,
    /// `false` when no chunk could be produced. The collection then exists but is empty.
    pub indexed: bool,
}

/// Rebuilds a single named collection from scratch on every call.
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    collection: String,
    chunking: ChunkingConfig,
    embed_batch_size: usize,
    show_progress: bool,
}

pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

impl Indexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        collection: impl Into<String>,
        chunking: ChunkingConfig,
    ) -> docchat_core::Result<Self> {
        chunking.validate()?;
        Ok(Self {
            store,
            embedder,
            collection: collection.into(),
            chunking,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Upper bound on the chunks passed to one `embed_batch` call. Clamped to at least 1.
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    pub async fn build(&self, documents: &[Document]) -> Result<IndexReport> {
        if self.store.collection_exists(&self.collection).await? {
            self.store
                .delete_collection(&self.collection)
                .await
                .context("dropping previous index")?;
        }
        self.store
            .create_collection(&self.collection, self.embedder.dim())
            .await
            .context("creating collection")?;

        let staged: Vec<(String, Vec<String>)> = documents
            .iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| Ok((d.file_name.clone(), chunk_text(&d.text, &self.chunking)?)))
            .collect::<docchat_core::Result<_>>()?;
        let total: usize = staged.iter().map(|(_, chunks)| chunks.len()).sum();

        if total == 0 {
            warn!(collection = %self.collection, files = documents.len(), "no text to index");
            return Ok(IndexReport { files: documents.len(), chunks: 0, indexed: false });
        }

        let pb = self.progress_bar(total);
        let mut points = Vec::with_capacity(total);
        for (source, chunks) in &staged {
            for batch in chunks.chunks(self.embed_batch_size) {
                let vectors = self
                    .embedder
                    .embed_batch(batch)
                    .with_context(|| format!("embedding {source}"))?;
                for (text, vector) in batch.iter().zip(vectors) {
                    points.push(Point {
                        id: Uuid::new_v4().to_string(),
                        vector,
                        payload: ChunkPayload::new(text.as_str(), source.as_str()),
                    });
                }
                pb.set_position(points.len() as u64);
            }
        }
        pb.finish_with_message("embedded");

        self.store.upsert(&self.collection, &points).await.context("writing points")?;
        info!(
            collection = %self.collection,
            files = documents.len(),
            chunks = points.len(),
            "index rebuilt"
        );
        Ok(IndexReport { files: documents.len(), chunks: points.len(), indexed: true })
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress { return ProgressBar::hidden(); }
        let pb = ProgressBar::new(total as u64);
        let template = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                        {pos}/{len} chunks ({percent}%) {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
