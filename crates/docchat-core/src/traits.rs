use async_trait::async_trait;

use crate::types::{Point, ScoredPoint};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// A vector database holding named collections. Distance is always cosine.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_collections(&self) -> anyhow::Result<Vec<String>>;
    async fn delete_collection(&self, name: &str) -> anyhow::Result<()>;
    async fn create_collection(&self, name: &str, dim: usize) -> anyhow::Result<()>;
    async fn upsert(&self, name: &str, points: &[Point]) -> anyhow::Result<()>;
    /// Top-`limit` points by descending similarity.
    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredPoint>>;

    async fn collection_exists(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.list_collections().await?.iter().any(|c| c == name))
    }
}

/// Single-turn text completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}
