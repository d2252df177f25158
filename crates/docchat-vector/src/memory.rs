//! In-process store with exact cosine search. Nothing is persisted.

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use docchat_core::traits::VectorStore;
use docchat_core::types::{Point, ScoredPoint};

#[derive(Default)]
struct Collection {
    dim: usize,
    points: BTreeMap<String, Point>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self, name: &str) -> usize {
        self.collections.read().map(|c| c.get(name).map_or(0, |c| c.points.len())).unwrap_or(0)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

fn poisoned() -> anyhow::Error { anyhow!("memory store lock poisoned") }

#[async_trait]
impl VectorStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().map_err(|_| poisoned())?.remove(name);
        Ok(())
    }

    async fn create_collection(&self, name: &str, dim: usize) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        ensure!(!collections.contains_key(name), "collection '{}' already exists", name);
        collections.insert(name.to_string(), Collection { dim, points: BTreeMap::new() });
        Ok(())
    }

    async fn upsert(&self, name: &str, points: &[Point]) -> Result<()> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| anyhow!("collection '{}' not found", name))?;
        for p in points {
            ensure!(
                p.vector.len() == collection.dim,
                "vector dim {} != collection dim {}",
                p.vector.len(),
                collection.dim
            );
            collection.points.insert(p.id.clone(), p.clone());
        }
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let collection =
            collections.get(name).ok_or_else(|| anyhow!("collection '{}' not found", name))?;
        let mut hits: Vec<ScoredPoint> = collection
            .points
            .values()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: Some(cosine_similarity(vector, &p.vector)),
                payload: Some(p.payload.clone()),
            })
            .collect();
        hits.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_core::types::ChunkPayload;

    fn point(id: &str, v: Vec<f32>) -> Point {
        Point { id: id.into(), vector: v, payload: ChunkPayload::new(id, "src.txt") }
    }

    #[tokio::test]
    async fn query_orders_by_cosine_and_limits() {
        let store = MemoryStore::new();
        store.create_collection("c", 2).await.unwrap();
        let points =
            [point("x", vec![1.0, 0.0]), point("y", vec![0.0, 1.0]), point("xy", vec![1.0, 1.0])];
        store.upsert("c", &points).await.unwrap();
        let hits = store.query("c", &[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["x", "xy"]);
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
    }

    #[tokio::test]
    async fn delete_then_create_empties_collection() {
        let store = MemoryStore::new();
        store.create_collection("c", 2).await.unwrap();
        store.upsert("c", &[point("x", vec![1.0, 0.0])]).await.unwrap();
        assert!(store.collection_exists("c").await.unwrap());
        store.delete_collection("c").await.unwrap();
        store.create_collection("c", 2).await.unwrap();
        assert_eq!(store.len("c"), 0);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension_and_unknown_collection() {
        let store = MemoryStore::new();
        store.create_collection("c", 3).await.unwrap();
        assert!(store.upsert("c", &[point("x", vec![1.0])]).await.is_err());
        assert!(store.query("missing", &[1.0], 1).await.is_err());
    }

    #[test]
    fn zero_vectors_have_zero_similarity() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
