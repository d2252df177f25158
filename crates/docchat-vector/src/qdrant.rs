//! Qdrant over its REST API.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use docchat_core::traits::VectorStore;
use docchat_core::types::{ChunkPayload, Point, ScoredPoint};

pub struct QdrantStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    upsert_batch_size: usize,
}

impl QdrantStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
        upsert_batch_size: usize,
    ) -> Result<Self> {
        reqwest::Url::parse(base_url)
            .map_err(|e| anyhow!("Invalid Qdrant URL '{}': {}", base_url, e))?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout { builder = builder.timeout(timeout); }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            upsert_batch_size: upsert_batch_size.max(1),
        })
    }

    fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("api-key", key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let response = self.authed(req).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Qdrant {} failed ({}): {}", what, status, error_text));
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let response =
            self.send(self.client.get(self.url("/collections")), "list collections").await?;
        parse_collections(&response.json::<Value>().await?)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let url = self.url(&format!("/collections/{name}"));
        self.send(self.client.delete(&url), "delete collection").await?;
        debug!(collection = name, "deleted collection");
        Ok(())
    }

    async fn create_collection(&self, name: &str, dim: usize) -> Result<()> {
        let url = self.url(&format!("/collections/{name}"));
        let body = create_collection_body(dim);
        self.send(self.client.put(&url).json(&body), "create collection").await?;
        debug!(collection = name, dim, "created collection");
        Ok(())
    }

    async fn upsert(&self, name: &str, points: &[Point]) -> Result<()> {
        let url = self.url(&format!("/collections/{name}/points?wait=true"));
        for batch in points.chunks(self.upsert_batch_size) {
            self.send(self.client.put(&url).json(&upsert_body(batch)), "upsert").await?;
            debug!(collection = name, points = batch.len(), "upserted batch");
        }
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let url = self.url(&format!("/collections/{name}/points/query"));
        let body = query_body(vector, limit);
        let response = self.send(self.client.post(&url).json(&body), "query").await?;
        parse_query_response(&response.json::<Value>().await?)
    }
}

pub(crate) fn create_collection_body(dim: usize) -> Value {
    json!({ "vectors": { "size": dim, "distance": "Cosine" } })
}

pub(crate) fn upsert_body(points: &[Point]) -> Value {
    let points: Vec<Value> = points
        .iter()
        .map(|p| json!({ "id": p.id, "vector": p.vector, "payload": p.payload }))
        .collect();
    json!({ "points": points })
}

pub(crate) fn query_body(vector: &[f32], limit: usize) -> Value {
    json!({ "query": vector, "limit": limit, "with_payload": true })
}

pub(crate) fn parse_collections(body: &Value) -> Result<Vec<String>> {
    let collections = body
        .pointer("/result/collections")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("unexpected collections response: {}", body))?;
    Ok(collections
        .iter()
        .filter_map(|c| c.get("name").and_then(Value::as_str).map(str::to_string))
        .collect())
}

#[derive(Deserialize)]
struct RawHit {
    id: Value,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    payload: Option<ChunkPayload>,
}

/// Accepts both the `query` shape (`result.points`) and the legacy `search`
/// shape (`result` is the list).
pub(crate) fn parse_query_response(body: &Value) -> Result<Vec<ScoredPoint>> {
    let hits = body
        .pointer("/result/points")
        .or_else(|| body.get("result").filter(|r| r.is_array()))
        .ok_or_else(|| anyhow!("unexpected query response: {}", body))?;
    let hits: Vec<RawHit> = serde_json::from_value(hits.clone())?;
    Ok(hits
        .into_iter()
        .map(|h| ScoredPoint {
            id: match h.id {
                Value::String(s) => s,
                other => other.to_string(),
            },
            score: h.score,
            payload: h.payload,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_uses_cosine() {
        assert_eq!(
            create_collection_body(384),
            json!({"vectors": {"size": 384, "distance": "Cosine"}})
        );
    }

    #[test]
    fn upsert_body_carries_text_and_source() {
        let point = Point {
            id: "a1".into(),
            vector: vec![0.5, 0.5],
            payload: ChunkPayload::new("hello", "a.txt"),
        };
        let body = upsert_body(&[point]);
        assert_eq!(body["points"][0]["id"], "a1");
        assert_eq!(body["points"][0]["payload"], json!({"text": "hello", "source": "a.txt"}));
        assert_eq!(body["points"][0]["vector"], json!([0.5, 0.5]));
    }

    #[test]
    fn parses_collection_names() {
        let body = json!({
            "result": {"collections": [{"name": "multimodal_rag"}, {"name": "other"}]},
            "status": "ok"
        });
        assert_eq!(parse_collections(&body).unwrap(), vec!["multimodal_rag", "other"]);
        assert!(parse_collections(&json!({"status": "ok"})).is_err());
    }

    #[test]
    fn parses_hits_with_missing_fields() {
        let body = json!({"result": {"points": [
            {
                "id": "u-1", "version": 3, "score": 0.82,
                "payload": {"text": "alpha", "source": "a.pdf"}
            },
            {"id": 7, "version": 3, "score": null, "payload": {"text": "beta"}},
            {"id": "u-3", "version": 3}
        ]}});
        let hits = parse_query_response(&body).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].score, Some(0.82));
        assert_eq!(hits[0].payload.as_ref().and_then(|p| p.source.as_deref()), Some("a.pdf"));
        assert_eq!(hits[1].id, "7");
        assert_eq!(hits[1].score, None);
        assert_eq!(hits[1].payload.as_ref().and_then(|p| p.source.as_deref()), None);
        assert!(hits[2].payload.is_none());
    }

    #[test]
    fn parses_legacy_search_shape() {
        let body =
            json!({"result": [{"id": "x", "score": 0.4, "payload": {"text": "t", "source": "s"}}]});
        assert_eq!(parse_query_response(&body).unwrap().len(), 1);
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(QdrantStore::new("not a url", None, None, 10).is_err());
    }
}
