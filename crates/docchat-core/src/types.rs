//! Domain types shared by the loader, the vector stores and the chat layer.

use serde::{Deserialize, Serialize};

pub type PointId = String;

/// Plain text extracted from one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub text: String,
}

/// Outcome of reading a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text(String),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub file_name: String,
    pub extraction: Extraction,
}

impl LoadedFile {
    /// Extracted text, or `""` when the reader failed.
    pub fn text(&self) -> &str {
        match &self.extraction {
            Extraction::Text(text) => text,
            Extraction::Failed { .. } => "",
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.extraction {
            Extraction::Failed { reason } => Some(reason),
            Extraction::Text(_) => None,
        }
    }
}

/// Everything the loader produced for one folder, in traversal order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub files: Vec<LoadedFile>,
}

impl Corpus {
    pub fn len(&self) -> usize { self.files.len() }

    pub fn is_empty(&self) -> bool { self.files.is_empty() }

    /// One document per loaded file. Failed files degrade to empty text.
    pub fn documents(&self) -> Vec<Document> {
        self.files
            .iter()
            .map(|f| Document { file_name: f.file_name.clone(), text: f.text().to_string() })
            .collect()
    }

    /// `(file_name, reason)` for every file whose reader failed.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.files
            .iter()
            .filter_map(|f| f.failure().map(|reason| (f.file_name.as_str(), reason)))
            .collect()
    }
}

/// Metadata stored next to every vector.
///
/// Both keys are optional on the way back: a store may hold points written by
/// other tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ChunkPayload {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { text: Some(text.into()), source: Some(source.into()) }
    }
}

/// A chunk staged for writing: id, embedding and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A query hit. `score` is cosine similarity, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: Option<f32>,
    pub payload: Option<ChunkPayload>,
}

/// Reduced result of a top-k query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    pub context: String,
    pub sources: Vec<String>,
    pub max_score: f32,
}
