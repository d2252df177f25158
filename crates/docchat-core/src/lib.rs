//! Core types, configuration, document loading and chunking for docchat.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use chunker::{chunk_text, ChunkingConfig};
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use loader::DocumentLoader;
pub use traits::{ChatModel, Embedder, VectorStore};
pub use types::*;
