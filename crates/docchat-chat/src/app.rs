//! Application context tying loader, indexer and answer generator to a session.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use docchat_core::config::Settings;
use docchat_core::loader::DocumentLoader;
use docchat_core::traits::{ChatModel, Embedder, VectorStore};
use docchat_embed::get_default_embedder;
use docchat_vector::{open_store, IndexReport, Indexer, Retriever};

use crate::answer::{Answer, AnswerGenerator};
use crate::gemini::GeminiChat;
use crate::session::Session;
use crate::trace::{RunTracer, TracedChatModel};

/// Result of one ingestion, including per-file extraction failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub report: IndexReport,
    pub failures: Vec<(String, String)>,
}

pub struct DocChat {
    loader: DocumentLoader,
    indexer: Indexer,
    generator: AnswerGenerator,
}

impl DocChat {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let collection = settings.vector.collection.clone();
        let indexer =
            Indexer::new(store.clone(), embedder.clone(), collection.clone(), settings.chunking)?
                .with_embed_batch_size(settings.embedding.batch_size);
        let retriever = Retriever::new(store, embedder, collection);
        let generator = AnswerGenerator::new(
            retriever,
            model,
            settings.retrieval.top_k,
            settings.retrieval.min_score,
        );
        Ok(Self { loader: DocumentLoader::new(), indexer, generator })
    }

    /// Wire the configured embedder, vector store and traced chat model.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding)?;
        let store = open_store(&settings.vector)?;
        let chat = GeminiChat::from_settings(&settings.llm)?;
        let name = chat.model().to_string();
        let tracer = RunTracer::from_settings(&settings.trace)?;
        let model: Arc<dyn ChatModel> = Arc::new(TracedChatModel::new(chat, name, tracer));
        Self::new(settings, store, embedder, model)
    }

    pub fn without_progress(mut self) -> Self {
        self.indexer = self.indexer.with_progress(false);
        self
    }

    /// Copy `files` into a scratch directory, load and index them, then update
    /// the session's mode and file count. The scratch directory is removed on return.
    pub async fn ingest_files(
        &self,
        session: &mut Session,
        files: &[PathBuf],
    ) -> Result<IngestOutcome> {
        let scratch = tempfile::TempDir::new().context("creating upload directory")?;
        for file in files {
            let name = file.file_name().ok_or_else(|| anyhow!("not a file: {}", file.display()))?;
            std::fs::copy(file, scratch.path().join(name))
                .with_context(|| format!("copying {}", file.display()))?;
        }
        let outcome = self.ingest_dir(scratch.path()).await?;
        session.indexed = outcome.report.indexed;
        session.file_count = files.len();
        Ok(outcome)
    }

    /// Load and index every supported file under `dir` without touching a session.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestOutcome> {
        let corpus = self.loader.load_dir(dir);
        let failures = corpus
            .failures()
            .into_iter()
            .map(|(f, r)| (f.to_string(), r.to_string()))
            .collect();
        let report = self.indexer.build(&corpus.documents()).await?;
        info!(
            files = report.files,
            chunks = report.chunks,
            indexed = report.indexed,
            "ingestion finished"
        );
        Ok(IngestOutcome { report, failures })
    }

    /// Run one chat turn. On error the transcript keeps only the user message.
    pub async fn ask(&self, session: &mut Session, prompt: &str) -> Result<Answer> {
        session.begin_turn(prompt);
        let answer = self.generator.answer(prompt, session.indexed).await?;
        session.record_answer(&answer.text, answer.sources.clone());
        Ok(answer)
    }
}
