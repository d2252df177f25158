//! Similarity-gated answer generation.
//!
//! A query is answered from the indexed documents only when the best hit
//! reaches `min_score` and the retrieved text is non-blank. Everything else
//! goes straight to the model as plain chat.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use docchat_core::traits::ChatModel;
use docchat_core::types::Retrieval;
use docchat_vector::Retriever;

use crate::guard::RefusalGuard;
use crate::prompt::grounded_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    Direct,
    Grounded { retried: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Distinct source file names; `None` for direct answers.
    pub sources: Option<Vec<String>>,
    pub mode: AnswerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    NoIndex,
    LowScore,
    EmptyContext,
    Grounded,
}

/// Decide how to answer given whether an index exists and what retrieval found.
pub fn route(indexed: bool, retrieval: Option<&Retrieval>, min_score: f32) -> Route {
    let Some(r) = retrieval.filter(|_| indexed) else { return Route::NoIndex };
    if r.max_score < min_score {
        Route::LowScore
    } else if r.context.trim().is_empty() {
        Route::EmptyContext
    } else {
        Route::Grounded
    }
}

pub struct AnswerGenerator {
    retriever: Retriever,
    model: Arc<dyn ChatModel>,
    guard: RefusalGuard,
    top_k: usize,
    min_score: f32,
}

impl AnswerGenerator {
    pub fn new(
        retriever: Retriever,
        model: Arc<dyn ChatModel>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self { retriever, model, guard: RefusalGuard::default(), top_k, min_score }
    }

    pub async fn answer(&self, query: &str, indexed: bool) -> Result<Answer> {
        let retrieval = match indexed {
            true => Some(self.retriever.retrieve(query, self.top_k).await?),
            false => None,
        };
        let decision = route(indexed, retrieval.as_ref(), self.min_score);
        info!(route = ?decision, max_score = retrieval.as_ref().map(|r| r.max_score), "answering");

        match (decision, retrieval) {
            (Route::Grounded, Some(r)) => {
                let first = self.model.complete(&grounded_prompt(&r.context, query)).await?;
                let guarded = self.guard.enforce(self.model.as_ref(), &r.context, first).await?;
                Ok(Answer {
                    text: guarded.text,
                    sources: Some(r.sources),
                    mode: AnswerMode::Grounded { retried: guarded.retried },
                })
            }
            _ => Ok(Answer {
                text: self.model.complete(query).await?,
                sources: None,
                mode: AnswerMode::Direct,
            }),
        }
    }
}
