//! Refusal guard: a pure validator plus a bounded re-prompt policy.

use anyhow::Result;
use tracing::warn;

use docchat_core::traits::ChatModel;

use crate::prompt::{summarize_prompt, FORBIDDEN_PHRASES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// The answer contained `phrase` and must be discarded.
    Retry { phrase: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedAnswer {
    pub text: String,
    pub retried: bool,
}

#[derive(Debug, Clone)]
pub struct RefusalGuard {
    phrases: Vec<String>,
    max_retries: usize,
}

impl Default for RefusalGuard {
    fn default() -> Self {
        Self::new(FORBIDDEN_PHRASES.iter().copied(), 1)
    }
}

impl RefusalGuard {
    pub fn new<'a>(phrases: impl IntoIterator<Item = &'a str>, max_retries: usize) -> Self {
        Self { phrases: phrases.into_iter().map(str::to_lowercase).collect(), max_retries }
    }

    pub fn check(&self, answer: &str) -> Verdict {
        let lower = answer.to_lowercase();
        match self.phrases.iter().find(|p| lower.contains(p.as_str())) {
            Some(phrase) => Verdict::Retry { phrase: phrase.clone() },
            None => Verdict::Accept,
        }
    }

    /// Validate `answer`; on a refusal, re-invoke `model` with the summarize
    /// prompt. The last fallback is returned as-is.
    pub async fn enforce(
        &self,
        model: &dyn ChatModel,
        context: &str,
        answer: String,
    ) -> Result<GuardedAnswer> {
        let mut text = answer;
        let mut attempts = 0;
        while attempts < self.max_retries {
            let Verdict::Retry { phrase } = self.check(&text) else { break };
            warn!(
                phrase = %phrase,
                attempt = attempts + 1,
                "answer asked for the document; re-prompting"
            );
            text = model.complete(&summarize_prompt(context)).await?;
            attempts += 1;
        }
        Ok(GuardedAnswer { text, retried: attempts > 0 })
    }
}
