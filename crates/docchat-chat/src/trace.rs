//! Run reporting to a LangSmith-compatible tracing service.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use docchat_core::config::TraceSettings;
use docchat_core::traits::ChatModel;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunRecord {
    pub id: Uuid,
    pub name: String,
    pub run_type: &'static str,
    pub inputs: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub session_name: String,
}

impl RunRecord {
    pub fn llm(
        name: &str,
        project: &str,
        prompt: &str,
        outcome: &Result<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        let (outputs, error) = match outcome {
            Ok(text) => (Some(json!({ "output": text })), None),
            Err(e) => (None, Some(format!("{e:#}"))),
        };
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            run_type: "llm",
            inputs: json!({ "prompt": prompt }),
            outputs,
            error,
            start_time,
            end_time: Utc::now(),
            session_name: project.to_string(),
        }
    }
}

pub struct RunTracer {
    client: Client,
    endpoint: String,
    api_key: String,
    project: String,
}

impl RunTracer {
    pub fn new(endpoint: &str, api_key: &str, project: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            project: project.to_string(),
        })
    }

    /// `None` unless tracing is enabled and both key and project are set.
    pub fn from_settings(settings: &TraceSettings) -> Result<Option<Self>> {
        if !settings.enabled { return Ok(None); }
        match (settings.api_key.as_deref(), settings.project.as_deref()) {
            (Some(key), Some(project)) => Ok(Some(Self::new(&settings.endpoint, key, project)?)),
            _ => Ok(None),
        }
    }

    pub fn project(&self) -> &str { &self.project }

    pub async fn post_run(&self, run: &RunRecord) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/runs", self.endpoint))
            .header("x-api-key", &self.api_key)
            .json(run)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("run upload failed ({}): {}", status, error_text));
        }
        debug!(run = %run.id, "run reported");
        Ok(())
    }
}

/// Reports every completion of the wrapped model. Reporting never fails the call.
pub struct TracedChatModel<M> {
    inner: M,
    name: String,
    tracer: Option<RunTracer>,
}

impl<M: ChatModel> TracedChatModel<M> {
    pub fn new(inner: M, name: impl Into<String>, tracer: Option<RunTracer>) -> Self {
        Self { inner, name: name.into(), tracer }
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for TracedChatModel<M> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let start = Utc::now();
        let outcome = self.inner.complete(prompt).await;
        if let Some(tracer) = &self.tracer {
            let run = RunRecord::llm(&self.name, tracer.project(), prompt, &outcome, start);
            if let Err(e) = tracer.post_run(&run).await {
                warn!(error = %e, "failed to report run");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, prompt: &str) -> Result<String> { Ok(prompt.to_uppercase()) }
    }

    #[test]
    fn run_record_serializes_outputs_or_error() {
        let ok = RunRecord::llm("gemma", "docs", "hi", &Ok("hello".into()), Utc::now());
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["run_type"], "llm");
        assert_eq!(v["session_name"], "docs");
        assert_eq!(v["inputs"]["prompt"], "hi");
        assert_eq!(v["outputs"]["output"], "hello");
        assert!(v.get("error").is_none());

        let failed = RunRecord::llm("gemma", "docs", "hi", &Err(anyhow!("boom")), Utc::now());
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["error"], "boom");
        assert!(v.get("outputs").is_none());
    }

    #[test]
    fn disabled_tracing_builds_no_tracer() {
        let settings = TraceSettings {
            api_key: Some("k".into()),
            project: Some("p".into()),
            ..TraceSettings::default()
        };
        assert!(RunTracer::from_settings(&settings).unwrap().is_none());
        let enabled = TraceSettings { enabled: true, ..settings };
        assert!(RunTracer::from_settings(&enabled).unwrap().is_some());
    }

    #[tokio::test]
    async fn unreachable_tracer_does_not_fail_completion() {
        let tracer = RunTracer::new("http://127.0.0.1:9", "k", "p").unwrap();
        let model = TracedChatModel::new(Echo, "echo", Some(tracer));
        assert_eq!(model.complete("abc").await.unwrap(), "ABC");
    }
}
