use crate::core::outcome::RawOutcome;
use crate::core::{CallbackOutcome, ExecutionBackend, Record};
use crate::utils::error::{LabError, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const REMOTE_BACKEND: &str = "remote";

#[derive(Serialize)]
struct RunnerRequest<'a> {
    events: &'a [Record],
    filter: &'a str,
}

/// Sends the whole batch to a runner service in one request.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    runner_url: String,
}

impl RemoteBackend {
    pub fn new(runner_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            runner_url: runner_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl ExecutionBackend for RemoteBackend {
    fn name(&self) -> &str {
        REMOTE_BACKEND
    }

    async fn execute(&self, records: &[Record], callback: &str) -> Result<Vec<CallbackOutcome>> {
        tracing::debug!("Making runner request to: {}", self.runner_url);
        let response = self
            .client
            .post(&self.runner_url)
            .json(&RunnerRequest {
                events: records,
                filter: callback,
            })
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Runner response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LabError::backend(
                REMOTE_BACKEND,
                format!("runner responded with {}: {}", status, body.trim()),
            ));
        }

        let raw: Vec<RawOutcome> = response.json().await?;
        if raw.len() != records.len() {
            return Err(LabError::BatchShapeMismatch {
                records: records.len(),
                outcomes: raw.len(),
            });
        }

        Ok(raw.into_iter().map(CallbackOutcome::from).collect())
    }
}
