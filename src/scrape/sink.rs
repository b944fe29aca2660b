// src/scrape/sink.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::scrape::types::{NormalizedRecord, Sink};

pub const INGEST_PATH: &str = "/api/v1/events/ingest";

/// Posts each batch to the ingestion API in a single request.
#[derive(Clone)]
pub struct HttpIngestSink {
    endpoint: String,
    client: Client,
}

#[derive(Serialize)]
struct IngestPayload<'a> {
    events: &'a [NormalizedRecord],
}

impl HttpIngestSink {
    pub fn new(api_base: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("building ingestion http client")?;
        Ok(Self::with_client(api_base, client))
    }

    pub fn with_client(api_base: &str, client: Client) -> Self {
        Self {
            endpoint: format!("{}{}", api_base.trim_end_matches('/'), INGEST_PATH),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Sink for HttpIngestSink {
    async fn deliver(&self, source: &str, records: Vec<NormalizedRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let rsp = self
            .client
            .post(&self.endpoint)
            .json(&IngestPayload { events: &records })
            .send()
            .await
            .with_context(|| format!("sending {} records from {source}", records.len()))?;

        let status = rsp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = rsp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "ingestion failed with status {}: {}",
                status.as_u16(),
                body.trim()
            ));
        }

        tracing::debug!(source, records = records.len(), "ingestion accepted batch");
        Ok(())
    }
}
