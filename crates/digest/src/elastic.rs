//! Elasticsearch bulk digest
//!
//! Stages consumed messages on an unbounded channel and posts them to the
//! `_bulk` API in NDJSON batches. The collector is the channel's sole
//! drain. Failed batches are logged, not retried; when the staging channel
//! closes, the pending partial batch is flushed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use logbay_common::config::DEFAULT_ES_BATCH_SIZE;
use logbay_common::error::{Error, Result};
use logbay_common::types::{Consumer, DigestKind};
use logbay_common::PointConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_HOST: &str = "http://localhost:9200";

/// Bulk action metadata preceding every document line.
const BULK_META_LINE: &str = r#"{ "index" : { } }"#;

#[derive(Debug)]
pub(crate) struct ElasticDigest {
    name: String,
    staging_tx: mpsc::UnboundedSender<String>,
}

impl ElasticDigest {
    pub(crate) fn start(config: &PointConfig) -> Result<Arc<Self>> {
        if config.es_index.is_empty() {
            return Err(Error::Config("index is required".to_string()));
        }

        if config.es_document.is_empty() {
            return Err(Error::Config("document is required".to_string()));
        }

        let host = if config.host.is_empty() {
            debug!("Host is not configured. Using {DEFAULT_HOST}");
            DEFAULT_HOST
        } else {
            &config.host
        };

        let batch_size = if config.es_batch_size == 0 {
            debug!("BatchSize is not configured. Using {DEFAULT_ES_BATCH_SIZE}");
            DEFAULT_ES_BATCH_SIZE
        } else {
            config.es_batch_size
        };

        let endpoint = bulk_url(host, &config.es_index, &config.es_document);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let (staging_tx, staging_rx) = mpsc::unbounded_channel();

        tokio::spawn(collect(staging_rx, client, endpoint.clone(), batch_size));

        info!("Created new elastic digest point. Endpoint: {endpoint}, BatchSize: {batch_size}");

        Ok(Arc::new(Self {
            name: config.name.clone(),
            staging_tx,
        }))
    }
}

#[async_trait]
impl Consumer for ElasticDigest {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DigestKind {
        DigestKind::Elastic
    }

    async fn consume(&self, msg: &str) -> Result<()> {
        self.staging_tx
            .send(msg.to_string())
            .map_err(|_| Error::External("staging channel closed".to_string()))
    }
}

fn bulk_url(host: &str, index: &str, document: &str) -> String {
    format!("{host}/{index}/{document}/_bulk")
}

/// Accumulate staged messages and post full batches; flush the remainder
/// when the channel closes.
async fn collect(
    mut rx: mpsc::UnboundedReceiver<String>,
    client: reqwest::Client,
    endpoint: String,
    batch_size: usize,
) {
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(msg) = rx.recv().await {
        batch.push(msg);

        if batch.len() >= batch_size {
            flush(&client, &endpoint, &mut batch).await;
        }
    }

    if !batch.is_empty() {
        flush(&client, &endpoint, &mut batch).await;
    }
}

async fn flush(client: &reqwest::Client, endpoint: &str, batch: &mut Vec<String>) {
    let count = batch.len();
    let body = bulk_body(batch);
    batch.clear();

    let result = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .send()
        .await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            debug!("Posted {count} messages to {endpoint}");
        }
        Ok(resp) => {
            warn!("request to {endpoint} returned {}", resp.status());
        }
        Err(e) => {
            error!("request to {endpoint} failed: {e}");
        }
    }
}

/// Render one bulk request body: a metadata line before every message,
/// every line newline-terminated.
fn bulk_body(msgs: &[String]) -> String {
    let mut body = String::new();

    for msg in msgs {
        body.push_str(BULK_META_LINE);
        body.push('\n');
        body.push_str(msg);
        body.push('\n');
    }

    body
}
