//! Redis pub/sub ingress
//!
//! Bridges a Redis pattern subscription into the message pipeline. The
//! subscription task reconnects with capped exponential backoff when the
//! connection or the stream is lost.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use logbay_common::error::{Error, Result};
use logbay_common::pipeline::{self, MessageSender, OFFER_BACKOFF};
use logbay_common::types::IngestKind;
use logbay_common::PointConfig;

use crate::IngestPoint;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 6379;

pub(crate) fn start(config: &PointConfig) -> Result<Arc<IngestPoint>> {
    if config.pattern.is_empty() {
        return Err(Error::Config("channel can not be empty".to_string()));
    }

    let host = if config.host.is_empty() {
        debug!("Host is not configured. Using {DEFAULT_HOST}");
        DEFAULT_HOST
    } else {
        &config.host
    };

    let port = if config.port == 0 {
        debug!("Port is not configured. Using {DEFAULT_PORT}");
        DEFAULT_PORT
    } else {
        config.port
    };

    let client = redis::Client::open(format!("redis://{host}:{port}/"))
        .context("Failed to create Redis client")?;

    let (tx, rx) = pipeline::bounded(config.buffer);
    let point = IngestPoint::new(IngestKind::Redis, &config.name, rx);

    tokio::spawn(subscribe_loop(client, config.pattern.clone(), tx));

    Ok(point)
}

/// Keep the pattern subscription alive for the life of the process.
async fn subscribe_loop(client: redis::Client, pattern: String, out: MessageSender) {
    let mut consecutive_failures = 0u32;

    loop {
        match run_subscription(&client, &pattern, &out).await {
            Ok(()) => {
                warn!("Subscription to {pattern} ended");
                consecutive_failures = 0;
            }
            Err(e) => {
                consecutive_failures += 1;
                error!("Redis subscription error on {pattern}: {e}");
            }
        }

        // Exponential backoff: 1s, 2s, 4s, ..., max 64s
        let backoff = Duration::from_secs(2u64.saturating_pow(consecutive_failures.min(6)));
        warn!("Resubscribing to {pattern} in {backoff:?}");
        tokio::time::sleep(backoff).await;
    }
}

async fn run_subscription(
    client: &redis::Client,
    pattern: &str,
    out: &MessageSender,
) -> Result<()> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .context("Failed to connect to Redis")?;
    pubsub
        .psubscribe(pattern)
        .await
        .with_context(|| format!("Failed to subscribe to {pattern}"))?;

    info!("Subscribed to {pattern}");

    let mut stream = pubsub.on_message();

    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to read message payload: {e}");
                continue;
            }
        };

        if !out.offer(payload) {
            tokio::time::sleep(OFFER_BACKOFF).await;
        }
    }

    Ok(())
}
