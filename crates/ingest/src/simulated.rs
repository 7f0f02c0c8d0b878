//! Simulated ingress
//!
//! Emits random alphanumeric payloads at a configured rate. Used for load
//! testing the routing fabric without external producers.

use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use logbay_common::config::{DEFAULT_MSG_LENGTH, DEFAULT_MSG_PER_SEC};
use logbay_common::pipeline::{self, MessageSender, OFFER_BACKOFF};
use logbay_common::types::IngestKind;
use logbay_common::PointConfig;

use crate::IngestPoint;

/// Upper bound of the per-instance random interval offset, in microseconds.
/// The offset desynchronises simulators that start together.
const MAX_JITTER_MICROS: u64 = 5000;

pub(crate) fn start(config: &PointConfig) -> Arc<IngestPoint> {
    let msg_length = if config.msg_length == 0 {
        debug!("MsgLength is not defined. Using {DEFAULT_MSG_LENGTH}");
        DEFAULT_MSG_LENGTH
    } else {
        config.msg_length
    };

    let msg_per_sec = if config.msg_per_sec == 0 {
        debug!("MsgPerSec is not defined. Using {DEFAULT_MSG_PER_SEC}");
        DEFAULT_MSG_PER_SEC
    } else {
        config.msg_per_sec
    };

    let (tx, rx) = pipeline::bounded(config.buffer);
    let point = IngestPoint::new(IngestKind::Simulated, &config.name, rx);

    tokio::spawn(generate(msg_length, msg_per_sec, tx));

    point
}

async fn generate(msg_length: usize, msg_per_sec: u64, out: MessageSender) {
    let jitter = rand::thread_rng().gen_range(0..MAX_JITTER_MICROS);
    let period = Duration::from_micros(period_micros(msg_per_sec, jitter));

    let mut ticker = tokio::time::interval(period);

    loop {
        ticker.tick().await;

        if !out.offer(random_message(msg_length)) {
            tokio::time::sleep(OFFER_BACKOFF).await;
        }
    }
}

/// Inter-message interval in microseconds: `60000/(msgPerSec*60)` plus the
/// instance's fixed jitter. Clamped to stay a valid timer period.
fn period_micros(msg_per_sec: u64, jitter: u64) -> u64 {
    (60_000 / (msg_per_sec * 60) + jitter).max(1)
}

fn random_message(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
