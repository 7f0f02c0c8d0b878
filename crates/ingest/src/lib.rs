/*!
 * Ingress Endpoints
 *
 * Every ingress produces a stream of text log lines on a bounded output
 * channel:
 *
 * ```text
 * TLS listener ──┐
 * Redis psubscribe ──┼──> bounded pipeline ──> dispatcher ──> consumers
 * simulator ──┘
 * ```
 *
 * Construction goes through [`create`], which dispatches on the configured
 * `Type`, applies defaults, validates required fields, and registers the
 * point in the process-wide [`registry`]. After construction an ingress
 * never terminates on its own; transient I/O errors are logged and the
 * owning task carries on.
 */

mod redis;
mod simulated;
mod tls;

pub mod registry;

use std::sync::{Arc, Mutex};

use tracing::info;

use logbay_common::error::{Error, Result};
use logbay_common::pipeline::MessageReceiver;
use logbay_common::types::IngestKind;
use logbay_common::PointConfig;

/// A constructed ingress endpoint.
///
/// Owns the reader half of its output pipeline until the dispatcher claims
/// it with [`IngestPoint::take_messages`]. The producer half lives inside
/// the endpoint's reader task.
#[derive(Debug)]
pub struct IngestPoint {
    kind: IngestKind,
    name: String,
    receiver: Mutex<Option<MessageReceiver>>,
}

impl IngestPoint {
    pub fn new(kind: IngestKind, name: &str, receiver: MessageReceiver) -> Arc<Self> {
        Arc::new(Self {
            kind,
            name: name.to_string(),
            receiver: Mutex::new(Some(receiver)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> IngestKind {
        self.kind
    }

    /// Hand out the output channel. Each ingress has exactly one reader, so
    /// this succeeds once; later calls return `None`.
    pub fn take_messages(&self) -> Option<MessageReceiver> {
        self.receiver.lock().expect("receiver lock poisoned").take()
    }
}

/// Install the process-wide rustls crypto provider.
///
/// Must run once before the first TLS ingress is built; both rustls and
/// reqwest link crypto providers, so the choice has to be made explicit.
pub fn install_crypto_provider() {
    let _ = tokio_rustls::rustls::crypto::ring::default_provider().install_default();
}

/// Construct an ingress endpoint from its configuration and register it.
///
/// Disabled entries are the caller's job to skip. Duplicate names and
/// unknown or reserved types are errors; so is missing required
/// configuration for the specific kind.
pub async fn create(config: &PointConfig) -> Result<Arc<IngestPoint>> {
    let kind: IngestKind = config.kind.parse()?;

    info!("Starting {} ingest point. Type: {}", config.name, kind);

    if registry::get(&config.name).is_some() {
        return Err(Error::Duplicate(config.name.clone()));
    }

    let point = match kind {
        IngestKind::Tls => tls::start(config).await?,
        IngestKind::Redis => redis::start(config)?,
        IngestKind::Simulated => simulated::start(config),
        IngestKind::Https => {
            return Err(Error::Config(format!(
                "ingest point type {kind} is not implemented"
            )));
        }
    };

    registry::put(&config.name, Arc::clone(&point));
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logbay_common::pipeline;

    #[tokio::test]
    async fn test_unknown_type_is_rejected() {
        let config = PointConfig {
            name: "mystery".to_string(),
            kind: "carrier-pigeon".to_string(),
            ..Default::default()
        };

        let err = create(&config).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(registry::get("mystery").is_none());
    }

    #[tokio::test]
    async fn test_reserved_https_type_is_rejected() {
        let config = PointConfig {
            name: "https-in".to_string(),
            kind: "https".to_string(),
            ..Default::default()
        };

        let err = create(&config).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(registry::get("https-in").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let config = PointConfig {
            name: "dup-sim".to_string(),
            kind: "simulated".to_string(),
            ..Default::default()
        };

        let first = create(&config).await.unwrap();
        let err = create(&config).await.unwrap_err();

        assert!(matches!(err, Error::Duplicate(_)));
        // The first registration stays intact.
        let registered = registry::get("dup-sim").unwrap();
        assert!(Arc::ptr_eq(&first, &registered));
    }

    #[test]
    fn test_messages_are_taken_once() {
        let (_tx, rx) = pipeline::bounded(1);
        let point = IngestPoint::new(IngestKind::Simulated, "take-once", rx);

        assert!(point.take_messages().is_some());
        assert!(point.take_messages().is_none());
    }
}
