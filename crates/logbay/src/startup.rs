//! Startup wiring
//!
//! Turns the configuration record into running endpoints and the binding
//! table the dispatcher consumes. Endpoint failures are logged and skipped;
//! the daemon starts with whatever remains.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, warn};

use logbay_common::types::Consumer;
use logbay_common::PointConfig;
use logbay_ingest::registry;

/// Ingress name → consumers bound to it, in each digest's declared order.
pub type BindingTable = HashMap<String, Vec<Arc<dyn Consumer>>>;

/// Construct and register every enabled ingress endpoint.
pub async fn prepare_ingests(points: &HashMap<String, PointConfig>) {
    for (name, config) in points {
        if config.disabled {
            debug!("Ingest point {name} is disabled. Skipping");
            continue;
        }

        let mut config = config.clone();
        config.name = name.clone();

        if let Err(e) = logbay_ingest::create(&config).await {
            error!("Failed to create ingest point. Err: {e}");
        }
    }
}

/// Construct every enabled digest and assemble the binding table from the
/// digests' `Ingests` lists. Bindings naming an unknown ingress are warned
/// about and dropped; the digest's other bindings proceed.
pub async fn prepare_digests(points: &HashMap<String, PointConfig>) -> BindingTable {
    let mut bindings = BindingTable::new();

    for (name, config) in points {
        if config.disabled {
            debug!("Digest point {name} is disabled. Skipping");
            continue;
        }

        let mut config = config.clone();
        config.name = name.clone();

        let consumer = match logbay_digest::create(&config).await {
            Ok(consumer) => consumer,
            Err(e) => {
                error!("Failed to create digest point. Err: {e}");
                continue;
            }
        };

        for ingest_name in &config.ingests {
            if registry::get(ingest_name).is_none() {
                warn!(
                    "DigestPoint {name} has {ingest_name} IngestPoint configured, \
                     but no such IngestPoint exists"
                );
                continue;
            }

            debug!("{name} consuming from {ingest_name}");
            bindings
                .entry(ingest_name.clone())
                .or_default()
                .push(Arc::clone(&consumer));
        }
    }

    bindings
}
