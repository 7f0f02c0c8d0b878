//! Dispatcher
//!
//! One long-lived task per bound ingress: read its output channel, deliver
//! each message to every bound consumer in declared order. Consumer errors
//! are logged and never stop the task, so one broken digest cannot stall
//! its siblings. FIFO holds per (ingress, consumer) pair.

use tracing::{debug, warn};

use logbay_ingest::registry;

use crate::startup::BindingTable;

/// Start one fan-out task per binding-table entry. Entries whose ingress is
/// missing from the registry are skipped.
pub fn dispatch(bindings: BindingTable) {
    for (ingest_name, consumers) in bindings {
        let Some(point) = registry::get(&ingest_name) else {
            continue;
        };

        let Some(mut messages) = point.take_messages() else {
            warn!("Ingest point {ingest_name} is already being dispatched");
            continue;
        };

        debug!(
            "Dispatching {ingest_name} to {} consumer(s)",
            consumers.len()
        );

        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                for consumer in &consumers {
                    if let Err(e) = consumer.consume(&msg).await {
                        warn!(
                            "Consumer {} failed on message from {ingest_name}. Err: {e}",
                            consumer.name()
                        );
                    }
                }
            }

            debug!("Ingest point {ingest_name} closed its channel. Dispatch task exiting");
        });
    }
}
