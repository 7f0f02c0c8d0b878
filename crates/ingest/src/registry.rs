//! Process-wide ingress registry
//!
//! Name → ingress map with insert-once semantics. Populated while endpoints
//! are constructed at startup; the digest-binding phase and the dispatcher
//! only read it afterwards.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::IngestPoint;

static INGEST_POINTS: Lazy<DashMap<String, Arc<IngestPoint>>> = Lazy::new(DashMap::new);

/// Look up an ingress by name.
pub fn get(name: &str) -> Option<Arc<IngestPoint>> {
    INGEST_POINTS.get(name).map(|entry| Arc::clone(entry.value()))
}

/// Register an ingress under its name. A second `put` for an existing name
/// keeps the first entry and logs a warning.
pub fn put(name: &str, point: Arc<IngestPoint>) {
    match INGEST_POINTS.entry(name.to_string()) {
        Entry::Occupied(_) => {
            warn!("IngestPoint {name} already exists. Skip init");
        }
        Entry::Vacant(slot) => {
            slot.insert(point);
        }
    }
}
