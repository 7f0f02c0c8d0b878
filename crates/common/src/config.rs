//! Configuration record and TOML loader
//!
//! The daemon is driven by a single TOML file with three sections:
//!
//! ```toml
//! [Logger]
//! Level = "INFO"
//! File = "/var/log/logbay/logbay.log"
//!
//! [IngestPoints.tls-in]
//! Type = "tls"
//! Port = 8001
//! Certificate = "certs/server.pem"
//! Key = "certs/server.key"
//! CA = "certs/ca.pem"
//!
//! [DigestPoints.redis-out]
//! Type = "redis"
//! Pattern = "co:{{companyId}}"
//! Ingests = ["tls-in"]
//! ```
//!
//! Field spellings are wire format and must not change. Defaults are applied
//! by the endpoint constructors, not here; the loader only parses.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Channel capacity used when `Buffer` is unset or 0.
pub const DEFAULT_BUFFER: usize = 50;
/// Framing byte used when `Delimiter` is unset or 0.
pub const DEFAULT_DELIMITER: u8 = b'\n';
/// Elasticsearch batch size used when `ESBatchSize` is unset or 0.
pub const DEFAULT_ES_BATCH_SIZE: usize = 100;
/// Simulator message length used when `MsgLength` is unset or 0.
pub const DEFAULT_MSG_LENGTH: usize = 140;
/// Simulator rate used when `MsgPerSec` is unset or 0.
pub const DEFAULT_MSG_PER_SEC: u64 = 5;

/// Root configuration record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "Logger", default)]
    pub logger: LoggerConfig,

    #[serde(rename = "IngestPoints", default)]
    pub ingest_points: HashMap<String, PointConfig>,

    #[serde(rename = "DigestPoints", default)]
    pub digest_points: HashMap<String, PointConfig>,
}

/// Logging section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggerConfig {
    /// One of DEBUG, INFO, WARN, ERROR, FATAL. `RUST_LOG` overrides it.
    #[serde(rename = "Level", default)]
    pub level: String,

    /// Log-file path. When set and its directory exists, the current file is
    /// rotated aside on startup and a fresh one is created.
    #[serde(rename = "File", default)]
    pub file: String,

    /// Extra context fields, reported once at startup.
    #[serde(rename = "Fields", default)]
    pub fields: Vec<String>,
}

/// Per-endpoint configuration, shared by ingresses and digests.
///
/// `name` is assigned from the configuration key by the caller; everything
/// else comes from the file. Which fields matter depends on `Type`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PointConfig {
    #[serde(rename = "Name", default)]
    pub name: String,

    /// Endpoint kind selector; required.
    #[serde(rename = "Type", default)]
    pub kind: String,

    /// Skip this endpoint entirely at startup.
    #[serde(rename = "Disabled", default)]
    pub disabled: bool,

    #[serde(rename = "Host", default)]
    pub host: String,

    #[serde(rename = "Port", default)]
    pub port: u16,

    /// URL path for the WebSocket digest.
    #[serde(rename = "Endpoint", default)]
    pub endpoint: String,

    /// Redis channel or subscription pattern; may carry `{{field}}`
    /// placeholders on the digest side.
    #[serde(rename = "Pattern", default)]
    pub pattern: String,

    #[serde(rename = "Certificate", default)]
    pub certificate: String,

    #[serde(rename = "Key", default)]
    pub key: String,

    #[serde(rename = "CA", default)]
    pub ca: String,

    /// Ingress names this digest subscribes to, in delivery order.
    #[serde(rename = "Ingests", default)]
    pub ingests: Vec<String>,

    /// Framing byte for stream ingresses; 0 means default (`\n`).
    #[serde(rename = "Delimiter", default)]
    pub delimiter: u8,

    /// Output channel capacity; 0 means default (50).
    #[serde(rename = "Buffer", default)]
    pub buffer: usize,

    #[serde(rename = "ESIndex", default)]
    pub es_index: String,

    #[serde(rename = "ESDocument", default)]
    pub es_document: String,

    #[serde(rename = "ESBatchSize", default)]
    pub es_batch_size: usize,

    #[serde(rename = "MsgLength", default)]
    pub msg_length: usize,

    #[serde(rename = "MsgPerSec", default)]
    pub msg_per_sec: u64,
}

impl AppConfig {
    /// Load and parse the configuration file.
    ///
    /// A file that cannot be read or parsed is a fatal error; the caller
    /// exits non-zero.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("can not parse {}: {e}", path.display())))
    }
}
