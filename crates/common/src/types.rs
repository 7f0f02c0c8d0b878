//! Endpoint kinds and the consumer capability
//!
//! Ingresses and digests are selected by the `Type` string in the
//! configuration record. The string forms here are wire format: external
//! config files rely on them.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Ingress endpoint kinds
///
/// `Https` is reserved from an earlier revision of the config format;
/// constructing it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestKind {
    Tls,
    Redis,
    Https,
    Simulated,
}

impl FromStr for IngestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tls" => Ok(IngestKind::Tls),
            "redis" => Ok(IngestKind::Redis),
            "https" => Ok(IngestKind::Https),
            "simulated" => Ok(IngestKind::Simulated),
            other => Err(Error::Config(format!("invalid ingest point type {other}"))),
        }
    }
}

impl fmt::Display for IngestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestKind::Tls => "tls",
            IngestKind::Redis => "redis",
            IngestKind::Https => "https",
            IngestKind::Simulated => "simulated",
        };
        f.write_str(s)
    }
}

/// Egress (digest) endpoint kinds
///
/// `File` is reserved but unimplemented; constructing it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestKind {
    Redis,
    WebSocket,
    File,
    Elastic,
}

impl FromStr for DigestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "redis" => Ok(DigestKind::Redis),
            "ws" => Ok(DigestKind::WebSocket),
            "file" => Ok(DigestKind::File),
            "elastic" => Ok(DigestKind::Elastic),
            other => Err(Error::Config(format!("invalid digest point type {other}"))),
        }
    }
}

impl fmt::Display for DigestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DigestKind::Redis => "redis",
            DigestKind::WebSocket => "ws",
            DigestKind::File => "file",
            DigestKind::Elastic => "elastic",
        };
        f.write_str(s)
    }
}

/// Capability shared by every digest point.
///
/// `consume` must be cheap from the dispatcher's point of view: digests that
/// do long work (HTTP posts, broadcast writes) hand the message off to an
/// internal task instead of blocking the fan-out loop.
#[async_trait]
pub trait Consumer: Send + Sync + std::fmt::Debug {
    /// Endpoint name (the configuration key).
    fn name(&self) -> &str;

    /// The digest kind this consumer was constructed as.
    fn kind(&self) -> DigestKind;

    /// Deliver one message to this digest.
    async fn consume(&self, msg: &str) -> Result<()>;
}
