//! Redis publisher digest
//!
//! Publishes every message to a channel derived from the configured
//! pattern. The pattern may carry `{{field}}` placeholders; those are
//! filled in per message from the message's own JSON body, which lets one
//! digest route to per-tenant channels. External producers rely on the
//! exact `{{key}}` syntax and the flat string→string JSON semantics.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use regex::Regex;
use tracing::{debug, info};

use logbay_common::error::Result;
use logbay_common::types::{Consumer, DigestKind};
use logbay_common::PointConfig;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_CHANNEL: &str = "logbay:entry";

static TEMPLATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").unwrap());

pub(crate) struct RedisDigest {
    name: String,
    channel: String,
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisDigest")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .finish()
    }
}

impl RedisDigest {
    pub(crate) async fn connect(config: &PointConfig) -> Result<Arc<Self>> {
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

        let channel = if config.pattern.is_empty() {
            debug!("Channel is not configured. Using {DEFAULT_CHANNEL}");
            DEFAULT_CHANNEL.to_string()
        } else {
            config.pattern.clone()
        };

        let client = redis::Client::open(format!("redis://{host}:{port}/"))
            .context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!(
            "Created new redis digest point. Host: {host}, Port: {port}, Channel: {channel}"
        );

        Ok(Arc::new(Self {
            name: config.name.clone(),
            channel,
            conn,
        }))
    }
}

#[async_trait]
impl Consumer for RedisDigest {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DigestKind {
        DigestKind::Redis
    }

    async fn consume(&self, msg: &str) -> Result<()> {
        let Some(channel) = resolve_channel(&self.channel, msg) else {
            return Ok(());
        };

        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, msg).await?;
        Ok(())
    }
}

/// Expand the channel pattern for one message. `None` means the resolved
/// channel is empty and nothing should be published.
fn resolve_channel(pattern: &str, msg: &str) -> Option<String> {
    let channel = if TEMPLATE.is_match(pattern) {
        expand_channel(pattern, msg)
    } else {
        pattern.to_string()
    };

    if channel.is_empty() { None } else { Some(channel) }
}

/// Replace each `{{key}}` with the matching value from the message, read as
/// a flat JSON object of string→string. Keys the message does not carry
/// stay as-is; a message that is not such an object leaves the whole
/// pattern unexpanded.
fn expand_channel(pattern: &str, msg: &str) -> String {
    let fields: HashMap<String, String> = match serde_json::from_str(msg) {
        Ok(fields) => fields,
        Err(e) => {
            debug!("Failed to unmarshal message. Raw: {msg}. Err: {e}");
            return pattern.to_string();
        }
    };

    TEMPLATE
        .replace_all(pattern, |caps: &regex::Captures<'_>| {
            match fields.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
