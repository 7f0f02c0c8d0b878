/*!
 * Digest Endpoints
 *
 * Consumers on the egress side of the routing fabric. Each digest exposes
 * a single `consume(msg)` operation that must stay cheap from the
 * dispatcher's point of view: the Redis publisher writes inline through a
 * managed connection, while the WebSocket broadcaster and the Elasticsearch
 * bulk poster hand the message to an internal task.
 *
 * Construction goes through [`create`], which dispatches on the configured
 * `Type`. Resolving a digest's `Ingests` list against the registry is the
 * caller's job, not the factory's.
 */

mod elastic;
mod redis;
mod ws;

use std::sync::Arc;

use tracing::info;

use logbay_common::error::{Error, Result};
use logbay_common::types::{Consumer, DigestKind};
use logbay_common::PointConfig;

/// Construct a digest endpoint from its configuration.
pub async fn create(config: &PointConfig) -> Result<Arc<dyn Consumer>> {
    let kind: DigestKind = config.kind.parse()?;

    info!("Starting {} digest point. Type: {}", config.name, kind);

    let consumer: Arc<dyn Consumer> = match kind {
        DigestKind::Redis => redis::RedisDigest::connect(config).await?,
        DigestKind::WebSocket => ws::WsDigest::start(config).await?,
        DigestKind::Elastic => elastic::ElasticDigest::start(config)?,
        DigestKind::File => {
            return Err(Error::Config(format!(
                "digest point type {kind} is not implemented"
            )));
        }
    };

    Ok(consumer)
}
