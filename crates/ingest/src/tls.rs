//! TLS line ingress
//!
//! A TLS-authenticated TCP listener that frames incoming byte streams on a
//! configurable delimiter. The configured CA is loaded into the verifier's
//! root pool, so clients presenting certificates from that CA are verified
//! (mutual-TLS capable); clients without certificates are still admitted.
//!
//! Each accepted connection gets its own reader task. Frames are emitted
//! with the trailing delimiter stripped; empty frames are skipped. A full
//! output buffer drops the frame and backs the reader off briefly.

use std::io;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tracing::{debug, error, info, warn};

use logbay_common::config::DEFAULT_DELIMITER;
use logbay_common::error::{Error, Result};
use logbay_common::pipeline::{self, MessageSender, OFFER_BACKOFF};
use logbay_common::types::IngestKind;
use logbay_common::PointConfig;

use crate::IngestPoint;

pub(crate) async fn start(config: &PointConfig) -> Result<Arc<IngestPoint>> {
    if config.port == 0 {
        warn!("TLS port should be > 0");
        return Err(Error::Config("invalid port 0".to_string()));
    }

    if config.certificate.is_empty() || config.key.is_empty() {
        warn!(
            "Invalid certificate or key path. Cert: {}. Key: {}",
            config.certificate, config.key
        );
        return Err(Error::Config(
            "invalid certificate or key path".to_string(),
        ));
    }

    let delimiter = if config.delimiter == 0 {
        info!("Delimiter is not configured. Using '\\n'");
        DEFAULT_DELIMITER
    } else {
        config.delimiter
    };

    let acceptor = build_acceptor(&config.certificate, &config.key, &config.ca)?;

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .inspect_err(|e| error!("Failed to start server. Err: {e}"))?;

    let (tx, rx) = pipeline::bounded(config.buffer);
    let point = IngestPoint::new(IngestKind::Tls, &config.name, rx);

    info!("TLS server started. Waiting for connections...");
    tokio::spawn(accept_loop(listener, acceptor, tx, delimiter));

    Ok(point)
}

fn build_acceptor(cert_path: &str, key_path: &str, ca_path: &str) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut roots = RootCertStore::empty();
    for ca in load_certs(ca_path)? {
        roots
            .add(ca)
            .with_context(|| format!("Invalid CA certificate in {ca_path}"))?;
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .allow_unauthenticated()
        .build()
        .context("Failed to build client verifier")?;

    let server_config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .context("Failed to load keypair")?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to read certificate {path}"))?;
    let mut reader = io::BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to parse certificate {path}"))?;

    if certs.is_empty() {
        return Err(Error::Config(format!("no certificates found in {path}")));
    }

    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to read private key {path}"))?;
    let mut reader = io::BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("Failed to parse private key {path}"))?
        .ok_or_else(|| Error::Config(format!("no private key found in {path}")))
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    out: MessageSender,
    delimiter: u8,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Can't accept incoming connection. Err: {e}");
                continue;
            }
        };

        debug!("Accepted connection from {peer}");

        let acceptor = acceptor.clone();
        let out = out.clone();

        tokio::spawn(async move {
            match acceptor.accept(stream).await {
                Ok(tls_stream) => {
                    read_frames(BufReader::new(tls_stream), out, delimiter).await;
                    debug!("Connection from {peer} has been closed");
                }
                Err(e) => warn!("TLS handshake with {peer} failed. Err: {e}"),
            }
        });
    }
}

/// Read delimiter-framed messages until EOF or a read error.
///
/// A frame that ends the stream without a trailing delimiter is still
/// emitted. Frames that are empty after stripping are skipped.
async fn read_frames<R>(mut reader: R, out: MessageSender, delimiter: u8)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();

        match reader.read_until(delimiter, &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&delimiter) {
                    buf.pop();
                }

                if buf.is_empty() {
                    continue;
                }

                let msg = String::from_utf8_lossy(&buf).into_owned();
                if !out.offer(msg) {
                    tokio::time::sleep(OFFER_BACKOFF).await;
                }
            }
            Err(e) => {
                debug!("Socket read error: {e}. Terminating connection");
                break;
            }
        }
    }
}
