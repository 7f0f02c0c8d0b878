//! WebSocket broadcast digest
//!
//! Serves a WebSocket endpoint and broadcasts every consumed message to all
//! connected clients as one text frame. Clients are keyed by remote
//! address. Writes carry a 10-second deadline; a slow or broken client is
//! logged and skipped, it never stalls the broadcast of the other clients.
//!
//! Liveness: the server pings every client on an interval and records the
//! pong timestamp; clients whose last pong is too old are evicted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use logbay_common::error::{Error, Result};
use logbay_common::types::{Consumer, DigestKind};
use logbay_common::PointConfig;

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_ENDPOINT: &str = "/logbay";

type ClientMap = Arc<DashMap<String, Arc<WsClient>>>;

struct WsClient {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    last_pong: std::sync::Mutex<Instant>,
}

#[derive(Clone)]
struct WsState {
    clients: ClientMap,
}

#[derive(Debug)]
pub(crate) struct WsDigest {
    name: String,
    broadcast_tx: mpsc::UnboundedSender<String>,
}

impl WsDigest {
    pub(crate) async fn start(config: &PointConfig) -> Result<Arc<Self>> {
        if config.port == 0 {
            return Err(Error::Config("port is not defined".to_string()));
        }

        let endpoint = normalize_endpoint(&config.endpoint);

        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .inspect_err(|e| error!("Failed to start WebSocket server. Err: {e}"))?;

        let clients: ClientMap = Arc::new(DashMap::new());
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

        let app = Router::new()
            .route(&endpoint, get(upgrade_handler))
            .with_state(WsState {
                clients: Arc::clone(&clients),
            });

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                error!("WebSocket server stopped. Err: {e}");
            }
        });

        tokio::spawn(broadcast_loop(broadcast_rx, Arc::clone(&clients)));
        tokio::spawn(liveness_loop(clients));

        info!(
            "WebSocket digest listening on 0.0.0.0:{}{endpoint}",
            config.port
        );

        Ok(Arc::new(Self {
            name: config.name.clone(),
            broadcast_tx,
        }))
    }
}

#[async_trait]
impl Consumer for WsDigest {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DigestKind {
        DigestKind::WebSocket
    }

    async fn consume(&self, msg: &str) -> Result<()> {
        self.broadcast_tx
            .send(msg.to_string())
            .map_err(|_| Error::External("broadcast channel closed".to_string()))
    }
}

/// Ensure the handler path has a leading slash; empty means the default.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.is_empty() {
        DEFAULT_ENDPOINT.to_string()
    } else if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<WsState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// One task per connected client: record it, track pongs, drop it on close.
async fn handle_socket(socket: WebSocket, state: WsState, addr: SocketAddr) {
    let key = addr.to_string();
    let (sink, mut receiver) = socket.split();

    state.clients.insert(
        key.clone(),
        Arc::new(WsClient {
            sink: Mutex::new(sink),
            last_pong: std::sync::Mutex::new(Instant::now()),
        }),
    );

    info!("WebSocket client connected: {key}");

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Pong(_)) => {
                if let Some(client) = state.clients.get(&key) {
                    *client.last_pong.lock().expect("pong lock poisoned") = Instant::now();
                }
            }
            Ok(Message::Close(_)) => break,
            // Inbound frames are ignored; this is a broadcast-only endpoint.
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error from {key}: {e}");
                break;
            }
        }
    }

    state.clients.remove(&key);
    info!("WebSocket client disconnected: {key}");
}

/// Drain the broadcast channel and write each message to every client.
async fn broadcast_loop(mut rx: mpsc::UnboundedReceiver<String>, clients: ClientMap) {
    while let Some(msg) = rx.recv().await {
        let snapshot: Vec<(String, Arc<WsClient>)> = clients
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (key, client) in snapshot {
            let mut sink = client.sink.lock().await;
            let frame = Message::Text(msg.clone().into());

            match tokio::time::timeout(WRITE_TIMEOUT, sink.send(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("write failed. addr: {key}. Err: {e}"),
                Err(_) => warn!("write timeout. addr: {key}"),
            }
        }
    }
}

/// Ping every client periodically and evict the ones that stopped ponging.
async fn liveness_loop(clients: ClientMap) {
    let mut ticker = tokio::time::interval(PING_INTERVAL);

    loop {
        ticker.tick().await;

        let snapshot: Vec<(String, Arc<WsClient>)> = clients
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (key, client) in snapshot {
            let idle = client
                .last_pong
                .lock()
                .expect("pong lock poisoned")
                .elapsed();

            if idle > PONG_TIMEOUT {
                warn!("No pong from {key} in {idle:?}. Evicting");
                clients.remove(&key);
                continue;
            }

            let mut sink = client.sink.lock().await;
            if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                debug!("ping to {key} failed: {e}");
            }
        }
    }
}
