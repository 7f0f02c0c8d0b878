//! Digest integration tests
//!
//! Exercise the digest endpoints against real I/O: a mocked Elasticsearch
//! bulk endpoint and a live WebSocket server with real clients. No external
//! services are required.

use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use logbay_common::PointConfig;

async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<Request> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let requests = server.received_requests().await.unwrap_or_default();
            if requests.len() >= count {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("mock server did not receive the expected requests in time")
}

#[tokio::test]
async fn elastic_digest_batches_and_flushes_on_close() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs/entry/_bulk"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = PointConfig {
        name: "es-integration".to_string(),
        kind: "elastic".to_string(),
        host: server.uri(),
        es_index: "logs".to_string(),
        es_document: "entry".to_string(),
        es_batch_size: 3,
        ..Default::default()
    };

    let digest = logbay_digest::create(&config).await.unwrap();

    for i in 0..5 {
        digest.consume(&format!("m{i}")).await.unwrap();
    }

    // Three messages fill the first batch; it posts immediately.
    let requests = wait_for_requests(&server, 1).await;
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert_eq!(
        body,
        "{ \"index\" : { } }\nm0\n{ \"index\" : { } }\nm1\n{ \"index\" : { } }\nm2\n"
    );
    assert_eq!(
        requests[0].headers.get("content-type").unwrap(),
        "application/x-ndjson"
    );

    // Dropping the digest closes the staging channel; the pending partial
    // batch flushes.
    drop(digest);

    let requests = wait_for_requests(&server, 2).await;
    assert_eq!(requests.len(), 2);
    let body = String::from_utf8(requests[1].body.clone()).unwrap();
    assert_eq!(body, "{ \"index\" : { } }\nm3\n{ \"index\" : { } }\nm4\n");
}

#[tokio::test]
async fn elastic_digest_posts_full_batches_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs/entry/_bulk"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = PointConfig {
        name: "es-order".to_string(),
        kind: "elastic".to_string(),
        host: server.uri(),
        es_index: "logs".to_string(),
        es_document: "entry".to_string(),
        es_batch_size: 2,
        ..Default::default()
    };

    let digest = logbay_digest::create(&config).await.unwrap();

    for i in 0..6 {
        digest.consume(&format!("m{i}")).await.unwrap();
    }

    // Six messages at batch size 2 make exactly three posts; concatenated
    // bodies keep the input order.
    let requests = wait_for_requests(&server, 3).await;
    let concatenated: String = requests
        .iter()
        .map(|r| String::from_utf8(r.body.clone()).unwrap())
        .collect();

    let documents: Vec<&str> = concatenated
        .lines()
        .filter(|line| !line.starts_with("{ \"index\""))
        .collect();
    assert_eq!(documents, vec!["m0", "m1", "m2", "m3", "m4", "m5"]);
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect_with_retry(url: &str) -> WsClient {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok((client, _)) = connect_async(url).await {
                return client;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("could not connect to the WebSocket digest in time")
}

/// Read frames until a text frame arrives, skipping pings.
async fn try_read_text(client: &mut WsClient, wait: Duration) -> Option<String> {
    let deadline = tokio::time::Instant::now() + wait;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, client.next()).await {
            Ok(Some(Ok(WsMessage::Text(text)))) => return Some(text.to_string()),
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}

#[tokio::test]
async fn websocket_digest_broadcasts_to_every_client() {
    let config = PointConfig {
        name: "ws-integration".to_string(),
        kind: "ws".to_string(),
        port: 19471,
        endpoint: "feed".to_string(),
        ..Default::default()
    };

    let digest = logbay_digest::create(&config).await.unwrap();

    let mut first = connect_with_retry("ws://127.0.0.1:19471/feed").await;
    let mut second = connect_with_retry("ws://127.0.0.1:19471/feed").await;

    // The upgrade is recorded asynchronously; repeat the broadcast until
    // both clients see it.
    let mut first_got = None;
    let mut second_got = None;

    for _ in 0..50 {
        digest.consume("fanout").await.unwrap();

        if first_got.is_none() {
            first_got = try_read_text(&mut first, Duration::from_millis(100)).await;
        }
        if second_got.is_none() {
            second_got = try_read_text(&mut second, Duration::from_millis(100)).await;
        }

        if first_got.is_some() && second_got.is_some() {
            break;
        }
    }

    assert_eq!(first_got.as_deref(), Some("fanout"));
    assert_eq!(second_got.as_deref(), Some("fanout"));
}

#[tokio::test]
async fn websocket_digest_survives_client_disconnect() {
    let config = PointConfig {
        name: "ws-disconnect".to_string(),
        kind: "ws".to_string(),
        port: 19472,
        ..Default::default()
    };

    let digest = logbay_digest::create(&config).await.unwrap();

    // Default endpoint applies when none is configured.
    let client = connect_with_retry("ws://127.0.0.1:19472/logbay").await;
    drop(client);

    // Broadcasting after the disconnect must not error the consumer.
    tokio::time::sleep(Duration::from_millis(100)).await;
    digest.consume("nobody home").await.unwrap();
}
