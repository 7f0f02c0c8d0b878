//! Full pipeline tests
//!
//! Wire real endpoints together the way the daemon does: configuration
//! records in, running ingresses + binding table + dispatcher out. The
//! simulated ingress drives traffic end to end.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use logbay::{dispatcher, startup};
use logbay_common::PointConfig;

fn simulated(name: &str, msg_length: usize) -> PointConfig {
    PointConfig {
        name: name.to_string(),
        kind: "simulated".to_string(),
        msg_length,
        msg_per_sec: 500,
        ..Default::default()
    }
}

#[tokio::test]
async fn simulated_traffic_reaches_websocket_clients() {
    let mut ingests = HashMap::new();
    ingests.insert("e2e-sim-ws".to_string(), simulated("e2e-sim-ws", 24));
    startup::prepare_ingests(&ingests).await;

    let mut digests = HashMap::new();
    digests.insert(
        "e2e-ws".to_string(),
        PointConfig {
            name: "e2e-ws".to_string(),
            kind: "ws".to_string(),
            port: 19481,
            ingests: vec!["e2e-sim-ws".to_string()],
            ..Default::default()
        },
    );

    let bindings = startup::prepare_digests(&digests).await;
    assert_eq!(bindings["e2e-sim-ws"].len(), 1);

    dispatcher::dispatch(bindings);

    let (mut client, _) = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(conn) = connect_async("ws://127.0.0.1:19481/logbay").await {
                return conn;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("could not connect to the WebSocket digest in time");

    // The simulator produces continuously; the first text frame through the
    // whole fabric is enough.
    let msg = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                Some(Ok(WsMessage::Text(text))) => return text.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("WebSocket stream ended unexpectedly: {other:?}"),
            }
        }
    })
    .await
    .expect("no simulated message arrived through the pipeline in time");

    assert_eq!(msg.len(), 24);
    assert!(msg.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn simulated_traffic_reaches_the_bulk_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logs/entry/_bulk"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut ingests = HashMap::new();
    ingests.insert("e2e-sim-es".to_string(), simulated("e2e-sim-es", 16));
    startup::prepare_ingests(&ingests).await;

    let mut digests = HashMap::new();
    digests.insert(
        "e2e-es".to_string(),
        PointConfig {
            name: "e2e-es".to_string(),
            kind: "elastic".to_string(),
            host: server.uri(),
            es_index: "logs".to_string(),
            es_document: "entry".to_string(),
            es_batch_size: 5,
            ingests: vec!["e2e-sim-es".to_string()],
            ..Default::default()
        },
    );

    let bindings = startup::prepare_digests(&digests).await;
    dispatcher::dispatch(bindings);

    let requests = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let requests = server.received_requests().await.unwrap_or_default();
            if !requests.is_empty() {
                return requests;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("no bulk request arrived through the pipeline in time");

    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let documents: Vec<&str> = body
        .lines()
        .filter(|line| !line.starts_with("{ \"index\""))
        .collect();

    assert_eq!(documents.len(), 5);
    for doc in documents {
        assert_eq!(doc.len(), 16);
        assert!(doc.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
