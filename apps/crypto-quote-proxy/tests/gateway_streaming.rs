//! Gateway Streaming Integration Tests
//!
//! Connects real websocket clients to the downstream gateway and checks
//! frame delivery, connection accounting, and lifecycle events.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crypto_quote_proxy::{
    ClientRegistry, EventBus, FALLBACK_NOTE, GatewayServer, QuoteEvent, channel,
};

struct GatewayHarness {
    bus: Arc<EventBus>,
    registry: Arc<ClientRegistry>,
    addr: SocketAddr,
    cancel: CancellationToken,
}

impl Drop for GatewayHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn setup_gateway() -> GatewayHarness {
    let bus = Arc::new(EventBus::with_defaults());
    let registry = Arc::new(ClientRegistry::new(Arc::clone(&bus), 64));
    let cancel = CancellationToken::new();

    // Fan-out loop feeding the gateway's delivery channels.
    tokio::spawn(Arc::clone(&registry).run(cancel.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gateway = GatewayServer::new(0, Arc::clone(&registry), cancel.clone());
    tokio::spawn(gateway.run_with_listener(listener));

    // Wait until the fan-out loop has its bus receivers in place.
    wait_for(|| bus.quotes_receiver_count() > 0).await;

    GatewayHarness {
        bus,
        registry,
        addr,
        cancel,
    }
}

async fn wait_for(cond: impl Fn() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn next_frame(
    ws: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> serde_json::Value {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn connected_clients_all_receive_quote_frames() {
    let harness = setup_gateway().await;

    let (mut ws1, _) = tokio_tungstenite::connect_async(format!("ws://{}", harness.addr))
        .await
        .unwrap();
    let (mut ws2, _) = tokio_tungstenite::connect_async(format!("ws://{}", harness.addr))
        .await
        .unwrap();

    wait_for(|| harness.registry.connection_count() == 2).await;

    let _ = harness
        .bus
        .publish_quote(QuoteEvent::new("BTC", "USD", 10000.0));

    for ws in [&mut ws1, &mut ws2] {
        let frame = next_frame(ws).await;
        assert_eq!(frame["event"], channel::QUOTE);
        assert_eq!(frame["data"]["symbol"], "BTC");
        assert_eq!(frame["data"]["currency"], "USD");
        assert_eq!(frame["data"]["price"], 10000.0);
    }
}

#[tokio::test]
async fn quote_updates_carry_channel_tag_and_note() {
    let harness = setup_gateway().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", harness.addr))
        .await
        .unwrap();
    wait_for(|| harness.registry.connection_count() == 1).await;

    let _ = harness.bus.publish_quote_update(
        QuoteEvent::new("LTC", "ZAR", 251.0).with_note(FALLBACK_NOTE),
    );

    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["event"], channel::QUOTE_UPDATE);
    assert_eq!(frame["data"]["note"], FALLBACK_NOTE);
    assert_eq!(frame["data"]["price"], 251.0);
}

#[tokio::test]
async fn connects_and_disconnects_track_the_counter() {
    let harness = setup_gateway().await;

    let mut clients = Vec::new();
    for _ in 0..3 {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", harness.addr))
            .await
            .unwrap();
        clients.push(ws);
    }
    wait_for(|| harness.registry.connection_count() == 3).await;

    // Close one client; N - M channels remain.
    let mut closed = clients.pop().unwrap();
    futures_util::SinkExt::close(&mut closed).await.unwrap();
    drop(closed);
    wait_for(|| harness.registry.connection_count() == 2).await;

    let _ = harness
        .bus
        .publish_quote(QuoteEvent::new("ETH", "USD", 1500.0));

    for ws in &mut clients {
        let frame = next_frame(ws).await;
        assert_eq!(frame["data"]["symbol"], "ETH");
    }
}

#[tokio::test]
async fn lifecycle_events_published_for_gateway_clients() {
    let harness = setup_gateway().await;
    let mut connected = harness.bus.subscribe_client_connected();
    let mut disconnected = harness.bus.subscribe_client_disconnected();

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", harness.addr))
        .await
        .unwrap();

    let connected_id = timeout(Duration::from_secs(2), connected.recv())
        .await
        .expect("timed out waiting for client-connected")
        .unwrap();

    futures_util::SinkExt::close(&mut ws).await.unwrap();
    drop(ws);

    let disconnected_id = timeout(Duration::from_secs(2), disconnected.recv())
        .await
        .expect("timed out waiting for client-disconnected")
        .unwrap();

    assert_eq!(connected_id, disconnected_id);
    assert_eq!(harness.registry.connection_count(), 0);
}
