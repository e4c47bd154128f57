//! End-to-end relay tests over real WebSocket connections.

use edge_types::GroupId;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use xmcl_edge_server::config::Config;
use xmcl_edge_server::http::build_router;
use xmcl_edge_server::server::{EdgeMetrics, EdgeServer};
use xmcl_edge_server::storage::{SqliteStore, TranslationStore};
use xmcl_edge_server::translation::TranslationPipeline;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> (SocketAddr, Arc<EdgeServer>) {
    let config = Config::default();
    let store: Arc<dyn TranslationStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
    let metrics = Arc::new(EdgeMetrics::default());
    let (pipeline, _jobs) = TranslationPipeline::new(store.clone(), metrics.clone(), 8);
    let server = Arc::new(EdgeServer::new(config, store, pipeline, metrics));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(server.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, server)
}

/// Connect and wait until the session has joined the group.
async fn join(addr: SocketAddr, server: &EdgeServer, group: &str, query: &str) -> Client {
    let id = GroupId::new(group).unwrap();
    let before = server.groups().member_count(&id);

    let (ws, _) = connect_async(format!("ws://{}/group/{}{}", addr, group, query))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while server.groups().member_count(&id) <= before {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session never joined the group");

    ws
}

/// Next text or binary frame, skipping transport keepalives.
async fn next_frame(ws: &mut Client) -> Message {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(message)) => return message,
                other => panic!("socket ended: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

async fn assert_silent(ws: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "unexpected frame: {:?}", result);
}

#[tokio::test]
async fn text_is_broadcast_but_not_echoed() {
    let (addr, server) = start_server().await;
    let mut alice = join(addr, &server, "lobby", "").await;
    let mut bob = join(addr, &server, "lobby", "").await;

    alice.send(Message::Text("hello".into())).await.unwrap();
    assert_eq!(next_frame(&mut bob).await, Message::Text("hello".into()));

    bob.send(Message::Text("ack".into())).await.unwrap();
    assert_eq!(next_frame(&mut alice).await, Message::Text("ack".into()));

    assert_silent(&mut alice).await;
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn groups_are_isolated() {
    let (addr, server) = start_server().await;
    let mut alice = join(addr, &server, "red", "").await;
    let mut bob = join(addr, &server, "blue", "").await;

    alice.send(Message::Text("red only".into())).await.unwrap();
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn receiver_targets_one_client() {
    let (addr, server) = start_server().await;
    let mut alice = join(addr, &server, "room", "").await;
    let mut bob = join(addr, &server, "room", "?client=bob").await;
    let mut carol = join(addr, &server, "room", "?client=carol").await;

    let targeted = r#"{"type":"offer","receiver":"bob"}"#;
    alice.send(Message::Text(targeted.into())).await.unwrap();
    assert_eq!(next_frame(&mut bob).await, Message::Text(targeted.into()));

    let open = r#"{"type":"hello"}"#;
    alice.send(Message::Text(open.into())).await.unwrap();
    assert_eq!(next_frame(&mut bob).await, Message::Text(open.into()));
    // Carol never saw the offer; her first frame is the open message.
    assert_eq!(next_frame(&mut carol).await, Message::Text(open.into()));
}

#[tokio::test]
async fn sender_field_identifies_connection() {
    let (addr, server) = start_server().await;
    let mut alice = join(addr, &server, "room", "").await;
    let mut dave = join(addr, &server, "room", "").await;

    dave.send(Message::Text(r#"{"sender":"dave"}"#.into())).await.unwrap();
    next_frame(&mut alice).await;

    alice
        .send(Message::Text(r#"{"receiver":"erin"}"#.into()))
        .await
        .unwrap();
    assert_silent(&mut dave).await;

    alice
        .send(Message::Text(r#"{"receiver":"dave"}"#.into()))
        .await
        .unwrap();
    assert_eq!(
        next_frame(&mut dave).await,
        Message::Text(r#"{"receiver":"dave"}"#.into())
    );
}

#[tokio::test]
async fn binary_ping_gets_pong_and_identity_is_relayed() {
    let (addr, server) = start_server().await;
    let mut alice = join(addr, &server, "room", "").await;
    let mut bob = join(addr, &server, "room", "").await;

    let identity: Vec<u8> = (0x00..0x10).collect();
    let mut ping = identity.clone();
    ping.extend_from_slice(&12345.0_f64.to_be_bytes());
    alice.send(Message::Binary(ping)).await.unwrap();

    let pong = next_frame(&mut alice).await;
    let Message::Text(text) = pong else {
        panic!("expected text pong, got {:?}", pong);
    };
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "PONG", "timestamp": 12345 }));

    assert_eq!(next_frame(&mut bob).await, Message::Binary(identity));
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn binary_identity_targets_delivery() {
    let (addr, server) = start_server().await;
    let mut alice = join(addr, &server, "room", "").await;
    let mut bob = join(addr, &server, "room", "").await;

    let identity: Vec<u8> = vec![
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];
    bob.send(Message::Binary(identity.clone())).await.unwrap();
    assert_eq!(next_frame(&mut alice).await, Message::Binary(identity));

    let targeted = r#"{"receiver":"00112233-4455-6677-8899-aabbccddeeff"}"#;
    alice.send(Message::Text(targeted.into())).await.unwrap();
    assert_eq!(next_frame(&mut bob).await, Message::Text(targeted.into()));
}

#[tokio::test]
async fn closing_last_member_removes_group() {
    let (addr, server) = start_server().await;
    let mut alice = join(addr, &server, "ephemeral", "").await;
    assert_eq!(server.groups().total_groups(), 1);

    alice.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while server.groups().total_groups() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("group was never removed");
    assert_eq!(server.groups().total_connections(), 0);
}
