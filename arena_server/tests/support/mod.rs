// Shared helpers for spinning up an isolated arena server per integration test.
#![allow(dead_code)]

use arena_server::{ServerSettings, use_cases::AppRegistry, use_cases::SessionSettings};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::{net::IpAddr, time::Duration};
use tokio::{net::TcpStream, sync::watch, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Upper bound for any single wait so a broken server fails the test instead of hanging it.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    // Flip the shutdown flag and wait for the server to drain.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        let result = tokio::time::timeout(STEP_TIMEOUT, self.task)
            .await
            .expect("server stops in time")
            .expect("server task joins");
        result.expect("server exits cleanly");
    }
}

pub fn test_settings() -> SessionSettings {
    SessionSettings {
        session_id: "test-session".to_string(),
        ..SessionSettings::default()
    }
}

// Bind to an ephemeral port so tests never collide with each other or local services.
pub async fn spawn_server(session: SessionSettings) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");

    let (shutdown, _) = watch::channel(false);
    let settings = ServerSettings {
        host: IpAddr::from([127, 0, 0, 1]),
        port: addr.port(),
        session,
    };
    let server_shutdown = shutdown.clone();
    let task = tokio::spawn(async move {
        let apps = AppRegistry::with_builtin_apps();
        arena_server::run(listener, settings, &apps, server_shutdown).await
    });

    TestServer {
        base_url: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
        shutdown,
        task,
    }
}

pub async fn connect(server: &TestServer) -> Client {
    let (client, _) = tokio::time::timeout(STEP_TIMEOUT, connect_async(server.ws_url.as_str()))
        .await
        .expect("connect in time")
        .expect("websocket handshake");
    client
}

pub async fn send_json(client: &mut Client, value: Value) {
    client
        .send(Message::text(value.to_string()))
        .await
        .expect("send frame");
}

// Next JSON text frame; panics on close or timeout.
pub async fn recv_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(STEP_TIMEOUT, client.next())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("valid frame");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).expect("server sends JSON"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

// Skip frames until one with the given `type` arrives.
pub async fn recv_type(client: &mut Client, kind: &str) -> Value {
    loop {
        let message = recv_json(client).await;
        if message["type"] == kind {
            return message;
        }
    }
}

// Wait for the close frame and return its code.
pub async fn recv_close(client: &mut Client) -> Option<u16> {
    loop {
        let frame = tokio::time::timeout(STEP_TIMEOUT, client.next())
            .await
            .expect("close in time");
        match frame {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}
