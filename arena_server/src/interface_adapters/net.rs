// WebSocket adapter: one task per socket, bridging frames to and from the session task.

use crate::interface_adapters::http::{ErrorResponse, HealthResponse};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{ConnectionHandle, Outbound, SessionEvent};

use axum::{
    Error, Json,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::{Arc, atomic::Ordering},
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    SessionClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
// Consecutive malformed frames tolerated before the socket is closed.
const MAX_INVALID_JSON: u32 = 10;

#[derive(Debug)]
struct ConnStats {
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    last_invalid_log: Instant,
}

impl Default for ConnStats {
    fn default() -> Self {
        Self {
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            invalid_json: 0,
            last_invalid_log: Instant::now() - LOG_THROTTLE,
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.status_rx.borrow().stopped.is_some() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "session stopped".to_string(),
            }),
        )
            .into_response();
    }

    let conn_id = state.next_conn_id.fetch_add(1, Ordering::Relaxed);
    let span = info_span!("conn", conn_id);
    ws.on_upgrade(move |socket| handle_socket(socket, conn_id, state).instrument(span))
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status_rx.borrow().clone();
    Json(HealthResponse::new(&state.session_id, &state.app_id, &status))
}

async fn handle_socket(mut socket: WebSocket, conn_id: u64, state: Arc<AppState>) {
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(state.outbound_capacity);
    let conn = ConnectionHandle {
        conn_id,
        tx: out_tx,
    };
    if state.events_tx.send(SessionEvent::Connected(conn)).await.is_err() {
        warn!("session task gone; refusing connection");
        let _ = send_close_with_reason(&mut socket, close_code::AWAY, "session unavailable").await;
        return;
    }
    info!("client connected");

    let mut stats = ConnStats::default();
    let mut shutdown_rx = state.shutdown_rx.clone();
    if let Err(e) = run_client_loop(
        &mut socket,
        conn_id,
        &state.events_tx,
        &mut out_rx,
        &mut shutdown_rx,
        &mut stats,
    )
    .await
    {
        warn!(error = ?e, "client loop exited with error");
    }

    // The session frees the participant slot; a closed session has nothing left to free.
    if state
        .events_tx
        .send(SessionEvent::Disconnected { conn_id })
        .await
        .is_err()
    {
        debug!("session task gone during disconnect");
    }

    debug!(
        msgs_in = stats.msgs_in,
        msgs_out = stats.msgs_out,
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        invalid_json = stats.invalid_json,
        "connection stats"
    );
    info!("client disconnected");
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(
    socket: &mut WebSocket,
    conn_id: u64,
    events_tx: &mpsc::Sender<SessionEvent>,
    out_rx: &mut mpsc::Receiver<Outbound>,
    shutdown_rx: &mut watch::Receiver<bool>,
    stats: &mut ConnStats,
) -> Result<(), NetError> {
    let mut close_frame: Option<CloseFrame> = None;
    let mut fatal: Option<NetError> = None;

    loop {
        let control = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, conn_id, events_tx, stats, &mut close_frame).await {
                    Ok(control) => control,
                    Err(e) => {
                        fatal = Some(e);
                        LoopControl::Disconnect
                    }
                }
            }

            // Frames queued by the session task for this connection.
            outbound = out_rx.recv() => {
                match outbound {
                    Some(Outbound::Text(bytes)) => forward_text(bytes, socket, stats).await,
                    Some(Outbound::Close { code, reason }) => {
                        close_frame = Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        });
                        LoopControl::Disconnect
                    }
                    None => {
                        debug!("outbound queue closed by session");
                        LoopControl::Disconnect
                    }
                }
            }

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    close_frame.get_or_insert(CloseFrame {
                        code: close_code::AWAY,
                        reason: "server shutting down".into(),
                    });
                    LoopControl::Disconnect
                } else {
                    LoopControl::Continue
                }
            }
        };

        if let LoopControl::Disconnect = control {
            // Flush frames the session queued before asking us to close (e.g. the `error`
            // preceding a capacity refusal).
            while let Ok(Outbound::Text(bytes)) = out_rx.try_recv() {
                if let LoopControl::Disconnect = forward_text(bytes, socket, stats).await {
                    break;
                }
            }
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    conn_id: u64,
    events_tx: &mpsc::Sender<SessionEvent>,
    stats: &mut ConnStats,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                stats.msgs_in += 1;
                stats.bytes_in += text.len() as u64;

                if serde_json::from_str::<serde::de::IgnoredAny>(text.as_str()).is_err() {
                    stats.invalid_json += 1;
                    if should_log(&mut stats.last_invalid_log) {
                        warn!(invalid_json = stats.invalid_json, "invalid JSON frame");
                    }
                    if stats.invalid_json > MAX_INVALID_JSON {
                        *close_frame = Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "too many invalid messages".into(),
                        });
                        return Ok(LoopControl::Disconnect);
                    }
                } else {
                    stats.invalid_json = 0;
                }

                // The session replies with `error` for anything it cannot use.
                events_tx
                    .send(SessionEvent::Message { conn_id, text })
                    .await
                    .map_err(|_| NetError::SessionClosed)?;
                Ok(LoopControl::Continue)
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_text(bytes: Utf8Bytes, socket: &mut WebSocket, stats: &mut ConnStats) -> LoopControl {
    let len = bytes.len();
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            stats.msgs_out += 1;
            stats.bytes_out += len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Disconnect follows immediately; cleanup runs in the caller.
            warn!(error = ?err, "failed to send frame");
            LoopControl::Disconnect
        }
    }
}
