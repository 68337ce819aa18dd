use crate::use_cases::{SessionEvent, SessionStatus};
use std::sync::{Arc, atomic::AtomicU64};
use tokio::sync::{mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Identifiers injected by the provisioning side, reported by /health.
    pub session_id: Arc<str>,
    pub app_id: Arc<str>,
    // Inbound socket events flowing into the single session task.
    pub events_tx: mpsc::Sender<SessionEvent>,
    // Latest phase/participant count published by the session task.
    pub status_rx: watch::Receiver<SessionStatus>,
    // Flips to true when the process is shutting down.
    pub shutdown_rx: watch::Receiver<bool>,
    pub next_conn_id: Arc<AtomicU64>,
    // Per-connection queue of frames waiting for the socket writer.
    pub outbound_capacity: usize,
}
