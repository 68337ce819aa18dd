// Use-case level inputs/outputs for the session runtime.

use crate::domain::{SessionEnd, SessionPhase};
use crate::interface_adapters::protocol::ServerMessage;
use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

/// Frames queued for one connection's socket writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(Utf8Bytes),
    Close { code: u16, reason: &'static str },
}

/// Transport side of an admitted connection. Only the registry holds these.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: u64,
    pub tx: mpsc::Sender<Outbound>,
}

/// Events the network adapter feeds into the session task.
#[derive(Debug)]
pub enum SessionEvent {
    Connected(ConnectionHandle),
    Message { conn_id: u64, text: Utf8Bytes },
    Disconnected { conn_id: u64 },
}

/// Recipients of a routed message, relative to the participant that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Sender,
    Opponent,
    All,
}

/// Either a framework message or an app event; both serialize as flat tagged objects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outgoing<E> {
    Session(ServerMessage),
    App(E),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Routed<E> {
    pub target: Target,
    pub message: Outgoing<E>,
}

impl<E> Routed<E> {
    pub fn session(target: Target, message: ServerMessage) -> Self {
        Self {
            target,
            message: Outgoing::Session(message),
        }
    }

    pub fn app(target: Target, event: E) -> Self {
        Self {
            target,
            message: Outgoing::App(event),
        }
    }
}

/// What an app hook hands back: messages to deliver and an optional request to end the round.
#[derive(Debug, Clone, PartialEq)]
pub struct AppOutcome<E> {
    pub messages: Vec<Routed<E>>,
    pub end: Option<SessionEnd>,
}

impl<E> Default for AppOutcome<E> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            end: None,
        }
    }
}

impl<E> AppOutcome<E> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<Routed<E>>) -> Self {
        Self {
            messages,
            end: None,
        }
    }

    pub fn push(&mut self, target: Target, event: E) {
        self.messages.push(Routed::app(target, event));
    }

    pub fn ending(mut self, end: SessionEnd) -> Self {
        self.end = Some(end);
        self
    }
}

/// Coarse session status published to the HTTP side.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub participants: usize,
    /// Set once the session task has stopped, with the reason.
    pub stopped: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Waiting,
            participants: 0,
            stopped: None,
        }
    }
}
