// Message routing: decode, dispatch to lifecycle or app, deliver by target.

use crate::domain::Participant;
use crate::interface_adapters::protocol::{AppMessage, Inbound, ProtocolError, ServerMessage, decode};
use crate::use_cases::app::SessionApp;
use crate::use_cases::lifecycle::SessionLifecycle;
use crate::use_cases::registry::{ConnectionRegistry, encode_or_log};
use crate::use_cases::types::{AppOutcome, Routed, Target};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Handles one raw text frame from an admitted participant.
///
/// Protocol failures produce a single `error` for the sender and leave state untouched.
pub fn route_message<A: SessionApp>(
    raw: &str,
    sender: &Participant,
    lifecycle: &mut SessionLifecycle,
    app: &mut A,
    now_ms: u64,
) -> Vec<Routed<A::Event>> {
    let inbound = match decode(raw) {
        Ok(inbound) => inbound,
        Err(err) => return reject(sender, &err),
    };

    match inbound {
        Inbound::ParticipantReady => lifecycle.mark_ready(&sender.id, app, now_ms),
        Inbound::PlayAgainVote => lifecycle.record_vote(&sender.id, app),
        Inbound::BotIdentify => lifecycle.mark_bot(&sender.id, app, now_ms),
        Inbound::App(message) => match app.on_message(&message, sender, lifecycle.phase(), now_ms) {
            Ok(outcome) => lifecycle.apply_outcome(outcome, app),
            Err(err) => reject(sender, &err),
        },
    }
}

fn reject<E>(sender: &Participant, err: &ProtocolError) -> Vec<Routed<E>> {
    debug!(participant_id = %sender.id, error = %err, "rejected inbound message");
    vec![Routed::session(Target::Sender, ServerMessage::error(err.to_string()))]
}

/// Sends each routed message through the registry, serializing it once.
///
/// `sender` is the participant the batch is relative to; `None` for timer-driven output,
/// in which case `Sender` targets are dropped and `Opponent` means everyone.
pub fn deliver<E: Serialize>(
    registry: &ConnectionRegistry,
    sender: Option<&str>,
    messages: &[Routed<E>],
) {
    for routed in messages {
        let Some(bytes) = encode_or_log(&routed.message) else {
            continue;
        };
        match (routed.target, sender) {
            (Target::All, _) | (Target::Opponent, None) => registry.broadcast(&bytes),
            (Target::Sender, Some(id)) => registry.send_to(id, &bytes),
            (Target::Opponent, Some(id)) => registry.send_to_all_except(id, &bytes),
            (Target::Sender, None) => {
                warn!("sender-targeted message without a sender; dropped");
            }
        }
    }
}

/// Result of one app handler: the next state plus what to tell whom.
#[derive(Debug)]
pub struct Handled<S, E> {
    pub state: S,
    pub outcome: AppOutcome<E>,
}

pub type Handler<S, C, E> = fn(&AppMessage, &C, &S) -> Result<Handled<S, E>, ProtocolError>;

/// Message type -> handler table used by apps in place of a branching dispatcher.
pub struct HandlerRegistry<S, C, E> {
    handlers: HashMap<&'static str, Handler<S, C, E>>,
}

impl<S, C, E> Default for HandlerRegistry<S, C, E> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S, C, E> HandlerRegistry<S, C, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: &'static str, handler: Handler<S, C, E>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn dispatch(
        &self,
        message: &AppMessage,
        ctx: &C,
        state: &S,
    ) -> Result<Handled<S, E>, ProtocolError> {
        let handler = self
            .handlers
            .get(message.kind.as_str())
            .ok_or_else(|| ProtocolError::UnknownType(message.kind.clone()))?;
        handler(message, ctx, state)
    }
}
