// Test doubles shared by the use case unit tests.

use crate::domain::{EndReason, Participant, SessionEnd, SessionPhase};
use crate::interface_adapters::protocol::{AppMessage, ProtocolError, ServerMessage};
use crate::use_cases::app::SessionApp;
use crate::use_cases::types::{AppOutcome, Outgoing, Routed, Target};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestEvent {
    Echo { text: String },
    Joined { id: String },
    Tick,
}

/// Minimal app that records which hooks ran.
#[derive(Debug, Default)]
pub struct ScriptedApp {
    pub starts: usize,
    pub resets: usize,
    pub ticks: usize,
    pub joins: Vec<String>,
    pub leaves: Vec<(String, SessionPhase)>,
}

impl SessionApp for ScriptedApp {
    type Event = TestEvent;

    fn on_participant_join(&mut self, participant: &Participant) -> AppOutcome<TestEvent> {
        self.joins.push(participant.id.clone());
        let mut outcome = AppOutcome::none();
        outcome.push(
            Target::Opponent,
            TestEvent::Joined {
                id: participant.id.clone(),
            },
        );
        outcome
    }

    fn on_participant_leave(
        &mut self,
        participant: &Participant,
        phase: SessionPhase,
    ) -> AppOutcome<TestEvent> {
        self.leaves.push((participant.id.clone(), phase));
        if phase == SessionPhase::Playing {
            return AppOutcome::none().ending(SessionEnd {
                winner_id: None,
                reason: EndReason::ParticipantLeft,
            });
        }
        AppOutcome::none()
    }

    fn on_message(
        &mut self,
        message: &AppMessage,
        sender: &Participant,
        _phase: SessionPhase,
        _now_ms: u64,
    ) -> Result<AppOutcome<TestEvent>, ProtocolError> {
        let text = message.body.get("text").and_then(Value::as_str).unwrap_or("");
        match message.kind.as_str() {
            "echo" => {
                let mut outcome = AppOutcome::none();
                outcome.push(Target::Sender, TestEvent::Echo { text: text.into() });
                Ok(outcome)
            }
            "shout" => {
                let mut outcome = AppOutcome::none();
                outcome.push(Target::All, TestEvent::Echo { text: text.into() });
                Ok(outcome)
            }
            "win" => Ok(AppOutcome::none().ending(SessionEnd {
                winner_id: Some(sender.id.clone()),
                reason: EndReason::Completed,
            })),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    fn on_session_start(&mut self, _now_ms: u64) -> AppOutcome<TestEvent> {
        self.starts += 1;
        AppOutcome::none()
    }

    fn on_tick(&mut self, _dt: f32, _now_ms: u64) -> AppOutcome<TestEvent> {
        self.ticks += 1;
        AppOutcome::none()
    }

    fn on_reset(&mut self, _participants: &[Participant]) -> Value {
        self.resets += 1;
        json!({"round": self.resets + 1})
    }

    fn app_data(&self) -> Value {
        json!({"joins": self.joins.len()})
    }
}

/// Framework messages in a routed batch, in order.
pub fn session_messages<E>(messages: &[Routed<E>]) -> Vec<&ServerMessage> {
    messages
        .iter()
        .filter_map(|routed| match &routed.message {
            Outgoing::Session(message) => Some(message),
            Outgoing::App(_) => None,
        })
        .collect()
}
