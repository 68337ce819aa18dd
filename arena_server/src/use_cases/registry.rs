// Connection registry: the two participant slots and outbound delivery.

use crate::domain::{MAX_PARTICIPANTS, Participant, ParticipantId};
use crate::interface_adapters::protocol::{ServerMessage, encode};
use crate::use_cases::types::{ConnectionHandle, Outbound};
use axum::extract::ws::{Utf8Bytes, close_code};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("session is full")]
    SessionFull,
    #[error("connection {0} is already admitted")]
    AlreadyAdmitted(u64),
}

#[derive(Debug, Clone)]
struct Slot {
    conn: ConnectionHandle,
    participant_id: ParticipantId,
}

/// Owns every live connection. Logic layers only ever see participant ids.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    // Index i holds participant number i + 1.
    slots: [Option<Slot>; MAX_PARTICIPANTS],
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a connection into the lowest free number.
    ///
    /// A refused connection receives an `error` frame followed by a close.
    pub fn admit(
        &mut self,
        conn: ConnectionHandle,
        participant_id: ParticipantId,
    ) -> Result<Participant, AdmissionError> {
        if self.position_of(conn.conn_id).is_some() {
            return Err(AdmissionError::AlreadyAdmitted(conn.conn_id));
        }

        let Some(index) = self.slots.iter().position(Option::is_none) else {
            let err = AdmissionError::SessionFull;
            warn!(conn_id = conn.conn_id, "admission refused: session full");
            if let Ok(bytes) = encode(&ServerMessage::error(err.to_string())) {
                push(&conn, Outbound::Text(bytes));
            }
            push(
                &conn,
                Outbound::Close {
                    code: close_code::POLICY,
                    reason: "session full",
                },
            );
            return Err(err);
        };

        // Slots are bounded by MAX_PARTICIPANTS, so the number always fits.
        let number = (index + 1) as u8;
        self.slots[index] = Some(Slot {
            conn,
            participant_id: participant_id.clone(),
        });
        Ok(Participant::new(participant_id, number))
    }

    /// Drops a connection and frees its number. Returns the released participant id.
    pub fn remove(&mut self, conn_id: u64) -> Option<ParticipantId> {
        let index = self.position_of(conn_id)?;
        self.slots[index].take().map(|slot| slot.participant_id)
    }

    pub fn participant_for(&self, conn_id: u64) -> Option<&ParticipantId> {
        self.position_of(conn_id)
            .and_then(|index| self.slots[index].as_ref())
            .map(|slot| &slot.participant_id)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn broadcast(&self, bytes: &Utf8Bytes) {
        for slot in self.slots.iter().flatten() {
            push(&slot.conn, Outbound::Text(bytes.clone()));
        }
    }

    pub fn send_to(&self, participant_id: &str, bytes: &Utf8Bytes) {
        for slot in self.slots.iter().flatten() {
            if slot.participant_id == participant_id {
                push(&slot.conn, Outbound::Text(bytes.clone()));
            }
        }
    }

    pub fn send_to_all_except(&self, participant_id: &str, bytes: &Utf8Bytes) {
        for slot in self.slots.iter().flatten() {
            if slot.participant_id != participant_id {
                push(&slot.conn, Outbound::Text(bytes.clone()));
            }
        }
    }

    /// Sends a close frame to every connection and forgets them.
    pub fn close_all(&mut self, reason: &'static str) {
        for slot in self.slots.iter_mut().filter_map(Option::take) {
            push(
                &slot.conn,
                Outbound::Close {
                    code: close_code::AWAY,
                    reason,
                },
            );
        }
    }

    fn position_of(&self, conn_id: u64) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.conn.conn_id == conn_id))
    }
}

fn push(conn: &ConnectionHandle, frame: Outbound) {
    match conn.tx.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            // Slow reader; the frame is dropped rather than stalling the session task.
            warn!(conn_id = conn.conn_id, "outbound queue full; frame dropped");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(conn_id = conn.conn_id, "outbound queue closed");
        }
    }
}

/// Serializes once for every recipient; a failure is logged and the message skipped.
pub fn encode_or_log<T: serde::Serialize>(message: &T) -> Option<Utf8Bytes> {
    encode(message)
        .inspect_err(|e| error!(error = %e, "failed to serialize outbound message"))
        .ok()
}
