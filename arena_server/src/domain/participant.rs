// Participant roster entries and the coarse session lifecycle.

use std::fmt;

pub type ParticipantId = String;

/// Highest participant number a session hands out.
pub const MAX_PARTICIPANTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    /// 1 or 2, the lowest free slot at admission time.
    pub number: u8,
    pub is_ready: bool,
    pub is_bot: bool,
    pub wants_play_again: bool,
}

impl Participant {
    pub fn new(id: impl Into<ParticipantId>, number: u8) -> Self {
        Self {
            id: id.into(),
            number,
            is_ready: false,
            is_bot: false,
            wants_play_again: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Waiting,
    Playing,
    Finished,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Waiting => "waiting",
            SessionPhase::Playing => "playing",
            SessionPhase::Finished => "finished",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a round ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Completed,
    ParticipantLeft,
    Timeout,
    /// App-specific reason tag.
    Other(String),
}

impl EndReason {
    pub fn as_str(&self) -> &str {
        match self {
            EndReason::Completed => "completed",
            EndReason::ParticipantLeft => "participant_left",
            EndReason::Timeout => "timeout",
            EndReason::Other(reason) => reason,
        }
    }
}

/// Request from app logic to finish the running round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub winner_id: Option<ParticipantId>,
    pub reason: EndReason,
}
