// Session lifecycle: waiting -> playing -> finished -> waiting.
//
// Every notification is built after the state change it reports has been committed.

use crate::domain::{MAX_PARTICIPANTS, Participant, ParticipantId, SessionEnd, SessionPhase};
use crate::interface_adapters::protocol::ServerMessage;
use crate::use_cases::app::SessionApp;
use crate::use_cases::types::{AppOutcome, Routed, Target};
use tracing::{debug, info};

type Messages<A> = Vec<Routed<<A as SessionApp>::Event>>;

#[derive(Debug, Default)]
pub struct SessionLifecycle {
    phase: SessionPhase,
    // Kept ordered by participant number.
    roster: Vec<Participant>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn participants(&self) -> &[Participant] {
        &self.roster
    }

    pub fn participant(&self, participant_id: &str) -> Option<&Participant> {
        self.roster.iter().find(|p| p.id == participant_id)
    }

    pub fn add_participant(&mut self, participant: Participant) {
        let at = self
            .roster
            .iter()
            .position(|p| p.number > participant.number)
            .unwrap_or(self.roster.len());
        self.roster.insert(at, participant);
    }

    pub fn remove_participant(&mut self, participant_id: &str) -> Option<Participant> {
        let index = self.roster.iter().position(|p| p.id == participant_id)?;
        Some(self.roster.remove(index))
    }

    /// Explicit readiness signal. Ignored outside `waiting`.
    pub fn mark_ready<A: SessionApp>(
        &mut self,
        participant_id: &str,
        app: &mut A,
        now_ms: u64,
    ) -> Messages<A> {
        if self.phase != SessionPhase::Waiting {
            debug!(participant_id, phase = %self.phase, "ready ignored outside waiting");
            return Vec::new();
        }
        let Some(participant) = self.roster.iter_mut().find(|p| p.id == participant_id) else {
            return Vec::new();
        };
        if participant.is_ready {
            return Vec::new();
        }
        participant.is_ready = true;
        info!(participant_id, "participant ready");

        let mut messages = vec![self.ready_status()];
        messages.extend(self.try_start(app, now_ms));
        messages
    }

    /// Flags the participant as a bot; bots are ready without asking.
    pub fn mark_bot<A: SessionApp>(
        &mut self,
        participant_id: &str,
        app: &mut A,
        now_ms: u64,
    ) -> Messages<A> {
        let Some(participant) = self.roster.iter_mut().find(|p| p.id == participant_id) else {
            return Vec::new();
        };
        participant.is_bot = true;
        info!(participant_id, "participant identified as bot");

        if self.phase == SessionPhase::Waiting {
            self.mark_ready(participant_id, app, now_ms)
        } else {
            // Ready for the next round once this one resets.
            participant.is_ready = true;
            Vec::new()
        }
    }

    /// Ends the running round. No-op unless `playing`.
    pub fn end_session<A: SessionApp>(&mut self, end: SessionEnd, app: &mut A) -> Messages<A> {
        if self.phase != SessionPhase::Playing {
            debug!(phase = %self.phase, "end requested outside playing; ignored");
            return Vec::new();
        }
        self.phase = SessionPhase::Finished;

        let winner_number = end
            .winner_id
            .as_deref()
            .and_then(|id| self.participant(id))
            .map(|p| p.number);
        info!(
            winner_id = end.winner_id.as_deref().unwrap_or("none"),
            reason = end.reason.as_str(),
            "session ended"
        );

        vec![Routed::session(
            Target::All,
            ServerMessage::SessionEnded {
                winner_id: end.winner_id,
                winner_number,
                reason: end.reason.as_str().to_string(),
                app_data: Some(app.app_data()),
            },
        )]
    }

    /// Records a play-again vote. Silently ignored outside `finished`.
    pub fn record_vote<A: SessionApp>(&mut self, participant_id: &str, app: &mut A) -> Messages<A> {
        if self.phase != SessionPhase::Finished {
            debug!(participant_id, phase = %self.phase, "vote ignored outside finished");
            return Vec::new();
        }
        let Some(participant) = self.roster.iter_mut().find(|p| p.id == participant_id) else {
            return Vec::new();
        };
        participant.wants_play_again = true;

        let mut messages = vec![self.vote_status()];
        messages.extend(self.try_reset(app));
        messages
    }

    /// Re-checks the phase gate after the roster changed (a participant left).
    ///
    /// An emptied session drops back to `waiting` with fresh app state so the next
    /// connection never lands in a round it did not play.
    pub fn reevaluate<A: SessionApp>(&mut self, app: &mut A, now_ms: u64) -> Messages<A> {
        if self.roster.is_empty() {
            if self.phase != SessionPhase::Waiting {
                app.on_reset(&[]);
                self.phase = SessionPhase::Waiting;
                info!("session emptied; back to waiting");
            }
            return Vec::new();
        }
        match self.phase {
            SessionPhase::Waiting => self.try_start(app, now_ms),
            SessionPhase::Finished => {
                if !self.roster.iter().any(|p| p.wants_play_again) {
                    return Vec::new();
                }
                let mut messages = vec![self.vote_status()];
                messages.extend(self.try_reset(app));
                messages
            }
            SessionPhase::Playing => Vec::new(),
        }
    }

    /// Applies an app outcome's end request, if any, after its messages.
    pub fn apply_outcome<A: SessionApp>(
        &mut self,
        outcome: AppOutcome<A::Event>,
        app: &mut A,
    ) -> Messages<A> {
        let mut messages = outcome.messages;
        if let Some(end) = outcome.end {
            messages.extend(self.end_session(end, app));
        }
        messages
    }

    fn try_start<A: SessionApp>(&mut self, app: &mut A, now_ms: u64) -> Messages<A> {
        if self.phase != SessionPhase::Waiting
            || self.roster.len() < MAX_PARTICIPANTS
            || !self.roster.iter().all(|p| p.is_ready)
        {
            return Vec::new();
        }
        self.phase = SessionPhase::Playing;
        info!(participants = self.roster.len(), "session started");

        let mut messages = vec![Routed::session(Target::All, ServerMessage::SessionStarted)];
        let outcome = app.on_session_start(now_ms);
        messages.extend(self.apply_outcome(outcome, app));
        messages
    }

    fn try_reset<A: SessionApp>(&mut self, app: &mut A) -> Messages<A> {
        if self.phase != SessionPhase::Finished
            || self.roster.is_empty()
            || !self.roster.iter().all(|p| p.wants_play_again)
        {
            return Vec::new();
        }

        let app_data = app.on_reset(&self.roster);
        for participant in &mut self.roster {
            participant.wants_play_again = false;
            participant.is_ready = participant.is_bot;
        }
        self.phase = SessionPhase::Waiting;
        info!("session reset");

        vec![Routed::session(
            Target::All,
            ServerMessage::SessionReset {
                app_data: Some(app_data),
            },
        )]
    }

    fn ready_status<E>(&self) -> Routed<E> {
        Routed::session(
            Target::All,
            ServerMessage::ReadyStatus {
                ready_participant_ids: ids_where(&self.roster, |p| p.is_ready),
                total_participants: self.roster.len(),
            },
        )
    }

    fn vote_status<E>(&self) -> Routed<E> {
        let voted = ids_where(&self.roster, |p| p.wants_play_again);
        Routed::session(
            Target::All,
            ServerMessage::PlayAgainStatus {
                voted_count: voted.len(),
                voted_participant_ids: voted,
                total_participants: self.roster.len(),
            },
        )
    }
}

fn ids_where(roster: &[Participant], keep: impl Fn(&Participant) -> bool) -> Vec<ParticipantId> {
    roster
        .iter()
        .filter(|p| keep(p))
        .map(|p| p.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EndReason;
    use crate::use_cases::testing::{ScriptedApp, session_messages};

    fn lifecycle_with(ids: &[&str]) -> SessionLifecycle {
        let mut lifecycle = SessionLifecycle::new();
        for (index, id) in ids.iter().enumerate() {
            lifecycle.add_participant(Participant::new(*id, index as u8 + 1));
        }
        lifecycle
    }

    fn types<E>(messages: &[Routed<E>]) -> Vec<&'static str>
    where
        E: std::fmt::Debug,
    {
        session_messages(messages)
            .into_iter()
            .map(|m| match m {
                ServerMessage::ReadyStatus { .. } => "ready_status",
                ServerMessage::SessionStarted => "session_started",
                ServerMessage::SessionEnded { .. } => "session_ended",
                ServerMessage::PlayAgainStatus { .. } => "play_again_status",
                ServerMessage::SessionReset { .. } => "session_reset",
                _ => "other",
            })
            .collect()
    }

    fn finished(ids: &[&str], app: &mut ScriptedApp) -> SessionLifecycle {
        let mut lifecycle = lifecycle_with(ids);
        for id in ids {
            lifecycle.mark_ready(id, app, 0);
        }
        lifecycle.end_session(
            SessionEnd {
                winner_id: Some(ids[0].to_string()),
                reason: EndReason::Completed,
            },
            app,
        );
        lifecycle
    }

    #[test]
    fn when_all_participants_ready_in_any_order_then_session_starts_once() {
        for order in [["a", "b"], ["b", "a"]] {
            let mut app = ScriptedApp::default();
            let mut lifecycle = lifecycle_with(&["a", "b"]);

            let first = lifecycle.mark_ready(order[0], &mut app, 0);
            assert_eq!(types(&first), vec!["ready_status"]);
            assert_eq!(lifecycle.phase(), SessionPhase::Waiting);

            let second = lifecycle.mark_ready(order[1], &mut app, 0);
            assert_eq!(types(&second), vec!["ready_status", "session_started"]);
            assert_eq!(lifecycle.phase(), SessionPhase::Playing);

            let again = lifecycle.mark_ready(order[1], &mut app, 0);
            assert!(again.is_empty());
            assert_eq!(app.starts, 1);
        }
    }

    #[test]
    fn when_bot_identifies_then_it_is_ready_without_a_ready_message() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = lifecycle_with(&["human", "bot"]);

        lifecycle.mark_bot("bot", &mut app, 0);
        assert_eq!(lifecycle.phase(), SessionPhase::Waiting);
        let messages = lifecycle.mark_ready("human", &mut app, 0);

        assert!(lifecycle.participant("bot").is_some_and(|p| p.is_ready && p.is_bot));
        assert_eq!(types(&messages), vec!["ready_status", "session_started"]);
    }

    #[test]
    fn when_unready_participant_leaves_then_lone_ready_participant_keeps_waiting() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = lifecycle_with(&["a", "b"]);
        lifecycle.mark_ready("a", &mut app, 0);

        lifecycle.remove_participant("b");
        let messages = lifecycle.reevaluate(&mut app, 0);

        assert!(messages.is_empty());
        assert_eq!(lifecycle.phase(), SessionPhase::Waiting);
        assert_eq!(app.starts, 0);
    }

    #[test]
    fn when_lone_bot_identifies_then_session_waits_for_an_opponent() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = lifecycle_with(&["bot"]);

        let alone = lifecycle.mark_bot("bot", &mut app, 0);
        assert_eq!(types(&alone), vec!["ready_status"]);
        assert_eq!(lifecycle.phase(), SessionPhase::Waiting);

        lifecycle.add_participant(Participant::new("human", 2));
        let messages = lifecycle.mark_ready("human", &mut app, 0);

        assert_eq!(types(&messages), vec!["ready_status", "session_started"]);
        assert!(lifecycle.participants().iter().all(|p| p.is_ready));
        assert_eq!(app.starts, 1);
    }

    #[test]
    fn when_last_participant_leaves_finished_session_then_it_resets_quietly() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = finished(&["a", "b"], &mut app);

        lifecycle.remove_participant("a");
        assert!(lifecycle.reevaluate(&mut app, 0).is_empty());
        assert_eq!(lifecycle.phase(), SessionPhase::Finished);

        lifecycle.remove_participant("b");
        let messages = lifecycle.reevaluate(&mut app, 0);

        assert!(messages.is_empty());
        assert_eq!(lifecycle.phase(), SessionPhase::Waiting);
        assert_eq!(app.resets, 1);
    }

    #[test]
    fn when_votes_arrive_outside_finished_then_nothing_happens() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = lifecycle_with(&["a", "b"]);

        assert!(lifecycle.record_vote("a", &mut app).is_empty());
        lifecycle.mark_ready("a", &mut app, 0);
        lifecycle.mark_ready("b", &mut app, 0);
        assert!(lifecycle.record_vote("a", &mut app).is_empty());

        assert!(lifecycle.participants().iter().all(|p| !p.wants_play_again));
    }

    #[test]
    fn when_session_ends_then_winner_number_is_resolved_from_roster() {
        let mut app = ScriptedApp::default();
        let lifecycle_messages = {
            let mut lifecycle = lifecycle_with(&["a", "b"]);
            lifecycle.mark_ready("a", &mut app, 0);
            lifecycle.mark_ready("b", &mut app, 0);
            lifecycle.end_session(
                SessionEnd {
                    winner_id: Some("b".to_string()),
                    reason: EndReason::Completed,
                },
                &mut app,
            )
        };

        let ended = session_messages(&lifecycle_messages);
        assert!(matches!(
            ended[0],
            ServerMessage::SessionEnded { winner_number: Some(2), reason, .. } if reason == "completed"
        ));
    }

    #[test]
    fn when_end_is_requested_outside_playing_then_it_is_ignored() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = lifecycle_with(&["a"]);

        let messages = lifecycle.end_session(
            SessionEnd {
                winner_id: None,
                reason: EndReason::Timeout,
            },
            &mut app,
        );

        assert!(messages.is_empty());
        assert_eq!(lifecycle.phase(), SessionPhase::Waiting);
    }

    #[test]
    fn when_every_participant_votes_then_session_resets_and_bots_stay_ready() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = lifecycle_with(&["human", "bot"]);
        lifecycle.mark_bot("bot", &mut app, 0);
        lifecycle.mark_ready("human", &mut app, 0);
        lifecycle.end_session(
            SessionEnd {
                winner_id: None,
                reason: EndReason::Completed,
            },
            &mut app,
        );

        let first = lifecycle.record_vote("human", &mut app);
        let repeat = lifecycle.record_vote("human", &mut app);
        assert_eq!(types(&first), vec!["play_again_status"]);
        assert_eq!(types(&repeat), vec!["play_again_status"]);
        assert_eq!(app.resets, 0);

        let last = lifecycle.record_vote("bot", &mut app);

        assert_eq!(types(&last), vec!["play_again_status", "session_reset"]);
        assert_eq!(app.resets, 1);
        assert_eq!(lifecycle.phase(), SessionPhase::Waiting);
        let human = lifecycle.participant("human").expect("human");
        let bot = lifecycle.participant("bot").expect("bot");
        assert!(!human.is_ready && !human.wants_play_again);
        assert!(bot.is_ready && !bot.wants_play_again);
    }

    #[test]
    fn when_vote_tally_is_broadcast_then_it_counts_distinct_voters() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = finished(&["a", "b"], &mut app);

        lifecycle.record_vote("a", &mut app);
        let repeat = lifecycle.record_vote("a", &mut app);

        assert_eq!(
            session_messages(&repeat)[0],
            &ServerMessage::PlayAgainStatus {
                voted_participant_ids: vec!["a".to_string()],
                voted_count: 1,
                total_participants: 2,
            }
        );
    }

    #[test]
    fn when_non_voter_leaves_in_finished_then_remaining_votes_reset_the_session() {
        let mut app = ScriptedApp::default();
        let mut lifecycle = finished(&["a", "b"], &mut app);
        lifecycle.record_vote("a", &mut app);

        lifecycle.remove_participant("b");
        let messages = lifecycle.reevaluate(&mut app, 0);

        assert_eq!(types(&messages), vec!["play_again_status", "session_reset"]);
        assert_eq!(lifecycle.phase(), SessionPhase::Waiting);
    }

    #[test]
    fn when_participants_are_added_out_of_order_then_roster_is_sorted_by_number() {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.add_participant(Participant::new("second", 2));
        lifecycle.add_participant(Participant::new("first", 1));

        let numbers: Vec<u8> = lifecycle.participants().iter().map(|p| p.number).collect();

        assert_eq!(numbers, vec![1, 2]);
    }
}
