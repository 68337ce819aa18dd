// Block battle: two players push blocks around and shoot each other's blocks with cannons.

pub mod handlers;

use crate::domain::systems::{blocks, cannons, projectiles, victory};
use crate::domain::tuning::block::color_for_number;
use crate::domain::tuning::{BlockTuning, ProjectileTuning, default_arena};
use crate::domain::{
    ArenaBounds, EndReason, GameState, MAX_PARTICIPANTS, Participant, SessionEnd, SessionPhase,
    Side, Snapshot,
};
use crate::interface_adapters::protocol::{
    AppMessage, BattleEvent, BattleStateDto, ProjectileDto, ProtocolError,
};
use crate::use_cases::app::{AppManifest, SessionApp};
use crate::use_cases::session::{SessionHandle, SessionSettings, spawn_session};
use crate::use_cases::types::{AppOutcome, Target};
use handlers::{BattleContext, BattleHandlers, handler_table};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub const APP_ID: &str = "block_battle";

#[derive(Debug, Clone, Copy)]
pub struct BattleSettings {
    pub bounds: ArenaBounds,
    pub blocks: BlockTuning,
    pub projectiles: ProjectileTuning,
    /// Fires every ready cannon on this period while playing.
    pub auto_fire_interval: Option<Duration>,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            bounds: default_arena(),
            blocks: BlockTuning::default(),
            projectiles: ProjectileTuning::default(),
            auto_fire_interval: None,
        }
    }
}

pub fn manifest() -> AppManifest {
    AppManifest {
        id: APP_ID,
        name: "Block Battle",
        description: "Grab and move your blocks, fire cannons at the opponent's side.",
        max_participants: MAX_PARTICIPANTS,
        launch,
    }
}

fn launch(settings: SessionSettings, shutdown: watch::Sender<bool>) -> SessionHandle {
    let app = BlockBattle::new(settings.battle);
    spawn_session(app, settings, shutdown)
}

pub struct BlockBattle {
    settings: BattleSettings,
    state: Snapshot,
    handlers: BattleHandlers,
}

impl BlockBattle {
    pub fn new(settings: BattleSettings) -> Self {
        Self {
            settings,
            state: GameState::empty(),
            handlers: handler_table(),
        }
    }

    pub fn state(&self) -> &Snapshot {
        &self.state
    }

    fn spawn(&self, state: &Snapshot, participant: &Participant) -> Snapshot {
        blocks::add_participant(
            state,
            &participant.id,
            Side::from_number(participant.number),
            color_for_number(participant.number),
            &self.settings.bounds,
            &self.settings.blocks,
        )
    }
}

impl SessionApp for BlockBattle {
    type Event = BattleEvent;

    fn on_participant_join(&mut self, participant: &Participant) -> AppOutcome<BattleEvent> {
        self.state = self.spawn(&self.state, participant);
        debug!(
            participant_id = %participant.id,
            blocks = self.state.block_count_for(&participant.id),
            "blocks spawned"
        );
        AppOutcome::none()
    }

    fn on_participant_leave(
        &mut self,
        participant: &Participant,
        phase: SessionPhase,
    ) -> AppOutcome<BattleEvent> {
        let removal = blocks::remove_participant(&self.state, &participant.id);
        self.state = removal.state;

        let mut outcome = AppOutcome::none();
        if !removal.block_ids.is_empty() {
            outcome.push(
                Target::All,
                BattleEvent::BlocksRemoved {
                    owner_id: participant.id.clone(),
                    block_ids: removal.block_ids,
                },
            );
        }
        if phase == SessionPhase::Playing {
            let winner_id = self.state.players.keys().next().cloned();
            outcome = outcome.ending(SessionEnd {
                winner_id,
                reason: EndReason::ParticipantLeft,
            });
        }
        outcome
    }

    fn on_message(
        &mut self,
        message: &AppMessage,
        sender: &Participant,
        phase: SessionPhase,
        now_ms: u64,
    ) -> Result<AppOutcome<BattleEvent>, ProtocolError> {
        if !self.handlers.handles(&message.kind) {
            return Err(ProtocolError::UnknownType(message.kind.clone()));
        }
        if phase == SessionPhase::Finished {
            return Ok(AppOutcome::none());
        }

        let ctx = BattleContext {
            participant_id: sender.id.clone(),
            phase,
            now_ms,
            settings: self.settings,
        };
        let handled = self.handlers.dispatch(message, &ctx, &self.state)?;
        self.state = handled.state;
        Ok(handled.outcome)
    }

    fn on_session_start(&mut self, _now_ms: u64) -> AppOutcome<BattleEvent> {
        info!(
            blocks = self.state.blocks.len(),
            players = self.state.players.len(),
            "battle started"
        );
        AppOutcome::none()
    }

    fn on_tick(&mut self, dt: f32, _now_ms: u64) -> AppOutcome<BattleEvent> {
        if self.state.projectiles.is_empty() {
            return AppOutcome::none();
        }
        let tick = projectiles::tick_projectiles(
            &self.state,
            dt,
            &self.settings.bounds,
            &self.settings.projectiles,
        );
        self.state = tick.state;

        let mut outcome = AppOutcome::none();
        for destroyed in &tick.destroyed {
            outcome.push(Target::All, BattleEvent::from(destroyed));
        }
        for hit in &tick.wall_hits {
            outcome.push(Target::All, BattleEvent::from(hit));
        }
        outcome.push(
            Target::All,
            BattleEvent::ProjectilesUpdate {
                projectiles: self.state.projectiles.values().map(ProjectileDto::from).collect(),
            },
        );

        if !tick.destroyed.is_empty() {
            if let Some(winner_id) = victory::check_winner(&self.state) {
                outcome = outcome.ending(SessionEnd {
                    winner_id: Some(winner_id),
                    reason: EndReason::Completed,
                });
            }
        }
        outcome
    }

    fn periodic_interval(&self) -> Option<Duration> {
        self.settings.auto_fire_interval
    }

    fn on_periodic(&mut self, now_ms: u64) -> AppOutcome<BattleEvent> {
        let (state, fired) = cannons::auto_fire(&self.state, now_ms, &self.settings.projectiles);
        self.state = state;

        let mut outcome = AppOutcome::none();
        for projectile in &fired {
            outcome.push(
                Target::All,
                BattleEvent::ProjectileSpawned {
                    projectile: ProjectileDto::from(projectile),
                },
            );
        }
        outcome
    }

    fn on_reset(&mut self, participants: &[Participant]) -> Value {
        let mut state = GameState::empty();
        for participant in participants {
            state = self.spawn(&state, participant);
        }
        self.state = state;
        self.app_data()
    }

    fn app_data(&self) -> Value {
        serde_json::to_value(BattleStateDto::new(&self.state, &self.settings.bounds))
            .unwrap_or_else(|e| {
                error!(error = %e, "failed to serialize battle state");
                Value::Null
            })
    }
}
