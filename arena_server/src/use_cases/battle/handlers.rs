// Block battle message handlers. Each one maps (message, context, snapshot) to the next
// snapshot plus the broadcasts it causes.

use crate::domain::systems::{blocks, cannons};
use crate::domain::{SessionPhase, Snapshot, Vec3, state::unchanged};
use crate::interface_adapters::protocol::{
    AppMessage, BattleEvent, BlockDto, BlockGrabPayload, BlockMovePayload, BlockReleasePayload,
    CannonFirePayload, ProjectileDto, ProtocolError, decode_payload,
};
use crate::use_cases::battle::BattleSettings;
use crate::use_cases::router::{Handled, HandlerRegistry};
use crate::use_cases::types::{AppOutcome, Target};
use std::sync::Arc;

/// Per-message inputs that are not part of the snapshot.
#[derive(Debug, Clone)]
pub struct BattleContext {
    pub participant_id: String,
    pub phase: SessionPhase,
    pub now_ms: u64,
    pub settings: BattleSettings,
}

pub type BattleHandlers = HandlerRegistry<Snapshot, BattleContext, BattleEvent>;
type HandlerResult = Result<Handled<Snapshot, BattleEvent>, ProtocolError>;

pub fn handler_table() -> BattleHandlers {
    HandlerRegistry::new()
        .with("block_grab", block_grab)
        .with("block_move", block_move)
        .with("block_release", block_release)
        .with("cannon_fire", cannon_fire)
}

fn untouched(state: &Snapshot) -> Handled<Snapshot, BattleEvent> {
    Handled {
        state: Arc::clone(state),
        outcome: AppOutcome::none(),
    }
}

fn block_grab(message: &AppMessage, ctx: &BattleContext, state: &Snapshot) -> HandlerResult {
    let payload: BlockGrabPayload = decode_payload(message)?;
    let next = blocks::grab_block(
        state,
        &ctx.participant_id,
        &payload.block_id,
        ctx.settings.blocks.max_grabbed,
    );
    if unchanged(state, &next) {
        return Ok(untouched(state));
    }

    let mut outcome = AppOutcome::none();
    outcome.push(
        Target::All,
        BattleEvent::BlockGrabbed {
            block_id: payload.block_id,
            participant_id: ctx.participant_id.clone(),
        },
    );
    Ok(Handled {
        state: next,
        outcome,
    })
}

fn block_move(message: &AppMessage, ctx: &BattleContext, state: &Snapshot) -> HandlerResult {
    let payload: BlockMovePayload = decode_payload(message)?;
    let target: Vec3 = payload.position.into();
    if !target.is_finite() {
        return Err(ProtocolError::InvalidPayload {
            kind: message.kind.clone(),
            reason: "position must be finite".to_string(),
        });
    }
    let moved = blocks::move_block(
        state,
        &ctx.participant_id,
        &payload.block_id,
        target,
        &ctx.settings.bounds,
        &ctx.settings.blocks,
    );
    let Some(block) = moved.moved else {
        return Ok(untouched(state));
    };

    let mut outcome = AppOutcome::none();
    // The mover already shows its own block at the new position.
    outcome.push(
        Target::Opponent,
        BattleEvent::BlockMoved {
            block_id: block.id,
            position: block.position.into(),
        },
    );
    if !moved.pushed.is_empty() {
        outcome.push(
            Target::All,
            BattleEvent::BlocksPushed {
                blocks: moved.pushed.iter().map(BlockDto::from).collect(),
            },
        );
    }
    Ok(Handled {
        state: moved.state,
        outcome,
    })
}

fn block_release(message: &AppMessage, ctx: &BattleContext, state: &Snapshot) -> HandlerResult {
    let payload: BlockReleasePayload = decode_payload(message)?;
    let next = blocks::release_block(state, &ctx.participant_id, &payload.block_id);
    if unchanged(state, &next) {
        return Ok(untouched(state));
    }

    let mut outcome = AppOutcome::none();
    outcome.push(
        Target::All,
        BattleEvent::BlockReleased {
            block_id: payload.block_id,
            participant_id: ctx.participant_id.clone(),
        },
    );
    Ok(Handled {
        state: next,
        outcome,
    })
}

fn cannon_fire(message: &AppMessage, ctx: &BattleContext, state: &Snapshot) -> HandlerResult {
    let payload: CannonFirePayload = decode_payload(message)?;
    if ctx.phase != SessionPhase::Playing {
        return Ok(untouched(state));
    }
    let fired = cannons::fire_cannon(
        state,
        &ctx.participant_id,
        &payload.cannon_id,
        ctx.now_ms,
        &ctx.settings.projectiles,
    );
    let Some(projectile) = fired.projectile else {
        return Ok(untouched(state));
    };

    let mut outcome = AppOutcome::none();
    outcome.push(
        Target::All,
        BattleEvent::ProjectileSpawned {
            projectile: ProjectileDto::from(&projectile),
        },
    );
    Ok(Handled {
        state: fired.state,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::systems::blocks::add_participant;
    use crate::domain::{BlockKind, GameState, Side};
    use crate::use_cases::types::Outgoing;
    use serde_json::json;

    fn context(participant_id: &str, phase: SessionPhase) -> BattleContext {
        BattleContext {
            participant_id: participant_id.to_string(),
            phase,
            now_ms: 0,
            settings: BattleSettings::default(),
        }
    }

    fn arena() -> Snapshot {
        let settings = BattleSettings::default();
        let state = add_participant(
            &GameState::empty(),
            "a",
            Side::One,
            "#a",
            &settings.bounds,
            &settings.blocks,
        );
        add_participant(&state, "b", Side::Two, "#b", &settings.bounds, &settings.blocks)
    }

    fn first_block(state: &Snapshot, owner: &str, kind: BlockKind) -> String {
        state
            .blocks
            .values()
            .find(|b| b.owner_id == owner && b.kind == kind)
            .map(|b| b.id.clone())
            .expect("block exists")
    }

    fn message(body: serde_json::Value) -> AppMessage {
        AppMessage {
            kind: body["type"].as_str().unwrap_or_default().to_string(),
            body,
        }
    }

    #[test]
    fn when_grabbing_own_block_then_everyone_is_told() {
        let state = arena();
        let block_id = first_block(&state, "a", BlockKind::Regular);

        let handled = handler_table()
            .dispatch(
                &message(json!({"type": "block_grab", "blockId": block_id})),
                &context("a", SessionPhase::Waiting),
                &state,
            )
            .expect("valid");

        assert!(handled.state.is_grabbing("a", &block_id));
        assert_eq!(handled.outcome.messages.len(), 1);
        assert_eq!(handled.outcome.messages[0].target, Target::All);
    }

    #[test]
    fn when_grabbing_opponent_block_then_snapshot_is_reused_and_nothing_is_sent() {
        let state = arena();
        let block_id = first_block(&state, "b", BlockKind::Regular);

        let handled = handler_table()
            .dispatch(
                &message(json!({"type": "block_grab", "blockId": block_id})),
                &context("a", SessionPhase::Playing),
                &state,
            )
            .expect("valid");

        assert!(unchanged(&state, &handled.state));
        assert!(handled.outcome.messages.is_empty());
    }

    #[test]
    fn when_moving_a_held_block_then_opponent_gets_the_clamped_position() {
        let handlers = handler_table();
        let state = arena();
        let block_id = first_block(&state, "a", BlockKind::Regular);
        let ctx = context("a", SessionPhase::Playing);
        let grabbed = handlers
            .dispatch(&message(json!({"type": "block_grab", "blockId": block_id})), &ctx, &state)
            .expect("valid")
            .state;

        let handled = handlers
            .dispatch(
                &message(json!({
                    "type": "block_move",
                    "blockId": block_id,
                    "position": {"x": 1.0e6, "y": -50.0, "z": 0.0}
                })),
                &ctx,
                &grabbed,
            )
            .expect("valid");

        let bounds = ctx.settings.bounds;
        let half = ctx.settings.blocks.half_size;
        assert_eq!(handled.outcome.messages[0].target, Target::Opponent);
        let Outgoing::App(BattleEvent::BlockMoved { position, .. }) =
            &handled.outcome.messages[0].message
        else {
            panic!("expected block_moved");
        };
        assert_eq!(position.x, bounds.max.x - half);
        assert_eq!(position.y, bounds.min.y + half);
    }

    #[test]
    fn when_move_target_overflows_to_infinity_then_it_is_rejected_and_block_stays() {
        let handlers = handler_table();
        let state = arena();
        let block_id = first_block(&state, "a", BlockKind::Regular);
        let ctx = context("a", SessionPhase::Playing);
        let grabbed = handlers
            .dispatch(
                &message(json!({"type": "block_grab", "blockId": block_id})),
                &ctx,
                &state,
            )
            .expect("valid")
            .state;

        let result = handlers.dispatch(
            &message(json!({
                "type": "block_move",
                "blockId": block_id,
                "position": {"x": 1.0e300, "y": 1.0, "z": 0.0}
            })),
            &ctx,
            &grabbed,
        );

        assert!(matches!(
            result,
            Err(ProtocolError::InvalidPayload { reason, .. }) if reason == "position must be finite"
        ));
        assert!(grabbed.blocks[&block_id].position.is_finite());
    }

    #[test]
    fn when_move_payload_is_incomplete_then_invalid_payload_error() {
        let state = arena();

        let result = handler_table().dispatch(
            &message(json!({"type": "block_move", "blockId": "block-1"})),
            &context("a", SessionPhase::Playing),
            &state,
        );

        assert!(matches!(result, Err(ProtocolError::InvalidPayload { .. })));
    }

    #[test]
    fn when_firing_while_waiting_then_nothing_spawns() {
        let state = arena();
        let cannon_id = first_block(&state, "a", BlockKind::Cannon);

        let handled = handler_table()
            .dispatch(
                &message(json!({"type": "cannon_fire", "cannonId": cannon_id})),
                &context("a", SessionPhase::Waiting),
                &state,
            )
            .expect("valid");

        assert!(handled.state.projectiles.is_empty());
        assert!(handled.outcome.messages.is_empty());
    }

    #[test]
    fn when_firing_while_playing_then_projectile_spawn_is_broadcast() {
        let state = arena();
        let cannon_id = first_block(&state, "b", BlockKind::Cannon);

        let handled = handler_table()
            .dispatch(
                &message(json!({"type": "cannon_fire", "cannonId": cannon_id})),
                &context("b", SessionPhase::Playing),
                &state,
            )
            .expect("valid");

        assert_eq!(handled.state.projectiles.len(), 1);
        let Outgoing::App(BattleEvent::ProjectileSpawned { projectile }) =
            &handled.outcome.messages[0].message
        else {
            panic!("expected projectile_spawned");
        };
        assert!(projectile.velocity.z > 0.0);
    }
}
