// Cannon firing: manual fire requests and the optional auto-fire sweep.

use crate::domain::state::{BlockKind, GameState, Projectile, Snapshot, Vec3};
use crate::domain::tuning::ProjectileTuning;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FireOutcome {
    pub state: Snapshot,
    pub projectile: Option<Projectile>,
}

/// Fires one cannon owned by `participant_id` at session time `now_ms`.
///
/// Rejected (snapshot returned unchanged) when the block is missing, not owned by the
/// participant, not a cannon, or still cooling down.
pub fn fire_cannon(
    state: &Snapshot,
    participant_id: &str,
    cannon_id: &str,
    now_ms: u64,
    tuning: &ProjectileTuning,
) -> FireOutcome {
    let rejected = || FireOutcome {
        state: Arc::clone(state),
        projectile: None,
    };

    let Some(cannon) = state.blocks.get(cannon_id) else {
        return rejected();
    };
    if cannon.owner_id != participant_id || cannon.kind != BlockKind::Cannon {
        return rejected();
    }
    let Some(side) = state.side_of(participant_id) else {
        return rejected();
    };
    if state
        .cannon_ready_at
        .get(cannon_id)
        .is_some_and(|ready_at| now_ms < *ready_at)
    {
        return rejected();
    }

    let direction = side.fire_direction();
    let mut next = GameState::clone(state);
    let id = next.alloc_id("projectile");
    let projectile = Projectile {
        id: id.clone(),
        position: cannon.position + Vec3::new(0.0, 0.0, direction * tuning.muzzle_offset),
        velocity: Vec3::new(0.0, 0.0, direction * tuning.speed),
        owner_id: cannon.owner_id.clone(),
        color: cannon.color.clone(),
    };

    Arc::make_mut(&mut next.projectiles).insert(id, projectile.clone());
    Arc::make_mut(&mut next.cannon_ready_at)
        .insert(cannon_id.to_string(), now_ms.saturating_add(tuning.cooldown_ms));

    FireOutcome {
        state: Arc::new(next),
        projectile: Some(projectile),
    }
}

/// Fires every cannon that is off cooldown, using the same rules as a manual fire.
pub fn auto_fire(state: &Snapshot, now_ms: u64, tuning: &ProjectileTuning) -> (Snapshot, Vec<Projectile>) {
    let cannons: Vec<(String, String)> = state
        .blocks
        .values()
        .filter(|b| b.kind == BlockKind::Cannon)
        .map(|b| (b.id.clone(), b.owner_id.clone()))
        .collect();

    let mut current = Arc::clone(state);
    let mut fired = Vec::new();
    for (cannon_id, owner_id) in cannons {
        let outcome = fire_cannon(&current, &owner_id, &cannon_id, now_ms, tuning);
        if let Some(projectile) = outcome.projectile {
            fired.push(projectile);
        }
        current = outcome.state;
    }
    (current, fired)
}
