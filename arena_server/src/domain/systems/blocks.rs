// Block spawning, ownership cleanup and the grab/move/release interaction.
//
// Every function takes the current snapshot and returns the next one. When a request
// is not allowed the input snapshot is handed back unchanged (same `Arc`).

use crate::domain::state::{
    ArenaBounds, Block, BlockKind, EntityId, GameState, PlayerSlot, Side, Snapshot, Vec3,
};
use crate::domain::tuning::BlockTuning;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Registers a participant and spawns their block batch on their home side.
pub fn add_participant(
    state: &Snapshot,
    participant_id: &str,
    side: Side,
    color: &str,
    bounds: &ArenaBounds,
    tuning: &BlockTuning,
) -> Snapshot {
    if state.players.contains_key(participant_id) {
        return Arc::clone(state);
    }

    let mut next = GameState::clone(state);
    Arc::make_mut(&mut next.players).insert(
        participant_id.to_string(),
        PlayerSlot {
            side,
            color: color.to_string(),
            grabbed: BTreeSet::new(),
        },
    );

    let home_z = match side {
        Side::One => bounds.max.z - tuning.home_row_inset,
        Side::Two => bounds.min.z + tuning.home_row_inset,
    };
    // Cannons sit one row closer to the arena center than the regular blocks.
    let cannon_z = home_z + side.fire_direction() * tuning.spacing;
    let floor_y = bounds.min.y + tuning.half_size;

    let mut spawned = Vec::with_capacity(tuning.regular_count + tuning.cannon_count);
    for x in row_offsets(tuning.regular_count, tuning.spacing) {
        spawned.push((BlockKind::Regular, Vec3::new(x, floor_y, home_z)));
    }
    for x in row_offsets(tuning.cannon_count, tuning.spacing) {
        spawned.push((BlockKind::Cannon, Vec3::new(x, floor_y, cannon_z)));
    }

    for (kind, position) in spawned {
        let prefix = match kind {
            BlockKind::Regular => "block",
            BlockKind::Cannon => "cannon",
        };
        let id = next.alloc_id(prefix);
        let block = Block {
            id: id.clone(),
            position: bounds.clamp_inset(position, tuning.half_size),
            color: color.to_string(),
            owner_id: participant_id.to_string(),
            kind,
        };
        Arc::make_mut(&mut next.blocks).insert(id, block);
    }

    Arc::new(next)
}

// X offsets for `count` blocks centered on x = 0.
fn row_offsets(count: usize, spacing: f32) -> impl Iterator<Item = f32> {
    let center = (count as f32 - 1.0) * 0.5;
    (0..count).map(move |i| (i as f32 - center) * spacing)
}

/// Result of dropping a participant from the engine.
#[derive(Debug, Clone)]
pub struct Removal {
    pub state: Snapshot,
    pub block_ids: Vec<EntityId>,
}

/// Removes a participant together with every block, projectile and cooldown they own.
pub fn remove_participant(state: &Snapshot, participant_id: &str) -> Removal {
    let block_ids: Vec<EntityId> = state
        .blocks
        .values()
        .filter(|b| b.owner_id == participant_id)
        .map(|b| b.id.clone())
        .collect();
    let owns_projectiles = state
        .projectiles
        .values()
        .any(|p| p.owner_id == participant_id);

    if block_ids.is_empty() && !owns_projectiles && !state.players.contains_key(participant_id) {
        return Removal {
            state: Arc::clone(state),
            block_ids,
        };
    }

    let mut next = GameState::clone(state);
    if !block_ids.is_empty() {
        let blocks = Arc::make_mut(&mut next.blocks);
        let cooldowns = Arc::make_mut(&mut next.cannon_ready_at);
        for id in &block_ids {
            blocks.remove(id);
            cooldowns.remove(id);
        }
    }
    if owns_projectiles {
        Arc::make_mut(&mut next.projectiles).retain(|_, p| p.owner_id != participant_id);
    }
    if next.players.contains_key(participant_id) {
        Arc::make_mut(&mut next.players).remove(participant_id);
    }

    Removal {
        state: Arc::new(next),
        block_ids,
    }
}

/// Marks an owned block as held by the participant.
pub fn grab_block(
    state: &Snapshot,
    participant_id: &str,
    block_id: &str,
    max_grabbed: usize,
) -> Snapshot {
    let owned = state
        .blocks
        .get(block_id)
        .is_some_and(|b| b.owner_id == participant_id);
    let Some(slot) = state.players.get(participant_id) else {
        return Arc::clone(state);
    };
    if !owned || slot.grabbed.contains(block_id) || slot.grabbed.len() >= max_grabbed.max(1) {
        return Arc::clone(state);
    }

    let mut next = GameState::clone(state);
    if let Some(slot) = Arc::make_mut(&mut next.players).get_mut(participant_id) {
        slot.grabbed.insert(block_id.to_string());
    }
    Arc::new(next)
}

/// Clears a grab; no-op unless the participant currently holds the block.
pub fn release_block(state: &Snapshot, participant_id: &str, block_id: &str) -> Snapshot {
    if !state.is_grabbing(participant_id, block_id) {
        return Arc::clone(state);
    }

    let mut next = GameState::clone(state);
    if let Some(slot) = Arc::make_mut(&mut next.players).get_mut(participant_id) {
        slot.grabbed.remove(block_id);
    }
    Arc::new(next)
}

#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub state: Snapshot,
    /// The moved block at its clamped position; `None` when the move was rejected.
    pub moved: Option<Block>,
    /// Other blocks displaced by the move, already clamped.
    pub pushed: Vec<Block>,
}

/// Moves a held block to `target`, clamped into the arena, pushing overlapping blocks aside.
pub fn move_block(
    state: &Snapshot,
    participant_id: &str,
    block_id: &str,
    target: Vec3,
    bounds: &ArenaBounds,
    tuning: &BlockTuning,
) -> MoveOutcome {
    let rejected = || MoveOutcome {
        state: Arc::clone(state),
        moved: None,
        pushed: Vec::new(),
    };

    let Some(block) = state.blocks.get(block_id) else {
        return rejected();
    };
    if block.owner_id != participant_id || !state.is_grabbing(participant_id, block_id) {
        return rejected();
    }

    // Clamp after computing the target so the requested motion is never distorted.
    let position = bounds.clamp_inset(target, tuning.half_size);
    let moved = Block {
        position,
        ..block.clone()
    };

    let mut pushed = Vec::new();
    if tuning.collision_enabled {
        // Single-level resolution: a pushed block is not itself resolved against others.
        for other in state.blocks.values() {
            if other.id == moved.id {
                continue;
            }
            if let Some(offset) = push_offset(moved.position, other.position, tuning.half_size) {
                pushed.push(Block {
                    position: bounds.clamp_inset(other.position + offset, tuning.half_size),
                    ..other.clone()
                });
            }
        }
    }

    if moved.position == block.position && pushed.is_empty() {
        return rejected();
    }

    let mut next = GameState::clone(state);
    let blocks = Arc::make_mut(&mut next.blocks);
    blocks.insert(moved.id.clone(), moved.clone());
    for block in &pushed {
        blocks.insert(block.id.clone(), block.clone());
    }

    MoveOutcome {
        state: Arc::new(next),
        moved: Some(moved),
        pushed,
    }
}

/// Displacement that separates `other` from `mover` along the axis of least penetration.
///
/// Both blocks are cubes with the same half extent. Returns `None` if they do not overlap.
pub fn push_offset(mover: Vec3, other: Vec3, half_size: f32) -> Option<Vec3> {
    let size = half_size * 2.0;
    let delta = other - mover;
    let overlap = [
        size - delta.x.abs(),
        size - delta.y.abs(),
        size - delta.z.abs(),
    ];
    if overlap.iter().any(|o| *o <= 0.0) {
        return None;
    }

    let axis = (0..3)
        .min_by(|a, b| overlap[*a].total_cmp(&overlap[*b]))
        .unwrap_or(0);
    let component = [delta.x, delta.y, delta.z][axis];
    let amount = if component >= 0.0 {
        overlap[axis]
    } else {
        -overlap[axis]
    };

    Some(match axis {
        0 => Vec3::new(amount, 0.0, 0.0),
        1 => Vec3::new(0.0, amount, 0.0),
        _ => Vec3::new(0.0, 0.0, amount),
    })
}
