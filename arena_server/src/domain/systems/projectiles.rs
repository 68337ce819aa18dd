// Per-tick projectile integration, wall exits and projectile-vs-block destruction.

use crate::domain::state::{ArenaBounds, EntityId, GameState, Projectile, Snapshot, Vec3};
use crate::domain::tuning::ProjectileTuning;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallSide {
    MinZ,
    MaxZ,
}

impl WallSide {
    pub fn as_str(self) -> &'static str {
        match self {
            WallSide::MinZ => "minZ",
            WallSide::MaxZ => "maxZ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WallHit {
    pub projectile_id: EntityId,
    /// Impact point projected onto the wall plane.
    pub position: Vec3,
    pub side: WallSide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestroyedBlock {
    pub block_id: EntityId,
    pub owner_id: String,
    pub position: Vec3,
    pub color: String,
    pub projectile_id: EntityId,
}

#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub state: Snapshot,
    pub wall_hits: Vec<WallHit>,
    pub destroyed: Vec<DestroyedBlock>,
}

/// Advances every projectile by `dt` seconds and resolves exits and hits.
///
/// Collision is a plain distance test against the post-move position, so a fast projectile
/// can pass through a block between two ticks.
pub fn tick_projectiles(
    state: &Snapshot,
    dt: f32,
    bounds: &ArenaBounds,
    tuning: &ProjectileTuning,
) -> TickOutcome {
    if state.projectiles.is_empty() {
        return TickOutcome {
            state: Arc::clone(state),
            wall_hits: Vec::new(),
            destroyed: Vec::new(),
        };
    }

    let hit_radius_sq = tuning.hit_radius * tuning.hit_radius;
    let mut survivors: BTreeMap<EntityId, Projectile> = BTreeMap::new();
    let mut wall_hits = Vec::new();
    let mut destroyed = Vec::new();
    // Blocks already destroyed this tick cannot be hit a second time.
    let mut removed: HashSet<EntityId> = HashSet::new();

    for projectile in state.projectiles.values() {
        let position = projectile.position + projectile.velocity * dt;

        let wall = if position.z < bounds.min.z {
            Some((WallSide::MinZ, bounds.min.z))
        } else if position.z > bounds.max.z {
            Some((WallSide::MaxZ, bounds.max.z))
        } else {
            None
        };
        if let Some((side, plane_z)) = wall {
            wall_hits.push(WallHit {
                projectile_id: projectile.id.clone(),
                position: Vec3::new(position.x, position.y, plane_z),
                side,
            });
            continue;
        }

        let hit = state.blocks.values().find(|block| {
            block.owner_id != projectile.owner_id
                && !removed.contains(&block.id)
                && block.position.distance_squared(position) <= hit_radius_sq
        });
        if let Some(block) = hit {
            debug!(
                block_id = %block.id,
                projectile_id = %projectile.id,
                shooter_id = %projectile.owner_id,
                "block destroyed"
            );
            removed.insert(block.id.clone());
            destroyed.push(DestroyedBlock {
                block_id: block.id.clone(),
                owner_id: block.owner_id.clone(),
                position: block.position,
                color: block.color.clone(),
                projectile_id: projectile.id.clone(),
            });
            continue;
        }

        survivors.insert(
            projectile.id.clone(),
            Projectile {
                position,
                ..projectile.clone()
            },
        );
    }

    let mut next = GameState::clone(state);
    next.projectiles = Arc::new(survivors);
    if !removed.is_empty() {
        let blocks = Arc::make_mut(&mut next.blocks);
        let cooldowns = Arc::make_mut(&mut next.cannon_ready_at);
        let players = Arc::make_mut(&mut next.players);
        for id in &removed {
            blocks.remove(id);
            cooldowns.remove(id);
            for slot in players.values_mut() {
                slot.grabbed.remove(id);
            }
        }
    }

    TickOutcome {
        state: Arc::new(next),
        wall_hits,
        destroyed,
    }
}
