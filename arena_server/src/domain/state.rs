// Domain-level simulation entities and the immutable game snapshot.

use super::participant::ParticipantId;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;

pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn distance_squared(self, other: Vec3) -> f32 {
        (self - other).length_squared()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Axis-aligned box every entity must stay inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl ArenaBounds {
    /// Clamps a position so a cube with the given half extent stays fully inside the arena.
    pub fn clamp_inset(&self, position: Vec3, half_extent: f32) -> Vec3 {
        Vec3::new(
            clamp_axis(position.x, self.min.x, self.max.x, half_extent),
            clamp_axis(position.y, self.min.y, self.max.y, half_extent),
            clamp_axis(position.z, self.min.z, self.max.z, half_extent),
        )
    }
}

fn clamp_axis(value: f32, min: f32, max: f32, inset: f32) -> f32 {
    let lo = min + inset;
    let hi = max - inset;
    if lo > hi {
        // Degenerate arena narrower than a block; pin to the center.
        return (min + max) * 0.5;
    }
    if value.is_nan() {
        return (lo + hi) * 0.5;
    }
    value.clamp(lo, hi)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Regular,
    Cannon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: EntityId,
    pub position: Vec3,
    pub color: String,
    pub owner_id: ParticipantId,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub owner_id: ParticipantId,
    pub color: String,
}

/// Which end of the arena a participant defends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Participant 1: home row near max Z, fires toward decreasing Z.
    One,
    /// Participant 2: home row near min Z, fires toward increasing Z.
    Two,
}

impl Side {
    pub fn from_number(number: u8) -> Self {
        if number == 2 { Side::Two } else { Side::One }
    }

    /// Sign of the Z velocity for projectiles fired from this side.
    pub fn fire_direction(self) -> f32 {
        match self {
            Side::One => -1.0,
            Side::Two => 1.0,
        }
    }
}

/// Per-participant engine bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSlot {
    pub side: Side,
    pub color: String,
    pub grabbed: BTreeSet<EntityId>,
}

/// Full simulation state at one instant.
///
/// Collections sit behind their own `Arc` so an update only copies the maps it touches;
/// untouched maps stay shared with the previous snapshot.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub blocks: Arc<BTreeMap<EntityId, Block>>,
    pub projectiles: Arc<BTreeMap<EntityId, Projectile>>,
    pub players: Arc<BTreeMap<ParticipantId, PlayerSlot>>,
    // Cannon id -> earliest session time (ms) it may fire again.
    pub cannon_ready_at: Arc<BTreeMap<EntityId, u64>>,
    pub next_entity_id: u64,
}

pub type Snapshot = Arc<GameState>;

impl GameState {
    pub fn empty() -> Snapshot {
        Arc::new(GameState::default())
    }

    pub fn block_count_for(&self, owner_id: &str) -> usize {
        self.blocks
            .values()
            .filter(|b| b.owner_id == owner_id)
            .count()
    }

    pub fn side_of(&self, participant_id: &str) -> Option<Side> {
        self.players.get(participant_id).map(|p| p.side)
    }

    pub fn is_grabbing(&self, participant_id: &str, block_id: &str) -> bool {
        self.players
            .get(participant_id)
            .is_some_and(|p| p.grabbed.contains(block_id))
    }

    /// Allocates a new entity id with the given prefix.
    pub(crate) fn alloc_id(&mut self, prefix: &str) -> EntityId {
        self.next_entity_id += 1;
        format!("{prefix}-{}", self.next_entity_id)
    }
}

/// True when an update returned the very same snapshot (nothing to broadcast).
pub fn unchanged(before: &Snapshot, after: &Snapshot) -> bool {
    Arc::ptr_eq(before, after)
}
