// Domain layer: core simulation types and rules.

pub mod participant;
pub mod state;
pub mod systems;
pub mod tuning;

pub use participant::{
    EndReason, MAX_PARTICIPANTS, Participant, ParticipantId, SessionEnd, SessionPhase,
};
pub use state::{
    ArenaBounds, Block, BlockKind, EntityId, GameState, PlayerSlot, Projectile, Side, Snapshot,
    Vec3,
};
