// Gameplay tuning, kept separate from runtime/server configuration.

pub mod arena;
pub mod block;
pub mod projectile;

pub use arena::default_arena;
pub use block::BlockTuning;
pub use projectile::ProjectileTuning;
