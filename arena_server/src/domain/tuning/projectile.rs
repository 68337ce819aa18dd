/// Gameplay tuning for cannon projectiles.

#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    /// Projectile speed along Z in world units per second.
    pub speed: f32,

    /// Center distance at which a projectile destroys a block.
    pub hit_radius: f32,

    /// Spawn offset from the cannon center along the firing axis.
    pub muzzle_offset: f32,

    /// Minimum time between two shots of the same cannon.
    pub cooldown_ms: u64,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 12.0,
            hit_radius: 0.75,
            muzzle_offset: 0.8,
            cooldown_ms: 1500,
        }
    }
}
