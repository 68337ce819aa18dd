// Simulation systems. Each one maps a snapshot to the next snapshot plus what happened.

pub mod blocks;
pub mod cannons;
pub mod projectiles;
pub mod victory;
