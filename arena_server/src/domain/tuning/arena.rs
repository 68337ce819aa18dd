use crate::domain::state::{ArenaBounds, Vec3};

/// Arena used by block battle: a long box with the two home rows at either Z end.
pub fn default_arena() -> ArenaBounds {
    ArenaBounds {
        min: Vec3::new(-8.0, 0.0, -12.0),
        max: Vec3::new(8.0, 6.0, 12.0),
    }
}
