/// Gameplay tuning for participant-owned blocks.

#[derive(Debug, Clone, Copy)]
pub struct BlockTuning {
    /// Half of a block's edge length in world units; also the arena clamp margin.
    pub half_size: f32,

    /// Regular blocks spawned per participant.
    pub regular_count: usize,

    /// Cannon blocks spawned per participant.
    pub cannon_count: usize,

    /// Distance between neighbouring blocks in the home row.
    pub spacing: f32,

    /// Distance of the home row from the participant's Z wall.
    pub home_row_inset: f32,

    /// How many blocks one participant may hold at once (at least 1).
    pub max_grabbed: usize,

    /// Push overlapping blocks apart when a block is moved.
    pub collision_enabled: bool,
}

impl Default for BlockTuning {
    fn default() -> Self {
        Self {
            half_size: 0.5,
            regular_count: 5,
            cannon_count: 1,
            spacing: 1.5,
            home_row_inset: 2.0,
            max_grabbed: 1,
            collision_enabled: true,
        }
    }
}

/// Block colors indexed by participant number - 1.
pub const PARTICIPANT_COLORS: [&str; 2] = ["#4fc3f7", "#ef5350"];

pub fn color_for_number(number: u8) -> &'static str {
    let index = usize::from(number.saturating_sub(1)).min(PARTICIPANT_COLORS.len() - 1);
    PARTICIPANT_COLORS[index]
}
