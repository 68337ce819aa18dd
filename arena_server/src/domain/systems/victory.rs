// Win condition: a side with no blocks left loses.

use crate::domain::participant::ParticipantId;
use crate::domain::state::GameState;

/// Returns the winner when exactly one participant still has blocks.
///
/// Needs two registered participants; with fewer there is nobody to beat.
pub fn check_winner(state: &GameState) -> Option<ParticipantId> {
    if state.players.len() < 2 {
        return None;
    }

    let mut with_blocks = state
        .players
        .keys()
        .filter(|id| state.block_count_for(id) > 0);
    let winner = with_blocks.next()?;
    if with_blocks.next().is_some() {
        return None;
    }
    Some(winner.clone())
}
